//! f250 flash ADC window raw data.
//!
//! Two nested loops: the outer one walks event headers (one per trigger in the
//! block), the inner one reads the continuation words of each window raw data
//! header. The number of continuation words follows from the window width in
//! the header; running into a type-defining word or the end of the block before
//! that count is reached is a [`DecodeError::WindowWordCountMismatch`].
//!
//! Continuation word layout:
//!
//! | bits  | meaning                  |
//! |-------|--------------------------|
//! | 29    | sample 1 not valid       |
//! | 28-16 | sample 1 (bit 28 = overflow) |
//! | 13    | sample 2 not valid       |
//! | 12-0  | sample 2 (bit 12 = overflow) |

use super::jlab::read_trigger_time;
use super::{next_continuation, EventIndex};
use crate::cursor::WordCursor;
use crate::error::DecodeError;
use crate::layout::jlab;
use crate::model::{ChannelKey, DecodedEvent, Fadc250WindowRawData, ModuleTriggerTime};
use std::ops::DerefMut;
use tracing::debug;

const SAMPLE_MASK: u32 = 0x1FFF;
const OVERFLOW_BIT: u16 = 0x1000;

/// Decode the body of one f250 module block.
pub fn decode<E: DerefMut<Target = DecodedEvent>>(
    mut cur: WordCursor<'_>,
    rocid: u32,
    slot: u32,
    events: &mut [E],
) -> Result<(), DecodeError> {
    let mut index = EventIndex::new(events.len(), "f250 module data");
    let mut itrigger = 0;
    let mut after_window = false;

    while !cur.is_empty() {
        let word = cur.next_word()?;
        if !jlab::is_type_defining(word) {
            if after_window {
                debug!(rocid, slot, itrigger, word, "Extra f250 window raw data word");
            }
            // Otherwise a continuation of a data type this decoder does not read.
            continue;
        }
        after_window = jlab::data_type(word) == jlab::WINDOW_RAW_DATA;
        match jlab::data_type(word) {
            jlab::EVENT_HEADER => {
                index.advance()?;
                itrigger = jlab::trigger_number(word);
            }
            jlab::TRIGGER_TIME => {
                let event = &mut events[index.current()?];
                let time = read_trigger_time(word, &mut cur);
                event.trigger_times.push(ModuleTriggerTime {
                    rocid,
                    slot,
                    itrigger,
                    time,
                });
            }
            jlab::WINDOW_RAW_DATA => {
                let idx = index.current()?;
                let window = decode_window(word, &mut cur, rocid, slot, itrigger)?;
                let key = ChannelKey::new(rocid, slot, window.channel);
                events[idx].channels.channel_mut(key).fadc250.push(window);
            }
            jlab::BLOCK_TRAILER => index.reset(),
            _ => {}
        }
    }
    Ok(())
}

/// Decode one window raw data header and its continuation words.
pub fn decode_window(
    header: u32,
    cur: &mut WordCursor<'_>,
    rocid: u32,
    slot: u32,
    itrigger: u32,
) -> Result<Fadc250WindowRawData, DecodeError> {
    let channel = (header >> 23) & 0xF;
    let width = (header & 0xFFF) as usize;
    let nwords = (width + 1) / 2;

    let mut window = Fadc250WindowRawData {
        rocid,
        slot,
        channel,
        itrigger,
        samples: Vec::with_capacity(width),
        ..Default::default()
    };

    for found in 0..nwords {
        let word = next_continuation(cur).ok_or(DecodeError::WindowWordCountMismatch {
            rocid,
            slot,
            channel,
            expected: nwords,
            found,
        })?;

        let first = ((word >> 16) & SAMPLE_MASK) as u16;
        window.invalid_samples |= word & (1 << 29) != 0;
        window.overflow |= first & OVERFLOW_BIT != 0;
        window.samples.push(first);

        // Odd widths leave the second half of the last word unused.
        if window.samples.len() < width {
            let second = (word & SAMPLE_MASK) as u16;
            window.invalid_samples |= word & (1 << 13) != 0;
            window.overflow |= second & OVERFLOW_BIT != 0;
            window.samples.push(second);
        }
    }
    Ok(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::test_support::events;
    use tracing_test::traced_test;

    fn window_header(channel: u32, width: u32) -> u32 {
        0xA000_0000 | (channel << 23) | width
    }

    fn pair(a: u32, b: u32) -> u32 {
        (a << 16) | b
    }

    #[test]
    fn test_even_width_window() {
        let words = [
            0x9000_0005,
            window_header(7, 4),
            pair(100, 101),
            pair(102, 103),
        ];
        let mut evs = events(1);
        decode(WordCursor::new(&words), 1, 9, &mut evs).unwrap();

        let hits = evs[0].channels.get(&ChannelKey::new(1, 9, 7)).unwrap();
        let window = &hits.fadc250[0];
        assert_eq!(window.samples, vec![100, 101, 102, 103]);
        assert_eq!(window.itrigger, 5);
        assert!(!window.overflow);
        assert!(!window.invalid_samples);
    }

    #[test]
    fn test_odd_width_drops_last_half_word() {
        let words = [0x9000_0001, window_header(0, 3), pair(1, 2), pair(3, 0x1FFF)];
        let mut evs = events(1);
        decode(WordCursor::new(&words), 1, 9, &mut evs).unwrap();
        let window = &evs[0].channels.get(&ChannelKey::new(1, 9, 0)).unwrap().fadc250[0];
        assert_eq!(window.samples, vec![1, 2, 3]);
        assert!(!window.overflow);
    }

    #[test]
    fn test_overflow_and_invalid_bits() {
        let words = [
            0x9000_0001,
            window_header(1, 2),
            (1 << 29) | pair(0x1005, 4),
        ];
        let mut evs = events(1);
        decode(WordCursor::new(&words), 1, 9, &mut evs).unwrap();
        let window = &evs[0].channels.get(&ChannelKey::new(1, 9, 1)).unwrap().fadc250[0];
        assert!(window.overflow);
        assert!(window.invalid_samples);
        assert_eq!(window.samples, vec![0x1005, 4]);
    }

    #[test]
    fn test_missing_continuation_word() {
        let words = [0x9000_0001, window_header(4, 6), pair(1, 2), 0x9000_0002];
        let mut evs = events(2);
        let err = decode(WordCursor::new(&words), 3, 5, &mut evs).unwrap_err();
        assert_eq!(
            err,
            DecodeError::WindowWordCountMismatch {
                rocid: 3,
                slot: 5,
                channel: 4,
                expected: 3,
                found: 1
            }
        );
    }

    #[test]
    fn test_events_follow_event_headers() {
        let words = [
            0x9000_0001,
            window_header(2, 2),
            pair(1, 1),
            0x9000_0002,
            0x9800_0010,
            0x0000_0001,
            window_header(2, 2),
            pair(2, 2),
        ];
        let mut evs = events(2);
        decode(WordCursor::new(&words), 1, 4, &mut evs).unwrap();
        let key = ChannelKey::new(1, 4, 2);
        assert_eq!(evs[0].channels.get(&key).unwrap().fadc250[0].samples, vec![1, 1]);
        assert_eq!(evs[1].channels.get(&key).unwrap().fadc250[0].itrigger, 2);
        assert_eq!(evs[1].trigger_times[0].time, 0x10 | (1 << 24));
    }

    #[test]
    #[traced_test]
    fn test_extra_window_words_are_logged() {
        let words = [0x9000_0001, window_header(3, 2), pair(5, 6), pair(7, 8), pair(9, 9)];
        let mut evs = events(1);
        decode(WordCursor::new(&words), 1, 4, &mut evs).unwrap();

        let key = ChannelKey::new(1, 4, 3);
        assert_eq!(evs[0].channels.get(&key).unwrap().fadc250[0].samples, vec![5, 6]);
        assert!(logs_contain("Extra f250 window raw data word"));
    }

    #[test]
    fn test_window_before_event_header() {
        let words = [window_header(2, 2), pair(1, 1)];
        let mut evs = events(1);
        assert!(decode(WordCursor::new(&words), 1, 4, &mut evs).is_err());
    }
}
