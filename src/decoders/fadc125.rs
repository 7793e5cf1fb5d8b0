//! f125 flash ADC window raw data.
//!
//! Same block shape as the f250: event headers advance the event, window raw
//! data headers are followed by `(width + 1) / 2` continuation words of two
//! 12-bit samples each. The f125 has 72 channels, so the channel field is
//! seven bits wide, and it carries no per-sample valid or overflow bits.

use super::jlab::read_trigger_time;
use super::{next_continuation, EventIndex};
use crate::cursor::WordCursor;
use crate::error::DecodeError;
use crate::layout::jlab;
use crate::model::{ChannelKey, DecodedEvent, Fadc125WindowRawData, ModuleTriggerTime};
use std::ops::DerefMut;

const SAMPLE_MASK: u32 = 0xFFF;

/// Decode the body of one f125 module block.
pub fn decode<E: DerefMut<Target = DecodedEvent>>(
    mut cur: WordCursor<'_>,
    rocid: u32,
    slot: u32,
    events: &mut [E],
) -> Result<(), DecodeError> {
    let mut index = EventIndex::new(events.len(), "f125 module data");
    let mut itrigger = 0;

    while !cur.is_empty() {
        let word = cur.next_word()?;
        if !jlab::is_type_defining(word) {
            continue;
        }
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
                events[idx].channels.channel_mut(key).fadc125.push(window);
            }
            jlab::BLOCK_TRAILER => index.reset(),
            _ => {}
        }
    }
    Ok(())
}

fn decode_window(
    header: u32,
    cur: &mut WordCursor<'_>,
    rocid: u32,
    slot: u32,
    itrigger: u32,
) -> Result<Fadc125WindowRawData, DecodeError> {
    let channel = (header >> 20) & 0x7F;
    let width = (header & 0xFFF) as usize;
    let nwords = (width + 1) / 2;

    let mut samples = Vec::with_capacity(width);
    for found in 0..nwords {
        let word = next_continuation(cur).ok_or(DecodeError::WindowWordCountMismatch {
            rocid,
            slot,
            channel,
            expected: nwords,
            found,
        })?;
        samples.push(((word >> 16) & SAMPLE_MASK) as u16);
        if samples.len() < width {
            samples.push((word & SAMPLE_MASK) as u16);
        }
    }

    Ok(Fadc125WindowRawData {
        rocid,
        slot,
        channel,
        itrigger,
        samples,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::test_support::events;

    #[test]
    fn test_wide_channel_numbers() {
        let words = [
            0x9000_0003,
            0xA000_0000 | (71 << 20) | 3,
            (0xABC << 16) | 0x123,
            0x456 << 16,
        ];
        let mut evs = events(1);
        decode(WordCursor::new(&words), 2, 6, &mut evs).unwrap();
        let hits = evs[0].channels.get(&ChannelKey::new(2, 6, 71)).unwrap();
        assert_eq!(hits.fadc125[0].samples, vec![0xABC, 0x123, 0x456]);
        assert_eq!(hits.fadc125[0].itrigger, 3);
    }

    #[test]
    fn test_short_window_is_rejected() {
        let words = [0x9000_0001, 0xA000_0000 | (1 << 20) | 4, 0x0001_0002];
        let mut evs = events(1);
        let err = decode(WordCursor::new(&words), 2, 6, &mut evs).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::WindowWordCountMismatch { expected: 2, found: 1, channel: 1, .. }
        ));
    }

    #[test]
    fn test_more_event_headers_than_events() {
        let words = [0x9000_0001, 0x9000_0002];
        let mut evs = events(1);
        let err = decode(WordCursor::new(&words), 2, 6, &mut evs).unwrap_err();
        assert!(matches!(err, DecodeError::EventCountMismatch { expected: 1, .. }));
    }
}
