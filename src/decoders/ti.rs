//! Trigger interface / trigger supervisor blocks inside JLab module data.
//!
//! These boards contribute one event header and one trigger time per trigger.
//! The trigger times are recorded as [`ModuleTriggerTime`]s; the linker uses
//! them when the built trigger bank carried no timestamps.

use super::jlab::read_trigger_time;
use super::EventIndex;
use crate::cursor::WordCursor;
use crate::error::DecodeError;
use crate::layout::jlab;
use crate::model::{DecodedEvent, ModuleTriggerTime};
use std::ops::DerefMut;

/// Decode the body of one TI/TS/TD block.
pub fn decode<E: DerefMut<Target = DecodedEvent>>(
    mut cur: WordCursor<'_>,
    rocid: u32,
    slot: u32,
    events: &mut [E],
) -> Result<(), DecodeError> {
    let mut index = EventIndex::new(events.len(), "TI module data");
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
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::test_support::events;

    #[test]
    fn test_one_trigger_time_per_event() {
        let words = [
            0x9000_0010,
            0x9800_0100,
            0x0000_0001,
            0x9000_0011,
            0x9800_0200,
        ];
        let mut evs = events(2);
        decode(WordCursor::new(&words), 1, 21, &mut evs).unwrap();
        assert_eq!(
            evs[0].trigger_times,
            vec![ModuleTriggerTime {
                rocid: 1,
                slot: 21,
                itrigger: 0x10,
                time: 0x100 | (1 << 24)
            }]
        );
        assert_eq!(evs[1].trigger_times[0].time, 0x200);
        assert_eq!(evs[1].trigger_times[0].itrigger, 0x11);
    }
}
