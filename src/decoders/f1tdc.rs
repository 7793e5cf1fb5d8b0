//! F1 TDC hit data.
//!
//! Hits are reported per chip; the front-panel channel depends on the board
//! variant:
//!
//! - F1TDC32: `4 * chip + LUT[chan_on_chip]` with `LUT = {0,0,1,1,2,2,3,3}`
//!   (two chip channels are ganged per input in high-resolution mode),
//! - F1TDC48: `(chip << 3) | chan_on_chip`.

use super::jlab::read_trigger_time;
use super::EventIndex;
use crate::cursor::WordCursor;
use crate::error::DecodeError;
use crate::layout::{f1, jlab, ModuleType};
use crate::model::{ChannelKey, DecodedEvent, F1TdcHit, ModuleTriggerTime};
use std::ops::DerefMut;
use tracing::trace;

const F1TDC32_LUT: [u32; 8] = [0, 0, 1, 1, 2, 2, 3, 3];

/// Front-panel channel of a hit on `chip`/`chan_on_chip`.
///
/// Returns `None` for module types that are not F1 TDCs.
#[must_use]
pub fn front_panel_channel(module: ModuleType, chip: u32, chan_on_chip: u32) -> Option<u32> {
    match module {
        ModuleType::F1Tdc32 => Some(4 * chip + F1TDC32_LUT[(chan_on_chip & 0x7) as usize]),
        ModuleType::F1Tdc48 => Some((chip << 3) | chan_on_chip),
        _ => None,
    }
}

/// Decode the body of one F1 TDC module block.
pub fn decode<E: DerefMut<Target = DecodedEvent>>(
    mut cur: WordCursor<'_>,
    rocid: u32,
    slot: u32,
    module: ModuleType,
    events: &mut [E],
) -> Result<(), DecodeError> {
    let mut index = EventIndex::new(events.len(), "F1TDC module data");
    let mut itrigger = 0;

    while !cur.is_empty() {
        let word = cur.next_word()?;
        if !jlab::is_type_defining(word) {
            continue;
        }
        match f1::word_type(word) {
            f1::EVENT_HEADER => {
                index.advance()?;
                itrigger = jlab::trigger_number(word);
            }
            f1::TRIGGER_TIME => {
                let event = &mut events[index.current()?];
                let time = read_trigger_time(word, &mut cur);
                event.trigger_times.push(ModuleTriggerTime {
                    rocid,
                    slot,
                    itrigger,
                    time,
                });
            }
            f1::DATA => {
                let idx = index.current()?;
                let chip = f1::chip(word);
                let chan_on_chip = f1::chan_on_chip(word);
                let channel = front_panel_channel(module, chip, chan_on_chip).ok_or(
                    DecodeError::UnknownModuleType {
                        module_type: module.id(),
                        rocid,
                        slot,
                    },
                )?;
                events[idx]
                    .channels
                    .channel_mut(ChannelKey::new(rocid, slot, channel))
                    .f1tdc
                    .push(F1TdcHit {
                        rocid,
                        slot,
                        channel,
                        itrigger,
                        chip,
                        chan_on_chip,
                        time: f1::time(word),
                        module_type: module,
                        trigger_time: None,
                        config: None,
                    });
            }
            f1::BLOCK_TRAILER => index.reset(),
            f1::CHIP_HEADER | f1::FILLER | f1::BLOCK_HEADER => {}
            other => trace!(rocid, slot, word_type = other, "Skipping F1TDC word"),
        }
    }
    Ok(())
}
