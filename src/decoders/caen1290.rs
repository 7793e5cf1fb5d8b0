//! CAEN V1290 multi-hit TDC data (detector id 0x014).
//!
//! Output buffer of one board per event:
//!
//! ```text
//! global header   (0x08: event count 26-5, GEO 4-0)
//!   TDC header    (0x01)
//!   measurement   (0x00: trailing 26, channel 25-21, time 20-0)
//!   ...
//!   TDC trailer   (0x03)
//!   ext. trigger time tag (0x11: 26-0)
//! global trailer  (0x10)
//! ```
//!
//! Each global header starts the next event of the block. The GEO address
//! doubles as the slot number.

use super::EventIndex;
use crate::cursor::WordCursor;
use crate::error::DecodeError;
use crate::layout::caen;
use crate::model::{Caen1290Hit, ChannelKey, DecodedEvent, Edge, ModuleTriggerTime};
use std::ops::DerefMut;
use tracing::{debug, trace};

/// Decode a CAEN 1290 data bank.
pub fn decode<E: DerefMut<Target = DecodedEvent>>(
    mut cur: WordCursor<'_>,
    rocid: u32,
    events: &mut [E],
) -> Result<(), DecodeError> {
    let mut index = EventIndex::new(events.len(), "CAEN1290 data");
    let mut slot = 0;
    let mut itrigger = 0;

    while !cur.is_empty() {
        let word = cur.next_word()?;
        match caen::word_type(word) {
            caen::GLOBAL_HEADER => {
                index.advance()?;
                itrigger = (word >> 5) & 0x3F_FFFF;
                slot = word & 0x1F;
            }
            caen::MEASUREMENT => {
                let idx = index.current()?;
                let channel = (word >> 21) & 0x1F;
                let edge = if word & (1 << 26) != 0 {
                    Edge::Trailing
                } else {
                    Edge::Leading
                };
                events[idx]
                    .channels
                    .channel_mut(ChannelKey::new(rocid, slot, channel))
                    .caen1290
                    .push(Caen1290Hit {
                        rocid,
                        slot,
                        channel,
                        itrigger,
                        edge,
                        time: word & 0x1F_FFFF,
                        trigger_time: None,
                        config: None,
                    });
            }
            caen::EXT_TRIGGER_TIME => {
                let idx = index.current()?;
                events[idx].trigger_times.push(ModuleTriggerTime {
                    rocid,
                    slot,
                    itrigger,
                    time: u64::from(word & 0x7FF_FFFF),
                });
            }
            caen::TDC_ERROR => {
                debug!(rocid, slot, flags = word & 0x7FFF, "CAEN1290 TDC error word");
            }
            caen::TDC_HEADER | caen::TDC_TRAILER | caen::GLOBAL_TRAILER | caen::FILLER => {}
            other => trace!(rocid, word_type = other, "Skipping CAEN1290 word"),
        }
    }
    Ok(())
}
