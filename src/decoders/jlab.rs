//! JLab VME module data (detector id 0xE10).
//!
//! The bank holds one or more module blocks back to back:
//!
//! ```text
//! block header   (bit 31, type 0: slot 26-22, module id 21-18)
//!   event header (type 2: trigger number)
//!   trigger time (type 3 + continuation word)
//!   module data  (window raw data, F1 chip/data words, ...)
//!   ...
//! block trailer  (type 1)
//! ```
//!
//! This decoder splits the bank into blocks and hands each block body to the
//! decoder for the module type named in its header. The F1 TDC 5-bit word
//! types 0x10 and 0x11 share their top bits with the JLab block header and
//! trailer, so the same split works for every module family.

use super::{f1tdc, fadc125, fadc250, next_continuation, ti};
use crate::cursor::WordCursor;
use crate::error::DecodeError;
use crate::layout::{det, jlab, ModuleType};
use crate::model::DecodedEvent;
use crate::parser::DispatchTable;
use std::ops::DerefMut;
use tracing::{debug, trace};

/// Decode a JLab module data bank.
pub fn decode<E: DerefMut<Target = DecodedEvent>>(
    mut cur: WordCursor<'_>,
    rocid: u32,
    dispatch: &DispatchTable,
    events: &mut [E],
) -> Result<(), DecodeError> {
    while let Some(word) = cur.peek() {
        cur.skip(1)?;
        if !is_block_header(word) {
            if word != det::FILLER && !is_filler(word) {
                trace!(rocid, word = format_args!("{word:#010x}"), "Skipping word outside a module block");
            }
            continue;
        }

        let slot = jlab::slot(word);
        let module = ModuleType::from_id(jlab::module_id(word));
        let rest = cur.remaining_words();
        let trailer = rest.iter().position(|&w| is_block_trailer(w));
        let body = cur.split(trailer.unwrap_or(rest.len()))?;
        if trailer.is_some() {
            cur.skip(1)?;
        } else {
            debug!(rocid, slot, ?module, "Module block without trailer");
        }

        if !dispatch.module_enabled(module) {
            trace!(rocid, slot, ?module, "Skipping disabled module block");
            continue;
        }
        decode_module_block(module, body, rocid, slot, events)?;
    }
    Ok(())
}

fn decode_module_block<E: DerefMut<Target = DecodedEvent>>(
    module: ModuleType,
    body: WordCursor<'_>,
    rocid: u32,
    slot: u32,
    events: &mut [E],
) -> Result<(), DecodeError> {
    match module {
        ModuleType::Fadc250 => fadc250::decode(body, rocid, slot, events),
        ModuleType::Fadc125 => fadc125::decode(body, rocid, slot, events),
        ModuleType::F1Tdc32 | ModuleType::F1Tdc48 => f1tdc::decode(body, rocid, slot, module, events),
        ModuleType::Tid | ModuleType::JlabTs | ModuleType::Td => ti::decode(body, rocid, slot, events),
        // CAEN data arrives in its own bank (detector id 0x014).
        other => {
            debug!(rocid, slot, module = ?other, "No decoder for module type in JLab data");
            Ok(())
        }
    }
}

fn is_block_header(word: u32) -> bool {
    jlab::is_type_defining(word) && jlab::data_type(word) == jlab::BLOCK_HEADER
}

fn is_block_trailer(word: u32) -> bool {
    jlab::is_type_defining(word) && jlab::data_type(word) == jlab::BLOCK_TRAILER
}

fn is_filler(word: u32) -> bool {
    jlab::is_type_defining(word) && jlab::data_type(word) == jlab::FILLER
}

/// Read a trigger time: 24 low bits from `word`, 24 high bits from an optional continuation word.
pub(crate) fn read_trigger_time(word: u32, cur: &mut WordCursor<'_>) -> u64 {
    let low = jlab::time_bits(word);
    match next_continuation(cur) {
        Some(high) => low | (jlab::time_bits(high) << 24),
        None => low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseFlags;
    use crate::decoders::test_support::events;
    use crate::model::ChannelKey;

    fn block_header(slot: u32, module: ModuleType) -> u32 {
        0x8000_0000 | (slot << 22) | (module.id() << 18) | 1
    }

    const TRAILER: u32 = 0x8800_0000;

    fn event_header(itrigger: u32) -> u32 {
        0x9000_0000 | itrigger
    }

    #[test]
    fn test_splits_blocks_by_module() {
        let words = [
            det::FILLER,
            block_header(3, ModuleType::Fadc250),
            event_header(1),
            0xA000_0000 | (2 << 23) | 2, // window raw, channel 2, width 2
            (10 << 16) | 11,
            TRAILER,
            block_header(4, ModuleType::F1Tdc48),
            event_header(1),
            0xC800_0000 | (2 << 19) | (5 << 16) | 0x1234, // F1 data chip 2 chan 5
            TRAILER,
        ];
        let mut evs = events(1);
        let table = DispatchTable::new(ParseFlags::default());
        decode(WordCursor::new(&words), 20, &table, &mut evs).unwrap();

        let adc = evs[0].channels.get(&ChannelKey::new(20, 3, 2)).unwrap();
        assert_eq!(adc.fadc250[0].samples, vec![10, 11]);
        let tdc = evs[0].channels.get(&ChannelKey::new(20, 4, 21)).unwrap();
        assert_eq!(tdc.f1tdc[0].time, 0x1234);
    }

    #[test]
    fn test_disabled_module_is_skipped() {
        let words = [
            block_header(3, ModuleType::Fadc250),
            event_header(1),
            0xA000_0000 | 2,
            (10 << 16) | 11,
            TRAILER,
        ];
        let parse = ParseFlags {
            f250: false,
            ..ParseFlags::default()
        };
        let mut evs = events(1);
        decode(WordCursor::new(&words), 20, &DispatchTable::new(parse), &mut evs).unwrap();
        assert!(evs[0].channels.is_empty());
    }

    #[test]
    fn test_trigger_time_with_continuation() {
        let words = [0x0000_0002];
        let mut cur = WordCursor::new(&words);
        let time = read_trigger_time(0x9800_0001, &mut cur);
        assert_eq!(time, 1 | (2 << 24));
        assert!(cur.is_empty());
    }
}
