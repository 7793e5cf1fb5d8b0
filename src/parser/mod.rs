//! Recursive-descent bank parser.
//!
//! [`parse_block`] walks one raw block (one or more top-level banks) and fills
//! pooled [`DecodedEvent`]s:
//!
//! ```text
//! physics bank (tag 0xFF50.., num = M)
//! ├── built trigger bank (tag 0xFF2x)        -> decoders::trigger
//! └── ROC data bank (tag = rocid, num = M)   -> allow-list check
//!     └── data block bank (tag = detector id) -> DispatchTable -> decoders::*
//! control / EPICS / BOR / event tag / scaler / offline banks -> one event each
//! ```
//!
//! Every level reads its header through [`BankHeader::read`], which refuses any
//! declared length running past the enclosing cursor. Leaf decoders receive a
//! cursor bounded to their own payload. The first error aborts the walk and is
//! returned; the events filled so far are dropped, which resets them and puts
//! them back in the pool.

pub mod dispatch;
pub mod header;

pub use dispatch::{DataBlock, DecodeOptions, Dispatch, DispatchTable, TopLevel};
pub use header::{BankHeader, SegmentHeader, TagSegmentHeader};

use crate::cursor::WordCursor;
use crate::decoders;
use crate::error::DecodeError;
use crate::layout::{det, tag, DataType};
use crate::model::DecodedEvent;
use evio_pool::{Pooled, RecyclePool};
use std::ops::Range;
use tracing::{debug, trace};

/// Decode one raw block into pooled events.
pub fn parse_block(
    words: &[u32],
    options: &DecodeOptions,
    pool: &mut RecyclePool<DecodedEvent>,
) -> Result<Vec<Pooled<DecodedEvent>>, DecodeError> {
    let mut parser = BankParser::new(options, pool);
    parser.parse(words)?;
    Ok(parser.finish())
}

/// Parser state for one block.
pub struct BankParser<'a> {
    options: &'a DecodeOptions,
    pool: &'a mut RecyclePool<DecodedEvent>,
    events: Vec<Pooled<DecodedEvent>>,
}

impl<'a> BankParser<'a> {
    /// Parser drawing events from `pool`.
    pub fn new(options: &'a DecodeOptions, pool: &'a mut RecyclePool<DecodedEvent>) -> Self {
        Self {
            options,
            pool,
            events: Vec::new(),
        }
    }

    /// Parse every top-level bank in `words`.
    pub fn parse(&mut self, words: &[u32]) -> Result<(), DecodeError> {
        let mut cur = WordCursor::new(words);
        while !cur.is_empty() {
            let (header, payload) = BankHeader::read(&mut cur)?;
            self.parse_top(&header, payload)?;
        }
        Ok(())
    }

    /// Apply per-block finishing touches and hand the events out.
    pub fn finish(mut self) -> Vec<Pooled<DecodedEvent>> {
        if let Some(run) = self.options.run_number_override {
            for event in &mut self.events {
                event.run_number = run;
            }
        }
        self.events
    }

    /// Append `n` fresh events and return their index range.
    fn new_events(&mut self, n: usize) -> Result<Range<usize>, DecodeError> {
        let start = self.events.len();
        let end = start + n;
        if end > self.options.max_events {
            return Err(DecodeError::TooManyEvents {
                declared: end,
                limit: self.options.max_events,
            });
        }
        self.events.reserve(n);
        for _ in 0..n {
            self.events.push(self.pool.acquire());
        }
        Ok(start..end)
    }

    fn parse_top(&mut self, header: &BankHeader, payload: WordCursor<'_>) -> Result<(), DecodeError> {
        match self.options.dispatch.classify_top(header.tag) {
            TopLevel::Physics { sync } => self.parse_physics(header, payload, sync),
            TopLevel::Control(kind) => {
                let range = self.new_events(1)?;
                decoders::control::decode(kind, header, payload, &mut self.events[range])
            }
            TopLevel::Epics => {
                let range = self.new_events(1)?;
                decoders::epics::decode(header, payload, &mut self.events[range])
            }
            TopLevel::Bor => {
                let range = self.new_events(1)?;
                decoders::bor::decode(header, payload, self.options, &mut self.events[range])
            }
            TopLevel::Block(block) => {
                let range = self.new_events(1)?;
                self.decode_data_block(block, 0, header, payload, range)
            }
            TopLevel::Disabled => {
                trace!(tag = header.tag, "Skipping disabled top-level bank");
                Ok(())
            }
            TopLevel::Unknown => {
                debug!(
                    tag = header.tag,
                    offset = header.offset,
                    "Skipping top-level bank with unknown tag"
                );
                Ok(())
            }
        }
    }

    fn parse_physics(
        &mut self,
        header: &BankHeader,
        mut payload: WordCursor<'_>,
        sync: bool,
    ) -> Result<(), DecodeError> {
        if header.data_type != DataType::Bank {
            return Err(DecodeError::UnexpectedType {
                context: "physics event",
                data_type: header.data_type.code(),
            });
        }
        let m = header.num as usize;
        if m == 0 {
            debug!(offset = header.offset, "Physics event declares no events");
            return Ok(());
        }
        let range = self.new_events(m)?;
        for event in &mut self.events[range.clone()] {
            event.sync_flag = sync;
        }

        while !payload.is_empty() {
            let (child, child_payload) = BankHeader::read(&mut payload)?;
            if tag::is_built_trigger(child.tag) {
                if self.options.dispatch.parse_flags().trigger {
                    decoders::trigger::decode_built_trigger(
                        &child,
                        child_payload,
                        &mut self.events[range.clone()],
                    )?;
                } else {
                    trace!(tag = child.tag, "Skipping disabled built trigger bank");
                }
                continue;
            }
            self.parse_roc_bank(&child, child_payload, range.clone())?;
        }
        Ok(())
    }

    fn parse_roc_bank(
        &mut self,
        header: &BankHeader,
        mut payload: WordCursor<'_>,
        range: Range<usize>,
    ) -> Result<(), DecodeError> {
        let rocid = header.tag & 0xFFF;
        if !self.options.rocid_allowed(rocid) {
            trace!(rocid, "Skipping ROC not on the allow-list");
            return Ok(());
        }
        if header.data_type != DataType::Bank {
            return Err(DecodeError::UnexpectedType {
                context: "ROC data bank",
                data_type: header.data_type.code(),
            });
        }
        let m = range.len();
        if header.num != 0 && header.num as usize != m {
            return Err(DecodeError::EventCountMismatch {
                context: "ROC data bank",
                declared: header.num as usize,
                expected: m,
            });
        }

        while !payload.is_empty() {
            let (block, block_payload) = BankHeader::read(&mut payload)?;
            match self.options.dispatch.classify_data(block.tag) {
                Dispatch::Decode(kind) => {
                    self.decode_data_block(kind, rocid, &block, block_payload, range.clone())?;
                }
                Dispatch::Disabled(kind) => {
                    trace!(rocid, tag = block.tag, ?kind, "Skipping disabled data block");
                }
                Dispatch::Unknown => {
                    debug!(
                        rocid,
                        tag = block.tag,
                        offset = block.offset,
                        "Skipping data block with unknown detector id"
                    );
                }
            }
        }
        Ok(())
    }

    fn decode_data_block(
        &mut self,
        kind: DataBlock,
        rocid: u32,
        header: &BankHeader,
        mut payload: WordCursor<'_>,
        range: Range<usize>,
    ) -> Result<(), DecodeError> {
        if header.data_type.is_container() {
            return Err(DecodeError::UnexpectedType {
                context: "data block",
                data_type: header.data_type.code(),
            });
        }
        while payload.peek() == Some(det::FILLER) {
            payload.next_word()?;
        }
        let events = &mut self.events[range];
        decoders::decode_block(kind, rocid, payload, &self.options.dispatch, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::header::encode_bank_header;
    use evio_pool::PoolSettings;

    fn pool() -> RecyclePool<DecodedEvent> {
        RecyclePool::new(PoolSettings::default(), || DecodedEvent::new(None), DecodedEvent::reset)
    }

    fn bank(tag: u32, data_type: DataType, num: u32, payload: &[u32]) -> Vec<u32> {
        let mut words = encode_bank_header(tag, data_type, num, payload.len()).to_vec();
        words.extend_from_slice(payload);
        words
    }

    #[test]
    fn test_unknown_top_level_yields_no_events() {
        let words = bank(0x1234, DataType::U32, 0, &[1, 2, 3]);
        let events = parse_block(&words, &DecodeOptions::default(), &mut pool()).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_physics_event_allocates_m_events() {
        let roc = bank(0x0011, DataType::Bank, 3, &[]);
        let words = bank(0xFF58, DataType::Bank, 3, &roc);
        let events = parse_block(&words, &DecodeOptions::default(), &mut pool()).unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.sync_flag));
    }

    #[test]
    fn test_roc_event_count_mismatch() {
        let roc = bank(0x0011, DataType::Bank, 2, &[]);
        let words = bank(0xFF50, DataType::Bank, 3, &roc);
        let err = parse_block(&words, &DecodeOptions::default(), &mut pool()).unwrap_err();
        assert!(matches!(err, DecodeError::EventCountMismatch { declared: 2, expected: 3, .. }));
    }

    #[test]
    fn test_too_many_events() {
        let words = bank(0xFF50, DataType::Bank, 200, &[]);
        let options = DecodeOptions {
            max_events: 100,
            ..DecodeOptions::default()
        };
        let err = parse_block(&words, &options, &mut pool()).unwrap_err();
        assert_eq!(err, DecodeError::TooManyEvents { declared: 200, limit: 100 });
    }

    #[test]
    fn test_nested_overrun_is_malformed() {
        // ROC bank claims 10 payload words inside a physics bank with room for 2.
        let mut roc = encode_bank_header(0x0011, DataType::Bank, 1, 10).to_vec();
        roc.extend_from_slice(&[0, 0]);
        let words = bank(0xFF50, DataType::Bank, 1, &roc);
        let err = parse_block(&words, &DecodeOptions::default(), &mut pool()).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedBank { tag: 0x0011, .. }));
    }

    #[test]
    fn test_failed_parse_returns_events_to_pool() {
        let mut pool = pool();
        let roc = bank(0x0011, DataType::Bank, 2, &[]);
        let words = bank(0xFF50, DataType::Bank, 4, &roc);
        assert!(parse_block(&words, &DecodeOptions::default(), &mut pool).is_err());
        let stats = pool.stats();
        assert_eq!(stats.outstanding, 0);
        assert_eq!(stats.resting, 4);
    }

    #[test]
    fn test_run_number_override() {
        let words = bank(0xFFD2, DataType::U32, 0, &[1_700_000_000, 0, 0]);
        let options = DecodeOptions {
            run_number_override: Some(71234),
            ..DecodeOptions::default()
        };
        let events = parse_block(&words, &options, &mut pool()).unwrap();
        assert_eq!(events[0].run_number, 71234);
    }
}
