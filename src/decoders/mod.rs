//! Module decoders.
//!
//! Each decoder receives a [`WordCursor`] bounded to its own bank payload, the
//! readout controller the data came from, and the slice of events the
//! enclosing block declared. Decoders translate their private word layout
//! into typed records and append them to the events in stream order.
//!
//! Decoders are generic over `E: DerefMut<Target = DecodedEvent>` so the
//! pipeline can hand them pooled events while tests use plain boxes.

pub mod bor;
pub mod caen1290;
pub mod control;
pub mod epics;
pub mod event_tag;
pub mod f1tdc;
pub mod fadc125;
pub mod fadc250;
pub mod jlab;
pub mod module_config;
pub mod offline;
pub mod scalers;
pub mod ti;
pub mod trigger;

use crate::cursor::WordCursor;
use crate::error::DecodeError;
use crate::model::DecodedEvent;
use crate::parser::{DataBlock, DispatchTable};
use std::ops::DerefMut;

/// Run the decoder for `kind` over `payload`.
pub fn decode_block<E: DerefMut<Target = DecodedEvent>>(
    kind: DataBlock,
    rocid: u32,
    payload: WordCursor<'_>,
    dispatch: &DispatchTable,
    events: &mut [E],
) -> Result<(), DecodeError> {
    match kind {
        DataBlock::JlabModules => jlab::decode(payload, rocid, dispatch, events),
        DataBlock::Caen1290 => caen1290::decode(payload, rocid, events),
        DataBlock::ModuleConfig => module_config::decode(payload, rocid, events),
        DataBlock::EventTag => event_tag::decode(payload, events),
        DataBlock::TsScalers => scalers::decode_ts(payload, events),
        DataBlock::F250Scalers => scalers::decode_f250(payload, rocid, events),
        DataBlock::Vertex => offline::decode_vertices(payload, events),
        DataBlock::RfBunch => offline::decode_rf_bunches(payload, events),
    }
}

/// Tracks which event of the block the next module event header refers to.
#[derive(Debug, Clone)]
pub(crate) struct EventIndex {
    current: Option<usize>,
    total: usize,
    context: &'static str,
}

impl EventIndex {
    pub(crate) fn new(total: usize, context: &'static str) -> Self {
        Self {
            current: None,
            total,
            context,
        }
    }

    /// Move to the next event. Fails when the module reports more events than the block.
    pub(crate) fn advance(&mut self) -> Result<usize, DecodeError> {
        let next = self.current.map_or(0, |idx| idx + 1);
        if next >= self.total {
            return Err(DecodeError::EventCountMismatch {
                context: self.context,
                declared: next + 1,
                expected: self.total,
            });
        }
        self.current = Some(next);
        Ok(next)
    }

    /// Event the current data belongs to. Fails for data before any event header.
    pub(crate) fn current(&self) -> Result<usize, DecodeError> {
        self.current
            .ok_or_else(|| DecodeError::invalid(self.context, "data word before event header"))
    }

    /// Forget the position (at a block trailer).
    pub(crate) fn reset(&mut self) {
        self.current = None;
    }
}

/// First event of the block, or an error naming `context` for an empty block.
pub(crate) fn first_event<'e, E: DerefMut<Target = DecodedEvent>>(
    events: &'e mut [E],
    context: &'static str,
) -> Result<&'e mut DecodedEvent, DecodeError> {
    events
        .first_mut()
        .map(|e| &mut **e)
        .ok_or_else(|| DecodeError::invalid(context, "block holds no events"))
}

/// Read a continuation word (bit 31 clear), leaving type-defining words in place.
pub(crate) fn next_continuation(cur: &mut WordCursor<'_>) -> Option<u32> {
    match cur.peek() {
        Some(word) if word & 0x8000_0000 == 0 => {
            cur.skip(1).ok()?;
            Some(word)
        }
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::model::DecodedEvent;

    /// `n` empty events.
    pub fn events(n: usize) -> Vec<Box<DecodedEvent>> {
        (0..n).map(|_| Box::new(DecodedEvent::new(None))).collect()
    }
}
