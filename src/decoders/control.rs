//! CODA run-control events (sync, prestart, go, pause, end).
//!
//! Payload is `[time, a, b]`. For prestart `a` is the run number and `b` the
//! run type; the other transitions carry event counters.

use crate::cursor::WordCursor;
use crate::error::DecodeError;
use crate::layout::DataType;
use crate::model::{ControlEvent, ControlKind, DecodedEvent};
use crate::parser::BankHeader;
use std::ops::DerefMut;

/// Decode a control event into the single event allocated for it.
pub fn decode<E: DerefMut<Target = DecodedEvent>>(
    kind: ControlKind,
    header: &BankHeader,
    mut cur: WordCursor<'_>,
    events: &mut [E],
) -> Result<(), DecodeError> {
    if !matches!(header.data_type, DataType::U32 | DataType::Unknown32) {
        return Err(DecodeError::UnexpectedType {
            context: "control event",
            data_type: header.data_type.code(),
        });
    }
    let event = super::first_event(events, "control event")?;
    let time = cur.next_word()?;
    let words = cur.rest().to_vec();
    if kind == ControlKind::Prestart {
        if let Some(&run) = words.first() {
            event.run_number = run;
        }
    }
    event.control = Some(ControlEvent { kind, time, words });
    Ok(())
}
