//! EPICS slow-control bank.
//!
//! A bank of segments: a timestamp segment (tag 0x61) followed by any number
//! of string segments (tag 0x62) each holding one NUL-padded `name=value`
//! entry. Strings are stored as bytes in little-endian word order.

use super::first_event;
use crate::cursor::WordCursor;
use crate::error::DecodeError;
use crate::layout::{tag, DataType};
use crate::model::{DecodedEvent, EpicsValue};
use crate::parser::{BankHeader, SegmentHeader};
use std::ops::DerefMut;
use tracing::trace;

/// Decode an EPICS bank into the single event allocated for it.
pub fn decode<E: DerefMut<Target = DecodedEvent>>(
    header: &BankHeader,
    mut cur: WordCursor<'_>,
    events: &mut [E],
) -> Result<(), DecodeError> {
    if header.data_type != DataType::Segment {
        return Err(DecodeError::UnexpectedType {
            context: "EPICS bank",
            data_type: header.data_type.code(),
        });
    }
    let event = first_event(events, "EPICS bank")?;
    let mut timestamp = 0;

    while !cur.is_empty() {
        let (segment, mut payload) = SegmentHeader::read(&mut cur)?;
        match segment.tag {
            tag::EPICS_TIME => timestamp = payload.next_word()?,
            tag::EPICS_VALUE => {
                let text = words_to_string(payload.rest());
                match text.split_once('=') {
                    Some((name, value)) => event.epics.push(EpicsValue {
                        timestamp,
                        name: name.trim().to_string(),
                        value: value.trim().to_string(),
                    }),
                    None => trace!(entry = %text, "EPICS entry without '='"),
                }
            }
            other => trace!(tag = other, "Skipping EPICS segment"),
        }
    }
    Ok(())
}

/// Bytes of `words` in little-endian order up to the first NUL.
fn words_to_string(words: &[u32]) -> String {
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
