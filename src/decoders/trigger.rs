//! Built trigger bank, the first child of every physics event.
//!
//! ```text
//! built trigger bank (tag 0xFF2x, type segment, num = ROC count)
//! ├── u64 segment: first event number, [M average timestamps], [run << 32 | type]
//! ├── u16 segment: M event types, low half-word first
//! └── u32 segment per ROC (tag = rocid): len / M words per event
//!         [timestamp low, timestamp high], misc words...
//! ```
//!
//! Bit 0x1 of the tag says timestamps are present, bit 0x2 says run info is
//! present. The number of average timestamps follows from the segment length.

use crate::cursor::WordCursor;
use crate::error::DecodeError;
use crate::layout::{tag, DataType};
use crate::model::{CodaEventInfo, CodaRocInfo, DecodedEvent};
use crate::parser::{BankHeader, SegmentHeader};
use std::ops::DerefMut;
use tracing::debug;

fn expect_type(
    header: &SegmentHeader,
    want: DataType,
    context: &'static str,
) -> Result<(), DecodeError> {
    if header.data_type == want {
        Ok(())
    } else {
        Err(DecodeError::UnexpectedType {
            context,
            data_type: header.data_type.code(),
        })
    }
}

/// Decode a built trigger bank into the events of its physics block.
pub fn decode_built_trigger<E: DerefMut<Target = DecodedEvent>>(
    header: &BankHeader,
    mut cur: WordCursor<'_>,
    events: &mut [E],
) -> Result<(), DecodeError> {
    if header.data_type != DataType::Segment {
        return Err(DecodeError::UnexpectedType {
            context: "built trigger bank",
            data_type: header.data_type.code(),
        });
    }
    let m = events.len();
    if m == 0 {
        return Ok(());
    }
    let has_timestamps = header.tag & tag::BUILT_TRIGGER_TIMESTAMPS != 0;
    let has_run_info = header.tag & tag::BUILT_TRIGGER_RUN_INFO != 0;

    // Event number, timestamps, run info.
    let (seg, mut common) = SegmentHeader::read(&mut cur)?;
    expect_type(&seg, DataType::U64, "built trigger common segment")?;
    let first_event = common.read_u64()?;
    let longs = common.remaining() / 2;
    let n_timestamps = if has_timestamps {
        longs.saturating_sub(usize::from(has_run_info))
    } else {
        0
    };
    let mut avg_timestamps = Vec::with_capacity(n_timestamps);
    for _ in 0..n_timestamps {
        avg_timestamps.push(common.read_u64()?);
    }
    let (run_number, run_type) = if has_run_info {
        let run = common.read_u64()?;
        ((run >> 32) as u32, run as u32)
    } else {
        (0, 0)
    };

    // Event types.
    let (seg, types) = SegmentHeader::read(&mut cur)?;
    expect_type(&seg, DataType::U16, "built trigger event type segment")?;
    let type_words = types.remaining_words();
    if type_words.len() * 2 < m {
        return Err(DecodeError::invalid(
            "built trigger event type segment",
            format!("{} event types for {m} events", type_words.len() * 2),
        ));
    }

    // Per-ROC segments.
    for _ in 0..header.num {
        if cur.is_empty() {
            return Err(DecodeError::invalid(
                "built trigger bank",
                format!("fewer than {} ROC segments", header.num),
            ));
        }
        let (seg, mut roc) = SegmentHeader::read(&mut cur)?;
        if seg.payload_len % m != 0 {
            return Err(DecodeError::invalid(
                "built trigger ROC segment",
                format!("{} words for {m} events", seg.payload_len),
            ));
        }
        let per_event = seg.payload_len / m;
        let ts_words = if has_timestamps { per_event.min(2) } else { 0 };
        for event in events.iter_mut() {
            let words = roc.take(per_event)?;
            let timestamp = match ts_words {
                2 => u64::from(words[0]) | (u64::from(words[1]) << 32),
                1 => u64::from(words[0]),
                _ => 0,
            };
            event.roc_info.push(CodaRocInfo {
                rocid: seg.tag,
                timestamp,
                misc: words[ts_words..].to_vec(),
            });
        }
    }
    if !cur.is_empty() {
        debug!(extra = cur.remaining(), "Trailing words in built trigger bank");
    }

    for (i, event) in events.iter_mut().enumerate() {
        // Event numbers wrap like the 64-bit counter that produced them.
        let event_number = first_event.wrapping_add(i as u64);
        let event_type = ((type_words[i / 2] >> (16 * (i % 2))) & 0xFFFF) as u16;
        let avg_timestamp = avg_timestamps.get(i).copied().unwrap_or(0);

        event.event_number = event_number;
        event.event_type = event_type;
        if has_run_info {
            event.run_number = run_number;
        }
        if has_timestamps {
            let roc_timestamp = event.roc_info.first().map(|roc| roc.timestamp);
            event.trigger_time = avg_timestamps.get(i).copied().or(roc_timestamp);
        }
        event.coda_event_info = Some(CodaEventInfo {
            run_number,
            run_type,
            event_number,
            event_type,
            avg_timestamp,
        });
    }
    Ok(())
}
