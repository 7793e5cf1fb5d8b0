//! L3 event tag bank: one six-word record per event of the block.

use crate::cursor::WordCursor;
use crate::error::DecodeError;
use crate::layout::size;
use crate::model::{DecodedEvent, EventTag};
use std::ops::DerefMut;

/// Decode an event tag bank.
pub fn decode<E: DerefMut<Target = DecodedEvent>>(
    mut cur: WordCursor<'_>,
    events: &mut [E],
) -> Result<(), DecodeError> {
    if cur.remaining() % size::EVENT_TAG != 0 {
        return Err(DecodeError::invalid(
            "event tag",
            format!("{} words is not a whole number of records", cur.remaining()),
        ));
    }
    let records = cur.remaining() / size::EVENT_TAG;
    if records > events.len() {
        return Err(DecodeError::EventCountMismatch {
            context: "event tag",
            declared: records,
            expected: events.len(),
        });
    }

    for event in events.iter_mut().take(records) {
        let event_status = cur.read_u64()?;
        let l3_status = cur.read_u64()?;
        event.event_tag = Some(EventTag {
            event_status,
            l3_status,
            l3_decision: cur.next_word()?,
            l3_algorithm: cur.next_word()?,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::test_support::events;

    #[test]
    fn test_records_map_to_events() {
        let words = [1, 0, 2, 0, 3, 4, 5, 0, 6, 0, 7, 8];
        let mut evs = events(2);
        decode(WordCursor::new(&words), &mut evs).unwrap();
        assert_eq!(
            evs[1].event_tag,
            Some(EventTag {
                event_status: 5,
                l3_status: 6,
                l3_decision: 7,
                l3_algorithm: 8
            })
        );
        assert_eq!(evs[0].event_tag.unwrap().l3_decision, 3);
    }

    #[test]
    fn test_partial_record() {
        let mut evs = events(1);
        assert!(decode(WordCursor::new(&[1, 2, 3]), &mut evs).is_err());
    }

    #[test]
    fn test_more_records_than_events() {
        let words = [0u32; 12];
        let mut evs = events(1);
        let err = decode(WordCursor::new(&words), &mut evs).unwrap_err();
        assert!(matches!(err, DecodeError::EventCountMismatch { declared: 2, expected: 1, .. }));
    }
}
