//! Scaler banks.
//!
//! The trigger supervisor bank (0xE02) is a fixed 102-word record. The f250
//! scaler bank (0xE05) carries a three-word header followed by per-slot
//! records whose counts go straight into the channel map. Scaler banks are
//! read once per sync interval, so both land on the first event of the block.

use super::first_event;
use crate::cursor::WordCursor;
use crate::error::DecodeError;
use crate::layout::size;
use crate::model::{ChannelKey, DecodedEvent, F250ScalerHeader, TsScalers};
use std::ops::DerefMut;

/// Decode a trigger supervisor scaler bank.
pub fn decode_ts<E: DerefMut<Target = DecodedEvent>>(
    mut cur: WordCursor<'_>,
    events: &mut [E],
) -> Result<(), DecodeError> {
    if cur.remaining() < size::TS_SCALERS {
        return Err(DecodeError::invalid(
            "TS scalers",
            format!("{} words, need {}", cur.remaining(), size::TS_SCALERS),
        ));
    }
    let head = cur.take(6)?;
    let scalers = TsScalers {
        nsync: head[0],
        int_count: head[1],
        live_time: head[2],
        busy_time: head[3],
        live_inst: head[4],
        time: head[5],
        gtp_scalers: cur.take(size::TS_GTP)?.to_vec(),
        fp_scalers: cur.take(size::TS_FP)?.to_vec(),
        gtp_rate: cur.take(size::TS_GTP)?.to_vec(),
        fp_rate: cur.take(size::TS_FP)?.to_vec(),
    };
    first_event(events, "TS scalers")?.ts_scalers.push(scalers);
    Ok(())
}

/// Decode an f250 scaler bank from readout controller `rocid`.
pub fn decode_f250<E: DerefMut<Target = DecodedEvent>>(
    mut cur: WordCursor<'_>,
    rocid: u32,
    events: &mut [E],
) -> Result<(), DecodeError> {
    let head = cur.take(3)?;
    let event = first_event(events, "f250 scalers")?;
    event.f250_scalers.push(F250ScalerHeader {
        rocid,
        nsync: head[0],
        trig_number: head[1],
        version: head[2],
    });

    while !cur.is_empty() {
        let record = cur.next_word()?;
        let slot = record >> 24;
        let nchan = (record & 0xFF_FFFF) as usize;
        for (channel, &count) in (0u32..).zip(cur.take(nchan)?) {
            event
                .channels
                .channel_mut(ChannelKey::new(rocid, slot, channel))
                .scaler_counts
                .push(count);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::test_support::events;

    #[test]
    fn test_ts_scalers_layout() {
        let words: Vec<u32> = (0..size::TS_SCALERS as u32).collect();
        let mut evs = events(3);
        decode_ts(WordCursor::new(&words), &mut evs).unwrap();

        let ts = &evs[0].ts_scalers[0];
        assert_eq!(ts.nsync, 0);
        assert_eq!(ts.time, 5);
        assert_eq!(ts.gtp_scalers.len(), 32);
        assert_eq!(ts.gtp_scalers[0], 6);
        assert_eq!(ts.fp_scalers[0], 38);
        assert_eq!(ts.gtp_rate[0], 54);
        assert_eq!(ts.fp_rate[15], 101);
        assert!(evs[1].ts_scalers.is_empty());
    }

    #[test]
    fn test_ts_scalers_too_short() {
        let words = [0u32; 50];
        let mut evs = events(1);
        assert!(matches!(
            decode_ts(WordCursor::new(&words), &mut evs),
            Err(DecodeError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_f250_scalers_fill_channels() {
        let words = [9, 1000, 2, (4 << 24) | 3, 10, 11, 12, (5 << 24) | 1, 99];
        let mut evs = events(1);
        decode_f250(WordCursor::new(&words), 40, &mut evs).unwrap();

        assert_eq!(evs[0].f250_scalers[0].trig_number, 1000);
        let counts = |slot, ch| {
            evs[0]
                .channels
                .get(&ChannelKey::new(40, slot, ch))
                .map(|c| c.scaler_counts.clone())
        };
        assert_eq!(counts(4, 2), Some(vec![12]));
        assert_eq!(counts(5, 0), Some(vec![99]));
        assert_eq!(counts(5, 1), None);
    }

    #[test]
    fn test_f250_scaler_record_overrun() {
        let words = [9, 1000, 2, (4 << 24) | 16, 10];
        let mut evs = events(1);
        assert!(matches!(
            decode_f250(WordCursor::new(&words), 40, &mut evs),
            Err(DecodeError::Overrun(_))
        ));
    }
}
