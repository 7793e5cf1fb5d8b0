//! Banks written back by offline reconstruction.
//!
//! Vertex (0x5555) and RF bunch (0x5556) banks hold fixed-size records with
//! floats stored as their IEEE-754 bit patterns.

use super::first_event;
use crate::cursor::WordCursor;
use crate::error::DecodeError;
use crate::layout::size;
use crate::model::{DecodedEvent, RfBunch, Vertex};
use std::ops::DerefMut;

fn check_records(cur: &WordCursor<'_>, record: usize, context: &'static str) -> Result<(), DecodeError> {
    if cur.remaining() % record == 0 {
        Ok(())
    } else {
        Err(DecodeError::invalid(
            context,
            format!("{} words is not a multiple of {record}", cur.remaining()),
        ))
    }
}

/// Decode a vertex bank.
pub fn decode_vertices<E: DerefMut<Target = DecodedEvent>>(
    mut cur: WordCursor<'_>,
    events: &mut [E],
) -> Result<(), DecodeError> {
    check_records(&cur, size::VERTEX, "vertex")?;
    let event = first_event(events, "vertex")?;
    while !cur.is_empty() {
        let w = cur.take(size::VERTEX)?;
        event.vertices.push(Vertex {
            x: f32::from_bits(w[0]),
            y: f32::from_bits(w[1]),
            z: f32::from_bits(w[2]),
            t: f32::from_bits(w[3]),
            chi2: f32::from_bits(w[4]),
            ndf: w[5],
        });
    }
    Ok(())
}

/// Decode an RF bunch bank.
pub fn decode_rf_bunches<E: DerefMut<Target = DecodedEvent>>(
    mut cur: WordCursor<'_>,
    events: &mut [E],
) -> Result<(), DecodeError> {
    check_records(&cur, size::RF_BUNCH, "RF bunch")?;
    let event = first_event(events, "RF bunch")?;
    while !cur.is_empty() {
        let w = cur.take(size::RF_BUNCH)?;
        event.rf_bunches.push(RfBunch {
            time: f32::from_bits(w[0]),
            time_variance: f32::from_bits(w[1]),
            num_votes: w[2],
        });
    }
    Ok(())
}
