//! Synthetic EVIO block builders shared by the integration tests.

#![allow(dead_code)]

use rust_evio::layout::{det, DataType, ModuleType};
use rust_evio::parser::header::{encode_bank_header, encode_segment_header};

/// Run number written into every built trigger bank.
pub const RUN: u32 = 30_300;

/// Readout controller used by [`physics_block`].
pub const ROCID: u32 = 20;

/// Slot of the f250 in [`physics_block`].
pub const SLOT: u32 = 3;

/// A bank with its two-word header.
pub fn bank(tag: u32, data_type: DataType, num: u32, payload: &[u32]) -> Vec<u32> {
    let mut words = encode_bank_header(tag, data_type, num, payload.len()).to_vec();
    words.extend_from_slice(payload);
    words
}

fn split(v: u64) -> [u32; 2] {
    [v as u32, (v >> 32) as u32]
}

/// Built trigger bank with timestamps and run info for `n` events on one ROC.
pub fn built_trigger(first_event: u64, n: usize, rocid: u32) -> Vec<u32> {
    let mut common = split(first_event).to_vec();
    for i in 0..n {
        common.extend(split(timestamp(first_event.wrapping_add(i as u64))));
    }
    common.extend(split((u64::from(RUN) << 32) | 1));

    let mut payload = vec![encode_segment_header(1, DataType::U64, common.len())];
    payload.extend(common);

    let type_words = n.div_ceil(2);
    payload.push(encode_segment_header(2, DataType::U16, type_words));
    payload.extend(std::iter::repeat((1 << 16) | 1).take(type_words));

    let mut roc = Vec::new();
    for i in 0..n {
        roc.extend(split(timestamp(first_event.wrapping_add(i as u64))));
        roc.push(0xAB);
    }
    payload.push(encode_segment_header(rocid, DataType::U32, roc.len()));
    payload.extend(roc);

    bank(0xFF23, DataType::Segment, 1, &payload)
}

/// Event-level timestamp written for `event_number`.
pub fn timestamp(event_number: u64) -> u64 {
    event_number.wrapping_mul(40).wrapping_add(1_000_000)
}

/// One f250 block: each event has a module trigger time and one window.
pub fn f250_block(slot: u32, first_trigger: u32, n: usize) -> Vec<u32> {
    let mut words = vec![
        det::FILLER,
        0x8000_0000 | (slot << 22) | (ModuleType::Fadc250.id() << 18) | n as u32,
    ];
    for i in 0..n as u32 {
        let itrigger = first_trigger.wrapping_add(i) & 0x3F_FFFF;
        words.push(0x9000_0000 | itrigger);
        words.push(0x9800_0000 | module_time(itrigger) as u32);
        words.push(0xA000_0000 | ((i % 16) << 23) | 2);
        words.push((i << 16) | (i + 1));
    }
    words.push(0x8800_0000 | (slot << 22));
    words
}

/// Module trigger time reported for `itrigger`.
pub fn module_time(itrigger: u32) -> u64 {
    u64::from(itrigger) * 4 + 7
}

/// A physics block of `n` events from one ROC carrying one f250.
pub fn physics_block(first_event: u64, n: usize) -> Vec<u32> {
    let data = bank(det::JLAB_MODULES, DataType::U32, 0, &f250_block(SLOT, first_event as u32, n));
    let roc = bank(ROCID, DataType::Bank, n as u32, &data);

    let mut payload = built_trigger(first_event, n, ROCID);
    payload.extend(roc);
    bank(0xFF50, DataType::Bank, n as u32, &payload)
}

/// An EPICS bank whose string segment sits under `depth` nested segments.
pub fn nested_epics_block(depth: usize) -> Vec<u32> {
    let mut payload = Vec::with_capacity(depth + 3);
    for level in 0..depth {
        let length = depth + 2 - level;
        payload.push(encode_segment_header(0x62, DataType::Segment, length));
    }
    payload.push(encode_segment_header(0x62, DataType::Char8, 2));
    payload.push(u32::from_le_bytes(*b"HALL"));
    payload.push(u32::from_le_bytes(*b"=1\0\0"));
    bank(0x0060, DataType::Segment, 0, &payload)
}

/// A CODA control event.
pub fn control_block(tag: u32, time: u32, run: u32) -> Vec<u32> {
    bank(tag, DataType::U32, 0, &[time, run, 0])
}

/// A block whose physics bank overruns its declared length.
pub fn corrupt_block() -> Vec<u32> {
    let mut roc = encode_bank_header(ROCID, DataType::Bank, 1, 10).to_vec();
    roc.extend([0, 0]);
    bank(0xFF50, DataType::Bank, 1, &roc)
}
