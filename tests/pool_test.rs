//! Buffer and event recycling across repeated decodes.

mod common;

use common::{corrupt_block, physics_block};
use rust_evio::block::{AcquisitionUnit, JobFlags, RawBufferPool};
use rust_evio::config::DecodeConfig;
use rust_evio::parser::DecodeOptions;
use rust_evio::pipeline::{decode_unit, event_pool};

fn unit(buffers: &mut RawBufferPool, words: &[u32], seq: u64) -> AcquisitionUnit {
    let mut block = buffers.acquire();
    block.grow_to(words.len());
    block.buffer_mut()[..words.len()].copy_from_slice(words);
    block.set_len(words.len());
    AcquisitionUnit::new(block, seq, JobFlags::FULL_PARSE | JobFlags::LINK)
}

#[test]
fn test_events_are_reused_between_units() {
    let config = DecodeConfig::default();
    let options = DecodeOptions::from_config(&config);
    let mut buffers = RawBufferPool::new(64, 4);
    let mut events = event_pool(&config);

    for seq in 0..10 {
        let done = decode_unit(unit(&mut buffers, &physics_block(seq * 4, 4), seq), &mut events, &options);
        assert_eq!(done.events.len(), 4);
        assert_eq!(done.events[0].event_number, seq * 4);
    }

    let stats = events.stats();
    assert_eq!(stats.allocated, 4);
    assert_eq!(stats.outstanding, 0);
    assert!(stats.reused >= 36);
    assert_eq!(buffers.stats().outstanding, 0);
    assert_eq!(buffers.stats().allocated, 1);
}

#[test]
fn test_reuse_limit_replaces_events() {
    let mut config = DecodeConfig::default();
    config.max_event_reuse = 2;
    let options = DecodeOptions::from_config(&config);
    let mut buffers = RawBufferPool::new(64, 4);
    let mut events = event_pool(&config);

    for seq in 0..6 {
        drop(decode_unit(unit(&mut buffers, &physics_block(0, 1), seq), &mut events, &options));
    }
    let stats = events.stats();
    assert!(stats.evicted > 0);
    assert!(stats.allocated > 1);
}

#[test]
fn test_abandoned_unit_returns_everything() {
    let config = DecodeConfig::default();
    let options = DecodeOptions::from_config(&config);
    let mut buffers = RawBufferPool::new(64, 4);
    let mut events = event_pool(&config);

    let done = decode_unit(unit(&mut buffers, &corrupt_block(), 9), &mut events, &options);
    assert_eq!(done.seq, 9);
    assert!(done.error.is_some());
    assert!(done.events.is_empty());
    assert_eq!(events.stats().outstanding, 0);
    assert_eq!(buffers.stats().outstanding, 0);
}

#[test]
fn test_terminate_unit_decodes_nothing() {
    let config = DecodeConfig::default();
    let mut events = event_pool(&config);
    let done = decode_unit(AcquisitionUnit::terminate(5), &mut events, &DecodeOptions::default());
    assert_eq!(done.seq, 5);
    assert!(done.events.is_empty() && done.error.is_none());
}
