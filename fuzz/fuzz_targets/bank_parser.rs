//! Fuzz target for the bank parser.
//!
//! Tests:
//! - Arbitrary words never panic the parser or any leaf decoder
//! - Foreign-order words never panic the byte swapper
//! - Every event is back in the pool once the result is dropped

#![no_main]

use arbitrary::Arbitrary;
use evio_pool::{PoolSettings, RecyclePool};
use libfuzzer_sys::fuzz_target;
use rust_evio::linker::link_events;
use rust_evio::parser::{parse_block, DecodeOptions};
use rust_evio::swap::swap_block;
use rust_evio::DecodedEvent;

#[derive(Debug, Arbitrary)]
struct BlockInput {
    /// Run the byte swapper first
    swap: bool,
    words: Vec<u32>,
}

fuzz_target!(|input: BlockInput| {
    let mut words = input.words;
    if input.swap && swap_block(&mut words).is_err() {
        return;
    }

    let options = DecodeOptions::default();
    let mut pool = RecyclePool::new(
        PoolSettings::with_max_pooled(64),
        || DecodedEvent::new(Some(10)),
        DecodedEvent::reset,
    );
    if let Ok(mut events) = parse_block(&words, &options, &mut pool) {
        link_events(&mut events, &options.link);
    }
    assert_eq!(pool.stats().outstanding, 0);
});
