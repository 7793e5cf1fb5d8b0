//! End-to-end tests for the decode pipeline: ordering, abandonment, byte
//! order, file input and looping.

mod common;

use common::{control_block, corrupt_block, module_time, physics_block, timestamp, RUN};
use evio_pool::Pooled;
use rust_evio::config::DecodeConfig;
use rust_evio::layout::tag;
use rust_evio::pipeline::{DecodePipeline, EventSink};
use rust_evio::reader::{write_blocks, EvioFileReader, MemoryReader};
use rust_evio::{DecodeError, DecodedEvent};

#[derive(Debug, Clone, PartialEq)]
struct Seen {
    seq: u64,
    event_number: u64,
    run_number: u32,
    trigger_time: Option<u64>,
    hits: Vec<(u32, Option<u64>)>,
}

#[derive(Default)]
struct Recorder {
    events: Vec<Seen>,
    abandoned: Vec<u64>,
}

impl EventSink for Recorder {
    fn deliver(&mut self, seq: u64, event: Pooled<DecodedEvent>) {
        let hits = event
            .channels
            .iter()
            .flat_map(|bucket| bucket.fadc250.iter())
            .map(|hit| (hit.itrigger, hit.trigger_time))
            .collect();
        self.events.push(Seen {
            seq,
            event_number: event.event_number,
            run_number: event.run_number,
            trigger_time: event.trigger_time,
            hits,
        });
    }

    fn unit_abandoned(&mut self, seq: u64, _error: &DecodeError) {
        self.abandoned.push(seq);
    }
}

fn config(workers: usize, strict: bool) -> DecodeConfig {
    let mut config = DecodeConfig::default();
    config.pipeline.workers = workers;
    config.pipeline.in_flight = workers * 2;
    config.pipeline.strict_order = strict;
    config
}

/// `blocks` physics blocks of `per_block` events, numbered from 0.
fn physics_stream(blocks: usize, per_block: usize) -> Vec<Vec<u32>> {
    (0..blocks)
        .map(|b| physics_block((b * per_block) as u64, per_block))
        .collect()
}

fn run(blocks: Vec<Vec<u32>>, config: DecodeConfig) -> (rust_evio::PipelineStats, Recorder) {
    let mut pipeline = DecodePipeline::new(MemoryReader::new(blocks), Recorder::default(), config);
    let stats = pipeline.run().unwrap();
    let (_, recorder) = pipeline.into_parts();
    (stats, recorder)
}

#[test]
fn test_strict_order_decodes_and_links() {
    let (stats, recorder) = run(physics_stream(20, 5), config(4, true));

    assert_eq!(stats.blocks_read, 20);
    assert_eq!(stats.units_decoded, 20);
    assert_eq!(stats.events_delivered, 100);

    for (i, seen) in recorder.events.iter().enumerate() {
        assert_eq!(seen.event_number, i as u64);
        assert_eq!(seen.seq, (i / 5) as u64);
        assert_eq!(seen.run_number, RUN);
        assert_eq!(seen.trigger_time, Some(timestamp(i as u64)));
        assert_eq!(seen.hits.len(), 1);
        let (itrigger, time) = seen.hits[0];
        assert_eq!(itrigger, i as u32);
        assert_eq!(time, Some(module_time(itrigger)));
    }
}

#[test]
fn test_completion_order_delivers_everything() {
    let (stats, recorder) = run(physics_stream(60, 3), config(8, false));
    assert_eq!(stats.events_delivered, 180);

    let mut numbers: Vec<u64> = recorder.events.iter().map(|s| s.event_number).collect();
    numbers.sort_unstable();
    assert_eq!(numbers, (0..180).collect::<Vec<_>>());
}

#[test]
fn test_corrupt_unit_is_abandoned_without_stalling() {
    let blocks = vec![physics_block(0, 2), corrupt_block(), physics_block(2, 2)];
    let (stats, recorder) = run(blocks, config(2, true));

    assert_eq!(stats.units_abandoned, 1);
    assert_eq!(stats.units_decoded, 2);
    assert_eq!(recorder.abandoned, vec![1]);
    let seqs: Vec<u64> = recorder.events.iter().map(|s| s.seq).collect();
    assert_eq!(seqs, vec![0, 0, 2, 2]);
}

#[test]
fn test_swapped_input_matches_native() {
    let blocks = physics_stream(6, 4);
    let (_, native) = run(blocks.clone(), config(3, true));

    let reader = MemoryReader::new(blocks).with_swapped_output();
    let mut pipeline = DecodePipeline::new(reader, Recorder::default(), config(3, true));
    let stats = pipeline.run().unwrap();
    let (_, swapped) = pipeline.into_parts();

    assert_eq!(stats.units_abandoned, 0);
    assert_eq!(swapped.events, native.events);
}

#[test]
fn test_control_events_carry_run_number() {
    let blocks = vec![
        control_block(tag::PRESTART, 1_700_000_000, 71_234),
        control_block(tag::GO, 1_700_000_005, 0),
        physics_block(0, 2),
        control_block(tag::END, 1_700_000_100, 0),
    ];
    let (stats, recorder) = run(blocks, config(2, true));
    assert_eq!(stats.events_delivered, 5);
    assert_eq!(recorder.events[0].run_number, 71_234);
    assert_eq!(recorder.events[2].run_number, RUN);
}

#[test]
fn test_file_input_with_loop_and_block_limit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.evio");
    let file = std::fs::File::create(&path).unwrap();
    write_blocks(std::io::BufWriter::new(file), &physics_stream(3, 4)).unwrap();

    let mut config = config(2, true);
    config.pipeline.loop_forever = true;
    config.pipeline.max_blocks = Some(7);
    config.min_buffer_words = 16;

    let reader = EvioFileReader::open(&path).unwrap();
    let mut pipeline = DecodePipeline::new(reader, Recorder::default(), config);
    let stats = pipeline.run().unwrap();
    let (reader, recorder) = pipeline.into_parts();

    assert_eq!(stats.blocks_read, 7);
    assert_eq!(stats.rewinds, 2);
    assert!(stats.buffer_growths > 0);
    assert_eq!(recorder.events.len(), 28);
    assert_eq!(recorder.events[12].event_number, 0);
    assert_eq!(reader.path(), path.as_path());
}

#[test]
fn test_missing_file_is_open_error() {
    let err = EvioFileReader::open("/nonexistent/run.evio").unwrap_err();
    assert_eq!(err.exit_code(), 3);
}
