//! Decode pipeline: single-threaded acquisition, parallel decoding, ordered delivery.
//!
//! ```text
//!  reader ──► acquisition ──► unit channel ──► worker 0..N ──► done channel ──► collector ──► sink
//!   (BlockReader)  │  RawBufferPool          (own event pool)               OutputSequencer
//!                  └──────────── in-flight tokens ◄───────────────────────────────┘
//! ```
//!
//! The acquisition loop (on the calling thread) reads raw blocks into pooled
//! buffers, numbers them and sends them to the workers. It needs a token per
//! unit; the collector hands a token back each time a unit leaves the
//! sequencer, which bounds the number of units in flight and therefore the
//! strict-order reorder window. Workers own their [`DecodedEvent`] pools, so
//! decoding shares no mutable state; pooled objects return to their pool from
//! whatever thread drops them.
//!
//! A unit whose decode fails is abandoned: its events are dropped (and thereby
//! reset into the pool) and the collector still receives an empty unit, so
//! strict ordering never waits on it.

use crate::block::{AcquisitionUnit, JobFlags, RawBlock, RawBufferPool};
use crate::config::DecodeConfig;
use crate::error::{DecodeError, EvioError, ReadError};
use crate::linker::link_events;
use crate::model::DecodedEvent;
use crate::parser::{parse_block, DecodeOptions};
use crate::reader::{BlockReader, ReadOutcome, ReadStatus};
use crate::sequencer::{OrderPolicy, OutputSequencer};
use crate::swap::swap_block;
use crossbeam_channel::{bounded, Receiver, Sender};
use evio_pool::{PoolSettings, Pooled, RecyclePool};
use serde::Serialize;
use std::io::Write;
use tracing::{debug, info, warn};

/// Receives decoded events.
pub trait EventSink: Send {
    /// One decoded event from the unit with sequence number `seq`.
    ///
    /// Dropping `event` returns it to its worker's pool.
    fn deliver(&mut self, seq: u64, event: Pooled<DecodedEvent>);

    /// The unit with sequence number `seq` was abandoned.
    fn unit_abandoned(&mut self, seq: u64, error: &DecodeError) {
        let _ = (seq, error);
    }
}

impl<F> EventSink for F
where
    F: FnMut(u64, Pooled<DecodedEvent>) + Send,
{
    fn deliver(&mut self, seq: u64, event: Pooled<DecodedEvent>) {
        self(seq, event);
    }
}

/// Writes every event as one JSON line.
pub struct JsonLinesSink<W> {
    out: W,
    written: u64,
    error: Option<std::io::Error>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Sink writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            written: 0,
            error: None,
        }
    }

    /// Lines written so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and report the first write error, if any.
    pub fn finish(mut self) -> std::io::Result<u64> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.out.flush()?;
        Ok(self.written)
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn deliver(&mut self, _seq: u64, event: Pooled<DecodedEvent>) {
        if self.error.is_some() {
            return;
        }
        let result = serde_json::to_writer(&mut self.out, &*event)
            .map_err(std::io::Error::from)
            .and_then(|()| self.out.write_all(b"\n"));
        match result {
            Ok(()) => self.written += 1,
            Err(err) => self.error = Some(err),
        }
    }
}

/// A unit after decoding.
#[derive(Debug)]
pub struct DecodedUnit {
    /// Acquisition sequence number.
    pub seq: u64,
    /// Decoded events (empty when abandoned).
    pub events: Vec<Pooled<DecodedEvent>>,
    /// Why the unit was abandoned.
    pub error: Option<DecodeError>,
}

/// Counters reported by [`DecodePipeline::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Blocks read from the reader.
    pub blocks_read: u64,
    /// Units decoded without error.
    pub units_decoded: u64,
    /// Units abandoned after a decode error.
    pub units_abandoned: u64,
    /// Events handed to the sink.
    pub events_delivered: u64,
    /// Buffers grown after an undersized read.
    pub buffer_growths: u64,
    /// Reader rewinds in loop mode.
    pub rewinds: u64,
}

/// Decode one unit: swap if flagged, parse, release the raw block, link.
///
/// Linking works on what parsing produced, so `LINK` without `FULL_PARSE`
/// returns an empty unit.
///
/// Public so an external scheduler can drive the decode step itself.
pub fn decode_unit(
    mut unit: AcquisitionUnit,
    pool: &mut RecyclePool<DecodedEvent>,
    options: &DecodeOptions,
) -> DecodedUnit {
    let seq = unit.seq();
    let flags = unit.flags();
    let parsed = match unit.block_mut() {
        Some(block) if !flags.contains(JobFlags::TERMINATE) => parse_raw(block, flags, pool, options),
        _ => Ok(Vec::new()),
    };
    unit.release_block();

    match parsed {
        Ok(mut events) => {
            if flags.contains(JobFlags::LINK) {
                link_events(&mut events, &options.link);
            }
            DecodedUnit {
                seq,
                events,
                error: None,
            }
        }
        Err(error) => {
            warn!(seq, error = %error, class = %error.class(), "Abandoning unit");
            DecodedUnit {
                seq,
                events: Vec::new(),
                error: Some(error),
            }
        }
    }
}

fn parse_raw(
    block: &mut RawBlock,
    flags: JobFlags,
    pool: &mut RecyclePool<DecodedEvent>,
    options: &DecodeOptions,
) -> Result<Vec<Pooled<DecodedEvent>>, DecodeError> {
    if flags.contains(JobFlags::SWAP) {
        swap_block(block.words_mut())?;
    }
    if !flags.contains(JobFlags::FULL_PARSE) {
        return Ok(Vec::new());
    }
    parse_block(block.words(), options, pool)
}

/// Event pool for one worker.
#[must_use]
pub fn event_pool(config: &DecodeConfig) -> RecyclePool<DecodedEvent> {
    let object_reuse = config.object_reuse_limit();
    let settings = PoolSettings::with_max_pooled(config.max_pooled_events)
        .max_reuse(config.max_event_reuse);
    RecyclePool::new(
        settings,
        move || DecodedEvent::new(object_reuse),
        DecodedEvent::reset,
    )
}

/// Reader, workers and sink wired together.
pub struct DecodePipeline<R, S> {
    reader: R,
    sink: S,
    config: DecodeConfig,
}

impl<R: BlockReader, S: EventSink> DecodePipeline<R, S> {
    /// Pipeline reading from `reader` and delivering to `sink`.
    pub fn new(reader: R, sink: S, config: DecodeConfig) -> Self {
        Self {
            reader,
            sink,
            config,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    /// Give back the reader and sink.
    pub fn into_parts(self) -> (R, S) {
        (self.reader, self.sink)
    }

    /// Run until the reader is exhausted (or `max_blocks` is reached).
    pub fn run(&mut self) -> Result<PipelineStats, EvioError> {
        let Self {
            reader,
            sink,
            config,
        } = self;
        let options = DecodeOptions::from_config(config);
        let workers = config.pipeline.workers.max(1);
        let in_flight = config.pipeline.in_flight.max(workers);
        let policy = OrderPolicy::from_strict(config.pipeline.strict_order);

        let (unit_tx, unit_rx) = bounded::<AcquisitionUnit>(in_flight);
        let (done_tx, done_rx) = bounded::<DecodedUnit>(in_flight);
        let (token_tx, token_rx) = bounded::<()>(in_flight);
        for _ in 0..in_flight {
            token_tx
                .send(())
                .map_err(|_| EvioError::Pipeline("token channel closed".to_string()))?;
        }

        info!(workers, in_flight, ?policy, "Starting decode pipeline");
        let config: &DecodeConfig = config;
        let options = &options;

        std::thread::scope(|scope| {
            let worker_handles: Vec<_> = (0..workers)
                .map(|id| {
                    let rx = unit_rx.clone();
                    let tx = done_tx.clone();
                    scope.spawn(move || worker_loop(id, &rx, &tx, event_pool(config), options))
                })
                .collect();
            drop(unit_rx);
            drop(done_tx);

            let collector =
                scope.spawn(move || collect(&done_rx, &token_tx, sink, policy, in_flight));

            let mut buffers = RawBufferPool::new(config.min_buffer_words, config.max_pooled_buffers);
            let mut acq = Acquisition::default();
            let acquired = acq.run(reader, &mut buffers, &unit_tx, &token_rx, config);
            if let Err(err) = &acquired {
                warn!(error = %err, "Acquisition stopped");
            }

            for i in 0..workers {
                if unit_tx.send(AcquisitionUnit::terminate(acq.next_seq + i as u64)).is_err() {
                    break;
                }
            }
            drop(unit_tx);
            drop(token_rx);

            let mut panicked = false;
            for handle in worker_handles {
                panicked |= handle.join().is_err();
            }
            let collected = collector
                .join()
                .map_err(|_| EvioError::Pipeline("collector thread panicked".to_string()))?;
            if panicked {
                return Err(EvioError::Pipeline("decode worker panicked".to_string()));
            }
            acquired?;

            let stats = PipelineStats {
                blocks_read: acq.blocks_read,
                buffer_growths: acq.buffer_growths,
                rewinds: acq.rewinds,
                ..collected
            };
            info!(
                blocks = stats.blocks_read,
                decoded = stats.units_decoded,
                abandoned = stats.units_abandoned,
                events = stats.events_delivered,
                "Decode pipeline finished"
            );
            Ok(stats)
        })
    }
}

#[derive(Debug, Default)]
struct Acquisition {
    next_seq: u64,
    blocks_read: u64,
    buffer_growths: u64,
    rewinds: u64,
}

impl Acquisition {
    fn run<R: BlockReader>(
        &mut self,
        reader: &mut R,
        buffers: &mut RawBufferPool,
        units: &Sender<AcquisitionUnit>,
        tokens: &Receiver<()>,
        config: &DecodeConfig,
    ) -> Result<(), EvioError> {
        let pipeline = &config.pipeline;
        let mut since_rewind = 0u64;

        loop {
            if pipeline.max_blocks.is_some_and(|max| self.blocks_read >= max) {
                debug!(blocks = self.blocks_read, "Reached block limit");
                return Ok(());
            }

            let mut block = buffers.acquire();
            let outcome = self.read_with_retry(reader, &mut block)?;
            match outcome.status {
                ReadStatus::Ok { len } => {
                    block.set_len(len);
                    block.set_swap_needed(outcome.swap_needed);
                    let mut flags = JobFlags::FULL_PARSE | JobFlags::LINK;
                    if outcome.swap_needed {
                        flags.insert(JobFlags::SWAP);
                    }

                    if tokens.recv().is_err() {
                        return Err(EvioError::Pipeline("collector stopped".to_string()));
                    }
                    let unit = AcquisitionUnit::new(block, self.next_seq, flags);
                    units
                        .send(unit)
                        .map_err(|_| EvioError::Pipeline("decode workers stopped".to_string()))?;
                    self.next_seq += 1;
                    self.blocks_read += 1;
                    since_rewind += 1;
                }
                ended @ (ReadStatus::EndOfStream | ReadStatus::Truncated) => {
                    if ended == ReadStatus::Truncated {
                        if pipeline.truncation_fatal {
                            return Err(ReadError::Truncated.into());
                        }
                        warn!(seq = self.next_seq, "Truncated block treated as end of stream");
                    }
                    if pipeline.loop_forever && since_rewind > 0 {
                        reader.rewind()?;
                        self.rewinds += 1;
                        since_rewind = 0;
                        debug!(rewinds = self.rewinds, "Rewound reader");
                        continue;
                    }
                    return Ok(());
                }
                status @ (ReadStatus::Error { .. } | ReadStatus::BufferTooSmall { .. }) => {
                    let err = status
                        .into_error()
                        .unwrap_or(ReadError::EndOfStream);
                    return Err(err.into());
                }
            }
        }
    }

    /// Read into `block`, growing it once if the reader asks for more room.
    fn read_with_retry<R: BlockReader>(
        &mut self,
        reader: &mut R,
        block: &mut RawBlock,
    ) -> Result<ReadOutcome, ReadError> {
        let outcome = reader.read(block.buffer_mut());
        let ReadStatus::BufferTooSmall { required } = outcome.status else {
            return Ok(outcome);
        };

        debug!(
            required,
            capacity = block.capacity(),
            "Growing raw buffer for oversized block"
        );
        block.grow_to(required);
        self.buffer_growths += 1;

        let retry = reader.read(block.buffer_mut());
        match retry.status {
            ReadStatus::BufferTooSmall { required } => Err(ReadError::GrowRetryFailed { required }),
            _ => Ok(retry),
        }
    }
}

fn worker_loop(
    id: usize,
    units: &Receiver<AcquisitionUnit>,
    done: &Sender<DecodedUnit>,
    mut pool: RecyclePool<DecodedEvent>,
    options: &DecodeOptions,
) {
    debug!(worker = id, "Decode worker started");
    for unit in units.iter() {
        if unit.is_terminate() {
            break;
        }
        if done.send(decode_unit(unit, &mut pool, options)).is_err() {
            break;
        }
    }
    let stats = pool.stats();
    debug!(
        worker = id,
        allocated = stats.allocated,
        reused = stats.reused,
        evicted = stats.evicted,
        "Decode worker stopped"
    );
}

fn collect<S: EventSink>(
    done: &Receiver<DecodedUnit>,
    tokens: &Sender<()>,
    sink: &mut S,
    policy: OrderPolicy,
    window: usize,
) -> PipelineStats {
    let mut stats = PipelineStats::default();
    let mut sequencer = OutputSequencer::new(policy, window);

    let mut deliver = |unit: DecodedUnit, stats: &mut PipelineStats| {
        match &unit.error {
            Some(err) => {
                stats.units_abandoned += 1;
                sink.unit_abandoned(unit.seq, err);
            }
            None => stats.units_decoded += 1,
        }
        for event in unit.events {
            stats.events_delivered += 1;
            sink.deliver(unit.seq, event);
        }
        // The acquisition side may already be gone at shutdown.
        let _ = tokens.send(());
    };

    for unit in done.iter() {
        sequencer.push(unit.seq, unit);
        while let Some(ready) = sequencer.pop_ready() {
            deliver(ready, &mut stats);
        }
    }
    for unit in sequencer.finish() {
        deliver(unit, &mut stats);
    }
    stats
}
