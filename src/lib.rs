//! # Rust EVIO Decoder
//!
//! Pooled, multi-threaded decoder for EVIO detector readout data. Raw blocks
//! come from a [`reader::BlockReader`], are decoded in parallel into pooled
//! [`model::DecodedEvent`]s, linked to their trigger times and module
//! configurations, and handed to an [`pipeline::EventSink`] in completion or
//! stream order.
//!
//! ## Crate Structure
//!
//! - **`block`**: raw word buffers, their pool, and the acquisition unit passed to workers.
//! - **`config`**: `DecodeConfig`, loaded with Figment from defaults, TOML and `RUST_EVIO_*`.
//! - **`cursor`**: bounds-checked word cursor used by every decoder.
//! - **`decoders`**: one module per bank or hardware module format.
//! - **`error`**: `DecodeError`, `ReadError`, `ConfigError` and the crate-level `EvioError`.
//! - **`layout`**: wire constants (tags, data types, detector ids, module word layouts).
//! - **`linker`**: attaches trigger times and configurations to hits.
//! - **`logging`**: tracing-subscriber setup.
//! - **`model`**: decoded record types and the per-event container.
//! - **`parser`**: recursive bank walk and tag dispatch.
//! - **`pipeline`**: acquisition thread, decode workers and ordered delivery.
//! - **`reader`**: block sources (memory and EVIO v4 files).
//! - **`sequencer`**: completion-order or strict-order release of decoded units.
//! - **`swap`**: byte-order correction of foreign-endian blocks.

pub mod block;
pub mod config;
pub mod cursor;
pub mod decoders;
pub mod error;
pub mod layout;
pub mod linker;
pub mod logging;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod reader;
pub mod sequencer;
pub mod swap;

pub use block::{AcquisitionUnit, JobFlags, RawBlock, RawBufferPool};
pub use config::DecodeConfig;
pub use error::{DecodeError, ErrorClass, EvioError, EvioResult, ReadError};
pub use model::DecodedEvent;
pub use pipeline::{decode_unit, DecodePipeline, DecodedUnit, EventSink, PipelineStats};
pub use reader::{BlockReader, EvioFileReader, MemoryReader, ReadOutcome, ReadStatus};
pub use sequencer::{OrderPolicy, OutputSequencer};
