//! Decoder configuration using Figment.
//!
//! Configuration is loaded from, in increasing priority:
//! 1. built-in defaults (every field has one, so an empty file is valid)
//! 2. a TOML file (`config/rust_evio.toml` by default)
//! 3. environment variables prefixed with `RUST_EVIO_`, nested keys split on `__`
//!
//! # Example
//! ```no_run
//! use rust_evio::config::DecodeConfig;
//!
//! // RUST_EVIO_PIPELINE__WORKERS=8 overrides [pipeline] workers
//! let config = DecodeConfig::load_from("config/rust_evio.toml")?;
//! println!("decoding with {} workers", config.pipeline.workers);
//! # Ok::<(), rust_evio::error::ConfigError>(())
//! ```

use crate::error::ConfigError;
use crate::logging::OutputFormat;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "RUST_EVIO_";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/rust_evio.toml";

/// Top-level decoder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Diagnostic verbosity, 0 (quiet) to 10 (everything).
    pub verbosity: u8,
    /// Log output format.
    pub log_format: OutputFormat,
    /// Maximum decoded events resting in each worker's pool.
    pub max_pooled_events: usize,
    /// Times a decoded event object is reused before it is replaced.
    pub max_event_reuse: u32,
    /// Times a channel-hit bucket is reused before it is replaced.
    pub max_object_reuse: u32,
    /// Maximum raw buffers resting in the buffer pool.
    pub max_pooled_buffers: usize,
    /// Maximum events decoded from one block.
    pub max_events_per_unit: usize,
    /// Initial raw buffer size in words.
    pub min_buffer_words: usize,
    /// Readout controllers to decode. Empty means all.
    pub rocids: Vec<u32>,
    /// Force this run number on every decoded event.
    pub run_number_override: Option<u32>,
    /// Per-module decode switches.
    pub parse: ParseFlags,
    /// Association switches.
    pub link: LinkFlags,
    /// Pipeline settings.
    pub pipeline: PipelineConfig,
}

/// Which banks to decode. Disabled banks are skipped without being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseFlags {
    /// f250 flash ADC.
    pub f250: bool,
    /// f125 flash ADC.
    pub f125: bool,
    /// F1 TDC (both variants).
    pub f1tdc: bool,
    /// CAEN 1290 TDC.
    pub caen1290: bool,
    /// Module configuration bank.
    pub module_config: bool,
    /// Beginning-of-run bank.
    pub bor: bool,
    /// EPICS bank.
    pub epics: bool,
    /// Event tag bank.
    pub event_tag: bool,
    /// Built trigger bank and module trigger times.
    pub trigger: bool,
    /// Run-control events.
    pub control: bool,
    /// TS and f250 scaler banks.
    pub scalers: bool,
    /// Offline vertex and RF bunch banks.
    pub offline: bool,
}

impl Default for ParseFlags {
    fn default() -> Self {
        Self {
            f250: true,
            f125: true,
            f1tdc: true,
            caen1290: true,
            module_config: true,
            bor: true,
            epics: true,
            event_tag: true,
            trigger: true,
            control: true,
            scalers: true,
            offline: true,
        }
    }
}

/// Which records the linker attaches trigger times and configurations to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkFlags {
    /// Attach trigger times.
    pub trigger_time: bool,
    /// Attach module configurations.
    pub config: bool,
    /// Link f250 windows.
    pub f250: bool,
    /// Link f125 windows.
    pub f125: bool,
    /// Link F1 TDC hits.
    pub f1tdc: bool,
    /// Link CAEN 1290 hits.
    pub caen1290: bool,
}

impl Default for LinkFlags {
    fn default() -> Self {
        Self {
            trigger_time: true,
            config: true,
            f250: true,
            f125: true,
            f1tdc: true,
            caen1290: true,
        }
    }
}

/// Decode pipeline settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Decode worker threads.
    pub workers: usize,
    /// Deliver events in stream order instead of completion order.
    pub strict_order: bool,
    /// Maximum acquisition units in flight.
    pub in_flight: usize,
    /// Rewind the reader at end of stream.
    pub loop_forever: bool,
    /// Treat a truncated final block as fatal instead of end of stream.
    pub truncation_fatal: bool,
    /// Stop after this many blocks (all blocks when unset).
    pub max_blocks: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            strict_order: false,
            in_flight: 32,
            loop_forever: false,
            truncation_fatal: false,
            max_blocks: None,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8))
        .unwrap_or(4)
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            log_format: OutputFormat::Compact,
            max_pooled_events: 128,
            max_event_reuse: 1000,
            max_object_reuse: 1000,
            max_pooled_buffers: 64,
            max_events_per_unit: 1024,
            min_buffer_words: 4000,
            rocids: Vec::new(),
            run_number_override: None,
            parse: ParseFlags::default(),
            link: LinkFlags::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl DecodeConfig {
    /// Load from the default path and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path and the environment, then validate.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(path.as_ref()).extract()?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Provider stack used by [`DecodeConfig::load_from`].
    #[must_use]
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(DecodeConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbosity > 10 {
            return Err(format!(
                "Invalid verbosity {}. Must be 0-10",
                self.verbosity
            ));
        }

        if self.max_pooled_events == 0 {
            return Err("max_pooled_events must be greater than 0".to_string());
        }

        if self.max_pooled_buffers == 0 {
            return Err("max_pooled_buffers must be greater than 0".to_string());
        }

        if self.max_events_per_unit == 0 {
            return Err("max_events_per_unit must be greater than 0".to_string());
        }

        if self.min_buffer_words < 8 {
            return Err(format!(
                "min_buffer_words {} is too small to hold a block header (8 words)",
                self.min_buffer_words
            ));
        }

        if self.pipeline.workers == 0 || self.pipeline.workers > 256 {
            return Err(format!(
                "Invalid pipeline.workers {}. Must be 1-256",
                self.pipeline.workers
            ));
        }

        if self.pipeline.in_flight < self.pipeline.workers {
            return Err(format!(
                "pipeline.in_flight ({}) must be at least pipeline.workers ({})",
                self.pipeline.in_flight, self.pipeline.workers
            ));
        }

        let mut seen = HashSet::new();
        for &rocid in &self.rocids {
            if rocid > 0xFFF {
                return Err(format!("rocid {} does not fit in 12 bits", rocid));
            }
            if !seen.insert(rocid) {
                return Err(format!("Duplicate rocid: {}", rocid));
            }
        }

        if self.link.config && !self.parse.module_config {
            return Err(
                "link.config requires parse.module_config to be enabled".to_string(),
            );
        }

        Ok(())
    }

    /// Render as TOML, in the same layout [`DecodeConfig::load_from`] reads.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reuse limit for decoded events, `None` when unlimited.
    #[must_use]
    pub fn event_reuse_limit(&self) -> Option<u32> {
        (self.max_event_reuse > 0).then_some(self.max_event_reuse)
    }

    /// Reuse limit for channel-hit buckets, `None` when unlimited.
    #[must_use]
    pub fn object_reuse_limit(&self) -> Option<u32> {
        (self.max_object_reuse > 0).then_some(self.max_object_reuse)
    }
}
