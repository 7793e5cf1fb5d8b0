//! Tracing setup.
//!
//! Diagnostics throughout the crate are structured `tracing` events carrying
//! `rocid`, `slot`, `seq` and `tag` fields. This module installs a
//! `tracing-subscriber` registry with an [`EnvFilter`] (so `RUST_LOG` wins over
//! the configured verbosity) and one of three output formats.
//!
//! The decoder verbosity (0 to 10) maps onto levels as follows:
//!
//! | verbosity | level |
//! |-----------|-------|
//! | 0         | warn  |
//! | 1-2       | info  |
//! | 3-5       | debug |
//! | 6-10      | trace |
//!
//! # Example
//! ```no_run
//! use rust_evio::{config::DecodeConfig, logging};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DecodeConfig::load()?;
//! logging::init_from_config(&config)?;
//! tracing::info!(workers = config.pipeline.workers, "Decoder starting");
//! # Ok(())
//! # }
//! ```

use crate::config::DecodeConfig;
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Multi-line format with colors (for development)
    Pretty,
    /// Single-line format without colors
    Compact,
    /// JSON lines (for log aggregation)
    Json,
}

/// Logging configuration options.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Maximum level when `RUST_LOG` is not set.
    pub level: Level,
    /// Output format.
    pub format: OutputFormat,
    /// Whether to include span close events with timings.
    pub with_span_events: bool,
    /// Whether to include file and line numbers.
    pub with_file_and_line: bool,
    /// Whether to include thread names (useful to tell decode workers apart).
    pub with_thread_names: bool,
    /// Whether to enable ANSI colors (only for Pretty format).
    pub with_ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            format: OutputFormat::Compact,
            with_span_events: false,
            with_file_and_line: false,
            with_thread_names: true,
            with_ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Logging config derived from the decoder configuration.
    #[must_use]
    pub fn from_decode_config(config: &DecodeConfig) -> Self {
        Self {
            level: verbosity_to_level(config.verbosity),
            format: config.log_format,
            with_file_and_line: config.verbosity >= 6,
            ..Default::default()
        }
    }

    /// Logging config with a fixed level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Set output format.
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable ANSI colors.
    #[must_use]
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Initialize logging from the decoder configuration.
pub fn init_from_config(config: &DecodeConfig) -> Result<(), String> {
    init(LoggingConfig::from_decode_config(config))
}

/// Initialize logging.
///
/// Idempotent: if a global subscriber is already installed this returns
/// `Ok(())`, which keeps it safe to call from tests and embedding code.
pub fn init(config: LoggingConfig) -> Result<(), String> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_string(config.level)));

    let span_events = if config.with_span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let result = match config.format {
        OutputFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_span_events(span_events)
                .with_file(config.with_file_and_line)
                .with_line_number(config.with_file_and_line)
                .with_thread_names(config.with_thread_names)
                .with_ansi(config.with_ansi)
                .with_filter(env_filter);
            tracing_subscriber::registry().with(fmt_layer).try_init()
        }
        OutputFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_span_events(span_events)
                .with_file(config.with_file_and_line)
                .with_line_number(config.with_file_and_line)
                .with_thread_names(config.with_thread_names)
                .with_ansi(false)
                .with_filter(env_filter);
            tracing_subscriber::registry().with(fmt_layer).try_init()
        }
        OutputFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_span_events(span_events)
                .with_file(config.with_file_and_line)
                .with_line_number(config.with_file_and_line)
                .with_thread_names(config.with_thread_names)
                .with_filter(env_filter);
            tracing_subscriber::registry().with(fmt_layer).try_init()
        }
    };

    result.or_else(|e| {
        // Handle "already initialized" gracefully - expected in tests
        if e
            .to_string()
            .contains("a global default trace dispatcher has already been set")
        {
            Ok(())
        } else {
            Err(format!("Failed to initialize tracing: {}", e))
        }
    })
}

/// Map decoder verbosity onto a tracing level.
#[must_use]
pub fn verbosity_to_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1..=2 => Level::INFO,
        3..=5 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Convert Level to env filter string
fn level_to_filter_string(level: Level) -> String {
    match level {
        Level::TRACE => "trace".to_string(),
        Level::DEBUG => "debug".to_string(),
        Level::INFO => "info".to_string(),
        Level::WARN => "warn".to_string(),
        Level::ERROR => "error".to_string(),
    }
}
