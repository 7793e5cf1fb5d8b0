//! Error types for the decode pipeline.
//!
//! Every failure in the crate falls into one of four classes (see
//! [`ErrorClass`]), which decide what the pipeline does next:
//!
//! - **Retryable**: the reader reported an undersized buffer. The buffer is grown
//!   to the reported size and the read is retried exactly once.
//! - **Stream-terminal**: end of stream (or a tolerated truncation). Acquisition
//!   stops, or the reader is rewound when looping.
//! - **Recoverable-per-unit**: malformed bank, cursor overrun, unknown module type,
//!   window word-count mismatch. The offending acquisition unit is abandoned, a
//!   diagnostic is logged, and decoding continues with the next unit.
//! - **Fatal**: the stream could not be opened or the reader failed. The process
//!   exits with the reader's error code.
//!
//! ## Error Hierarchy
//!
//! - [`CursorError`]: bounds violation inside a [`WordCursor`](crate::cursor::WordCursor)
//! - [`DecodeError`]: anything wrong with the contents of one block
//! - [`ReadError`]: reader and stream failures
//! - [`ConfigError`]: configuration loading and validation
//! - [`EvioError`]: crate-level error consolidating the above via `#[from]`

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type EvioResult<T> = std::result::Result<T, EvioError>;

/// How the pipeline reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Retry the same operation once after corrective action.
    Retryable,
    /// The stream is finished; stop acquiring (or rewind when looping).
    StreamTerminal,
    /// Abandon the current acquisition unit and continue.
    RecoverablePerUnit,
    /// Stop processing and report an exit status.
    Fatal,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorClass::Retryable => "retryable",
            ErrorClass::StreamTerminal => "stream_terminal",
            ErrorClass::RecoverablePerUnit => "recoverable_per_unit",
            ErrorClass::Fatal => "fatal",
        };
        write!(f, "{}", label)
    }
}

/// A read through a [`WordCursor`](crate::cursor::WordCursor) would pass its end bound.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cursor overrun at word {position}: needed {needed} word(s), {remaining} remaining")]
pub struct CursorError {
    /// Absolute word offset of the cursor when the read was attempted.
    pub position: usize,
    /// Words the read required.
    pub needed: usize,
    /// Words left before the bound.
    pub remaining: usize,
}

/// Errors raised while decoding the contents of one raw block.
///
/// All variants are recoverable per unit: the unit that produced the error is
/// abandoned and the pipeline moves on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// A read went past the bound of the current bank.
    #[error(transparent)]
    Overrun(#[from] CursorError),

    /// A bank declared a length extending past its enclosing range.
    #[error(
        "malformed bank: tag {tag:#06x} at word {offset} declares {declared} words, only {available} available"
    )]
    MalformedBank {
        /// Tag of the offending bank.
        tag: u32,
        /// Absolute word offset of the bank header.
        offset: usize,
        /// Declared payload length in words.
        declared: usize,
        /// Words remaining in the enclosing range.
        available: usize,
    },

    /// A module type id that the current decoder cannot interpret.
    #[error("unknown module type {module_type} (rocid {rocid}, slot {slot})")]
    UnknownModuleType {
        /// Module type id found on the wire.
        module_type: u32,
        /// Readout controller the data came from.
        rocid: u32,
        /// Slot the data came from.
        slot: u32,
    },

    /// Window raw data ended before the declared number of continuation words.
    #[error(
        "window raw data (rocid {rocid}, slot {slot}, channel {channel}): expected {expected} sample words, found {found}"
    )]
    WindowWordCountMismatch {
        /// Readout controller the data came from.
        rocid: u32,
        /// Slot the data came from.
        slot: u32,
        /// Channel the window belongs to.
        channel: u32,
        /// Continuation words implied by the window width.
        expected: usize,
        /// Continuation words actually present.
        found: usize,
    },

    /// A bank's declared event count disagrees with the enclosing block.
    #[error("{context}: declares {declared} events, block holds {expected}")]
    EventCountMismatch {
        /// Which bank disagreed.
        context: &'static str,
        /// Count declared by the bank.
        declared: usize,
        /// Count established by the physics event header.
        expected: usize,
    },

    /// The block holds more events than the unit is configured to decode.
    #[error("block declares {declared} events, limit is {limit}")]
    TooManyEvents {
        /// Events declared by the physics event header.
        declared: usize,
        /// Configured `max_events_per_unit`.
        limit: usize,
    },

    /// A bank carried a data type the decoder for its tag cannot read.
    #[error("{context}: unexpected data type {data_type:#x}")]
    UnexpectedType {
        /// Which bank was being decoded.
        context: &'static str,
        /// Data type code found in the header.
        data_type: u32,
    },

    /// Structurally valid bank whose payload is not what its decoder expects.
    #[error("{context}: {detail}")]
    InvalidPayload {
        /// Which bank was being decoded.
        context: &'static str,
        /// Human readable detail.
        detail: String,
    },
}

impl DecodeError {
    /// Decode errors only ever cost the current unit.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        ErrorClass::RecoverablePerUnit
    }

    /// Shorthand for [`DecodeError::InvalidPayload`].
    pub fn invalid(context: &'static str, detail: impl Into<String>) -> Self {
        DecodeError::InvalidPayload {
            context,
            detail: detail.into(),
        }
    }
}

/// Errors reported by a [`BlockReader`](crate::reader::BlockReader) or while acquiring blocks.
#[derive(Error, Debug)]
pub enum ReadError {
    /// The supplied buffer is too small for the next block.
    #[error("buffer too small: next block needs {required} words")]
    BufferTooSmall {
        /// Words required to hold the next block.
        required: usize,
    },

    /// The reader still reported an undersized buffer after one grow-and-retry.
    #[error("buffer still too small after growing to {required} words")]
    GrowRetryFailed {
        /// Size the buffer was grown to.
        required: usize,
    },

    /// No more blocks.
    #[error("end of stream")]
    EndOfStream,

    /// The stream ended in the middle of a block.
    #[error("truncated block at end of stream")]
    Truncated,

    /// The input could not be opened.
    #[error("failed to open EVIO input '{path}': {source}")]
    Open {
        /// Path that was being opened.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The reader reported an error with its own status code.
    #[error("reader error {code}: {message}")]
    Stream {
        /// Reader status code, used as the process exit status.
        code: i32,
        /// Reader message.
        message: String,
    },

    /// I/O failure while reading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReadError {
    /// Classify the error. Truncation is stream-terminal only when tolerated.
    #[must_use]
    pub fn class(&self, truncation_fatal: bool) -> ErrorClass {
        match self {
            ReadError::BufferTooSmall { .. } => ErrorClass::Retryable,
            ReadError::EndOfStream => ErrorClass::StreamTerminal,
            ReadError::Truncated if !truncation_fatal => ErrorClass::StreamTerminal,
            ReadError::Truncated
            | ReadError::GrowRetryFailed { .. }
            | ReadError::Open { .. }
            | ReadError::Stream { .. }
            | ReadError::Io(_) => ErrorClass::Fatal,
        }
    }

    /// Process exit status for a fatal read error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            ReadError::Stream { code, .. } if *code != 0 => *code,
            ReadError::Open { .. } => 3,
            ReadError::Truncated => 4,
            _ => 1,
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// figment could not load or extract the configuration.
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// The configuration loaded but is semantically invalid.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The configuration could not be rendered as TOML.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

/// Crate-level error.
#[derive(Error, Debug)]
pub enum EvioError {
    /// Block contents could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Reader or stream failure.
    #[error(transparent)]
    Read(#[from] ReadError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A pipeline thread stopped unexpectedly.
    #[error("pipeline failure: {0}")]
    Pipeline(String),
}

impl EvioError {
    /// Error class used to pick a recovery strategy.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            EvioError::Decode(err) => err.class(),
            EvioError::Read(err) => err.class(true),
            EvioError::Config(_) | EvioError::Pipeline(_) => ErrorClass::Fatal,
        }
    }

    /// Whether processing can continue after this error.
    #[must_use]
    pub fn can_recover(&self) -> bool {
        !matches!(self.class(), ErrorClass::Fatal)
    }

    /// Process exit status for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            EvioError::Read(err) => err.exit_code(),
            EvioError::Config(_) => 2,
            EvioError::Decode(_) | EvioError::Pipeline(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_errors_are_recoverable_per_unit() {
        let err = DecodeError::UnknownModuleType {
            module_type: 9,
            rocid: 3,
            slot: 4,
        };
        assert_eq!(err.class(), ErrorClass::RecoverablePerUnit);
        assert!(EvioError::from(err).can_recover());
    }

    #[test]
    fn test_read_error_classes() {
        assert_eq!(
            ReadError::BufferTooSmall { required: 10 }.class(true),
            ErrorClass::Retryable
        );
        assert_eq!(ReadError::EndOfStream.class(true), ErrorClass::StreamTerminal);
        assert_eq!(ReadError::Truncated.class(false), ErrorClass::StreamTerminal);
        assert_eq!(ReadError::Truncated.class(true), ErrorClass::Fatal);
    }

    #[test]
    fn test_exit_codes() {
        let err = ReadError::Stream {
            code: 17,
            message: "bad block".to_string(),
        };
        assert_eq!(err.exit_code(), 17);
        assert_eq!(
            EvioError::from(ConfigError::Invalid("x".into())).exit_code(),
            2
        );
    }

    #[test]
    fn test_cursor_error_message() {
        let err = DecodeError::from(CursorError {
            position: 12,
            needed: 3,
            remaining: 1,
        });
        assert_eq!(
            err.to_string(),
            "cursor overrun at word 12: needed 3 word(s), 1 remaining"
        );
    }
}
