//! Block sources.
//!
//! A [`BlockReader`] fills a caller-supplied word buffer with the next block
//! and reports what happened through a [`ReadOutcome`]. The caller owns the
//! buffer; when it is too small the reader says how many words it needs and
//! keeps the block for the retry.
//!
//! Two readers ship with the crate: [`MemoryReader`] serves pre-built blocks
//! (tests, benchmarks, replay) and [`EvioFileReader`] streams EVIO v4 files.

pub mod evio_file;

pub use evio_file::{write_blocks, EvioFileReader};

use crate::error::ReadError;
use crate::swap::swap_block_to_foreign;

/// Status of one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStatus {
    /// The buffer holds a block of `len` words.
    Ok {
        /// Words filled.
        len: usize,
    },
    /// The next block needs a buffer of `required` words.
    BufferTooSmall {
        /// Words required.
        required: usize,
    },
    /// The stream ended in the middle of a block.
    Truncated,
    /// No more blocks.
    EndOfStream,
    /// Reader failure.
    Error {
        /// Reader status code.
        code: i32,
        /// Description.
        message: String,
    },
}

impl ReadStatus {
    /// The error equivalent of a non-`Ok` status.
    #[must_use]
    pub fn into_error(self) -> Option<ReadError> {
        match self {
            ReadStatus::Ok { .. } => None,
            ReadStatus::BufferTooSmall { required } => Some(ReadError::BufferTooSmall { required }),
            ReadStatus::Truncated => Some(ReadError::Truncated),
            ReadStatus::EndOfStream => Some(ReadError::EndOfStream),
            ReadStatus::Error { code, message } => Some(ReadError::Stream { code, message }),
        }
    }
}

/// Result of one read: the status plus whether the block is in foreign byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    /// What happened.
    pub status: ReadStatus,
    /// The block must be byte swapped before parsing.
    pub swap_needed: bool,
}

impl ReadOutcome {
    /// A filled block.
    #[must_use]
    pub fn ok(len: usize, swap_needed: bool) -> Self {
        Self {
            status: ReadStatus::Ok { len },
            swap_needed,
        }
    }

    /// Any other status.
    #[must_use]
    pub fn status(status: ReadStatus) -> Self {
        Self {
            status,
            swap_needed: false,
        }
    }
}

/// Source of raw blocks.
pub trait BlockReader: Send {
    /// Fill `buffer` with the next block.
    fn read(&mut self, buffer: &mut [u32]) -> ReadOutcome;

    /// Restart from the first block.
    fn rewind(&mut self) -> Result<(), ReadError>;
}

impl<R: BlockReader + ?Sized> BlockReader for Box<R> {
    fn read(&mut self, buffer: &mut [u32]) -> ReadOutcome {
        (**self).read(buffer)
    }

    fn rewind(&mut self) -> Result<(), ReadError> {
        (**self).rewind()
    }
}

/// Serves blocks from memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    blocks: Vec<Vec<u32>>,
    next: usize,
    swapped: bool,
    truncated_tail: bool,
}

impl MemoryReader {
    /// Reader over `blocks`, in native byte order.
    #[must_use]
    pub fn new(blocks: Vec<Vec<u32>>) -> Self {
        Self {
            blocks,
            ..Self::default()
        }
    }

    /// Deliver every block byte swapped, flagged with `swap_needed`.
    #[must_use]
    pub fn with_swapped_output(mut self) -> Self {
        self.swapped = true;
        self
    }

    /// Report the last block as truncated instead of delivering it.
    #[must_use]
    pub fn with_truncated_tail(mut self) -> Self {
        self.truncated_tail = true;
        self
    }

    /// Blocks served since the last rewind.
    #[must_use]
    pub fn position(&self) -> usize {
        self.next
    }
}

impl BlockReader for MemoryReader {
    fn read(&mut self, buffer: &mut [u32]) -> ReadOutcome {
        let Some(block) = self.blocks.get(self.next) else {
            return ReadOutcome::status(ReadStatus::EndOfStream);
        };
        if self.truncated_tail && self.next + 1 == self.blocks.len() {
            self.next += 1;
            return ReadOutcome::status(ReadStatus::Truncated);
        }
        if buffer.len() < block.len() {
            return ReadOutcome::status(ReadStatus::BufferTooSmall {
                required: block.len(),
            });
        }

        let out = &mut buffer[..block.len()];
        out.copy_from_slice(block);
        if self.swapped {
            if let Err(err) = swap_block_to_foreign(out) {
                return ReadOutcome::status(ReadStatus::Error {
                    code: 1,
                    message: err.to_string(),
                });
            }
        }
        self.next += 1;
        ReadOutcome::ok(block.len(), self.swapped)
    }

    fn rewind(&mut self) -> Result<(), ReadError> {
        self.next = 0;
        Ok(())
    }
}
