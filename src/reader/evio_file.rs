//! EVIO version 4 file reader.
//!
//! A file is a sequence of blocks, each starting with an eight-word header:
//!
//! | word | content                                     |
//! |------|---------------------------------------------|
//! | 0    | block length in words, header included      |
//! | 1    | block number                                |
//! | 2    | header length (8)                           |
//! | 3    | event count                                 |
//! | 4    | reserved                                    |
//! | 5    | bit info << 8 \| version (bit 9: last block) |
//! | 6    | reserved                                    |
//! | 7    | magic number 0xc0da0100                     |
//!
//! The magic word tells the byte order: read back as 0x0001dac0 the file was
//! written on a machine of the other endianness. The payload (the events of
//! the block) is handed out unswapped with `swap_needed` set; the decode
//! workers do the swap.

use super::{BlockReader, ReadOutcome, ReadStatus};
use crate::error::ReadError;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Magic number in word 7 of every block header.
pub const MAGIC: u32 = 0xc0da_0100;
/// Words in a block header.
pub const HEADER_WORDS: usize = 8;
/// EVIO format version written by [`write_blocks`].
pub const VERSION: u32 = 4;
/// Bit info flag marking the last block.
pub const LAST_BLOCK: u32 = 0x200;

/// Status code for a block header with a bad magic number.
const CODE_BAD_MAGIC: i32 = 5;
/// Status code for an inconsistent block header.
const CODE_BAD_HEADER: i32 = 6;
/// Status code for an I/O failure.
const CODE_IO: i32 = 7;

/// Bytes moved per read while filling a word buffer.
const CHUNK_BYTES: usize = 16 * 1024;

/// Header of a block whose payload has not been read yet.
#[derive(Debug, Clone, Copy)]
struct PendingBlock {
    payload_len: usize,
    swapped: bool,
}

/// Streams blocks from an EVIO v4 file.
///
/// The payload of a block is read straight into the caller's buffer. A block
/// header is checked against the bytes left in the stream before anything is
/// sized from it, so a corrupt length reads as a truncated stream.
#[derive(Debug)]
pub struct EvioFileReader<R = BufReader<File>> {
    path: PathBuf,
    input: R,
    stream_len: Option<u64>,
    pending: Option<PendingBlock>,
    last_seen: bool,
    blocks_read: u64,
}

impl EvioFileReader {
    /// Open `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| ReadError::Open {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "Opened EVIO file");
        Ok(Self::from_reader(path, BufReader::new(file)))
    }
}

impl<R: Read + Seek> EvioFileReader<R> {
    /// Reader over any seekable byte source; `path` is only used in diagnostics.
    pub fn from_reader(path: impl Into<PathBuf>, input: R) -> Self {
        Self {
            path: path.into(),
            input,
            stream_len: None,
            pending: None,
            last_seen: false,
            blocks_read: 0,
        }
    }

    /// Path this reader was opened on.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// EVIO blocks read since the last rewind.
    #[must_use]
    pub fn blocks_read(&self) -> u64 {
        self.blocks_read
    }

    /// Bytes between the current position and the end of the stream.
    fn remaining_bytes(&mut self) -> io::Result<u64> {
        let pos = self.input.stream_position()?;
        let len = match self.stream_len {
            Some(len) => len,
            None => {
                let len = self.input.seek(SeekFrom::End(0))?;
                self.input.seek(SeekFrom::Start(pos))?;
                self.stream_len = Some(len);
                len
            }
        };
        Ok(len.saturating_sub(pos))
    }

    /// Read a block header. `Ok(None)` at a clean end of file.
    fn read_header(&mut self) -> io::Result<Option<[u32; HEADER_WORDS]>> {
        let mut bytes = [0u8; HEADER_WORDS * 4];
        let mut filled = 0;
        while filled < bytes.len() {
            match self.input.read(&mut bytes[filled..]) {
                Ok(0) => break,
                Ok(read) => filled += read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < bytes.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{filled} of {} header bytes", bytes.len()),
            ));
        }
        let mut header = [0u32; HEADER_WORDS];
        for (word, b) in header.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_ne_bytes([b[0], b[1], b[2], b[3]]);
        }
        Ok(Some(header))
    }

    /// Fill `out` with the next `out.len()` words of the stream.
    fn read_words_into(&mut self, out: &mut [u32]) -> io::Result<()> {
        let mut chunk = [0u8; CHUNK_BYTES];
        for words in out.chunks_mut(CHUNK_BYTES / 4) {
            let bytes = &mut chunk[..words.len() * 4];
            self.input.read_exact(bytes)?;
            for (word, b) in words.iter_mut().zip(bytes.chunks_exact(4)) {
                *word = u32::from_ne_bytes([b[0], b[1], b[2], b[3]]);
            }
        }
        Ok(())
    }

    /// Read headers up to the next block with a payload.
    fn load_next(&mut self) -> Result<PendingBlock, ReadStatus> {
        loop {
            if self.last_seen {
                return Err(ReadStatus::EndOfStream);
            }
            let raw = match self.read_header() {
                Ok(Some(words)) => words,
                Ok(None) => return Err(ReadStatus::EndOfStream),
                Err(err) => return Err(io_status(&err)),
            };

            let swapped = match raw[7] {
                MAGIC => false,
                word if word.swap_bytes() == MAGIC => true,
                word => {
                    return Err(ReadStatus::Error {
                        code: CODE_BAD_MAGIC,
                        message: format!(
                            "bad magic number {word:#010x} in block {} of {}",
                            self.blocks_read,
                            self.path.display()
                        ),
                    })
                }
            };
            let header = raw.map(|w| if swapped { w.swap_bytes() } else { w });

            let block_len = header[0] as usize;
            let header_len = header[2] as usize;
            if header_len < HEADER_WORDS || block_len < header_len {
                return Err(ReadStatus::Error {
                    code: CODE_BAD_HEADER,
                    message: format!(
                        "block {} declares length {block_len} with header length {header_len}",
                        header[1]
                    ),
                });
            }

            let rest_bytes = (block_len - HEADER_WORDS) as u64 * 4;
            let remaining = self.remaining_bytes().map_err(|err| io_status(&err))?;
            if rest_bytes > remaining {
                debug!(
                    block = header[1],
                    words = block_len,
                    remaining_bytes = remaining,
                    "Block extends past the end of the stream"
                );
                return Err(ReadStatus::Truncated);
            }
            if header_len > HEADER_WORDS {
                let skip = (header_len - HEADER_WORDS) as i64 * 4;
                self.input
                    .seek(SeekFrom::Current(skip))
                    .map_err(|err| io_status(&err))?;
            }

            let payload_len = block_len - header_len;
            self.blocks_read += 1;
            self.last_seen = header[5] & LAST_BLOCK != 0;
            trace!(
                block = header[1],
                events = header[3],
                words = payload_len,
                swapped,
                last = self.last_seen,
                "Read EVIO block header"
            );
            if payload_len > 0 {
                return Ok(PendingBlock {
                    payload_len,
                    swapped,
                });
            }
        }
    }
}

fn io_status(err: &io::Error) -> ReadStatus {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        ReadStatus::Truncated
    } else {
        ReadStatus::Error {
            code: CODE_IO,
            message: err.to_string(),
        }
    }
}

impl<R: Read + Seek + Send> BlockReader for EvioFileReader<R> {
    fn read(&mut self, buffer: &mut [u32]) -> ReadOutcome {
        let block = match self.pending {
            Some(block) => block,
            None => match self.load_next() {
                Ok(block) => block,
                Err(status) => return ReadOutcome::status(status),
            },
        };
        if buffer.len() < block.payload_len {
            self.pending = Some(block);
            return ReadOutcome::status(ReadStatus::BufferTooSmall {
                required: block.payload_len,
            });
        }
        self.pending = None;
        if let Err(err) = self.read_words_into(&mut buffer[..block.payload_len]) {
            return ReadOutcome::status(io_status(&err));
        }
        ReadOutcome::ok(block.payload_len, block.swapped)
    }

    fn rewind(&mut self) -> Result<(), ReadError> {
        self.input.seek(SeekFrom::Start(0))?;
        self.pending = None;
        self.last_seen = false;
        self.blocks_read = 0;
        Ok(())
    }
}

/// Top-level banks in a block payload.
fn count_banks(words: &[u32]) -> u32 {
    let mut pos = 0usize;
    let mut count = 0;
    while pos < words.len() {
        count += 1;
        pos += words[pos] as usize + 1;
    }
    count
}

/// Write `blocks` as an EVIO v4 file in native byte order.
///
/// Each entry becomes one block holding the given banks; an empty last block
/// terminates the file.
pub fn write_blocks<W: Write>(mut out: W, blocks: &[Vec<u32>]) -> io::Result<()> {
    let mut write_block = |number: usize, payload: &[u32], last: bool| -> io::Result<()> {
        let bit_info = if last { LAST_BLOCK } else { 0 };
        let header = [
            (HEADER_WORDS + payload.len()) as u32,
            number as u32,
            HEADER_WORDS as u32,
            count_banks(payload),
            0,
            bit_info | VERSION,
            0,
            MAGIC,
        ];
        for word in header.iter().chain(payload) {
            out.write_all(&word.to_ne_bytes())?;
        }
        Ok(())
    };
    for (number, payload) in blocks.iter().enumerate() {
        write_block(number + 1, payload, false)?;
    }
    write_block(blocks.len() + 1, &[], true)?;
    out.flush()
}
