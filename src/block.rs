//! Raw blocks, the raw buffer pool and acquisition units.
//!
//! A [`RawBlock`] holds one unparsed block read from the stream. Blocks come
//! from a [`RawBufferPool`] and go back to it when the [`Pooled`] guard is
//! dropped, whether decoding succeeded or not.
//!
//! An [`AcquisitionUnit`] is the unit of decode work: one block, its stream
//! sequence number and a [`JobFlags`] set telling the worker what to do.

use bitflags::bitflags;
use evio_pool::{PoolSettings, PoolStats, Pooled, RecyclePool};

/// Default raw buffer size in words.
pub const DEFAULT_BUFFER_WORDS: usize = 4000;

bitflags! {
    /// What a worker should do with an acquisition unit.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct JobFlags: u32 {
        /// Stop the worker.
        const TERMINATE = 0x1;
        /// Swap byte order before parsing.
        const SWAP = 0x2;
        /// Parse all banks.
        const FULL_PARSE = 0x4;
        /// Run the association linker on the parsed events. Without
        /// `FULL_PARSE` there are none, so the unit comes back empty.
        const LINK = 0x8;
    }
}

/// One unparsed block of words.
#[derive(Debug, Clone)]
pub struct RawBlock {
    words: Vec<u32>,
    len: usize,
    swap_needed: bool,
    seq: u64,
}

impl RawBlock {
    /// Block with room for `capacity` words.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity],
            len: 0,
            swap_needed: false,
            seq: 0,
        }
    }

    /// Block holding a copy of `words`.
    #[must_use]
    pub fn from_words(words: &[u32]) -> Self {
        Self {
            words: words.to_vec(),
            len: words.len(),
            swap_needed: false,
            seq: 0,
        }
    }

    /// Capacity in words.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.words.len()
    }

    /// Words in use.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the block holds no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The filled part of the block.
    #[must_use]
    pub fn words(&self) -> &[u32] {
        &self.words[..self.len]
    }

    /// Mutable view of the filled part (used for in-place byte swapping).
    pub fn words_mut(&mut self) -> &mut [u32] {
        &mut self.words[..self.len]
    }

    /// The whole buffer, for a reader to fill.
    pub fn buffer_mut(&mut self) -> &mut [u32] {
        &mut self.words
    }

    /// Record how many words the reader filled. Clamped to the capacity.
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.words.len());
    }

    /// Replace the buffer with one of `required` words if it is smaller.
    ///
    /// Returns whether a new buffer was allocated. The old contents are
    /// discarded since the reader will fill the block again.
    pub fn grow_to(&mut self, required: usize) -> bool {
        if self.words.len() >= required {
            return false;
        }
        self.words = vec![0; required];
        self.len = 0;
        true
    }

    /// Whether byte order must be swapped before parsing.
    #[must_use]
    pub fn swap_needed(&self) -> bool {
        self.swap_needed
    }

    /// Set the swap flag reported by the reader.
    pub fn set_swap_needed(&mut self, swap: bool) {
        self.swap_needed = swap;
    }

    /// Stream sequence number assigned at acquisition.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Assign the stream sequence number.
    pub fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }

    /// Forget the contents, keeping the allocation.
    pub fn reset(&mut self) {
        self.len = 0;
        self.swap_needed = false;
        self.seq = 0;
    }
}

/// Pool of raw blocks. Acquired on the acquisition thread, released anywhere.
pub struct RawBufferPool {
    pool: RecyclePool<RawBlock>,
    min_words: usize,
}

impl RawBufferPool {
    /// Pool handing out blocks of at least `min_words` words.
    #[must_use]
    pub fn new(min_words: usize, max_pooled: usize) -> Self {
        let min_words = min_words.max(1);
        Self {
            pool: RecyclePool::new(
                PoolSettings::with_max_pooled(max_pooled),
                move || RawBlock::with_capacity(min_words),
                RawBlock::reset,
            ),
            min_words,
        }
    }

    /// Take a block with capacity of at least the pool minimum.
    pub fn acquire(&mut self) -> Pooled<RawBlock> {
        self.pool.acquire()
    }

    /// Minimum block capacity.
    #[must_use]
    pub fn min_words(&self) -> usize {
        self.min_words
    }

    /// Pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl Default for RawBufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_WORDS, 64)
    }
}

/// A single in-flight block and what to do with it.
#[derive(Debug)]
pub struct AcquisitionUnit {
    seq: u64,
    flags: JobFlags,
    block: Option<Pooled<RawBlock>>,
}

impl AcquisitionUnit {
    /// Unit for a freshly read block.
    #[must_use]
    pub fn new(mut block: Pooled<RawBlock>, seq: u64, flags: JobFlags) -> Self {
        block.set_seq(seq);
        Self {
            seq,
            flags,
            block: Some(block),
        }
    }

    /// Unit telling a worker to stop.
    #[must_use]
    pub fn terminate(seq: u64) -> Self {
        Self {
            seq,
            flags: JobFlags::TERMINATE,
            block: None,
        }
    }

    /// Stream sequence number.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Job flags.
    #[must_use]
    pub fn flags(&self) -> JobFlags {
        self.flags
    }

    /// Whether this unit asks the worker to stop.
    #[must_use]
    pub fn is_terminate(&self) -> bool {
        self.flags.contains(JobFlags::TERMINATE)
    }

    /// The block, if the unit carries one.
    #[must_use]
    pub fn block(&self) -> Option<&RawBlock> {
        self.block.as_deref()
    }

    /// Mutable access to the block.
    pub fn block_mut(&mut self) -> Option<&mut RawBlock> {
        self.block.as_deref_mut()
    }

    /// Give the block back to its pool now instead of when the unit is dropped.
    pub fn release_block(&mut self) {
        self.block = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_flags() {
        let mut flags = JobFlags::FULL_PARSE | JobFlags::SWAP;
        assert!(flags.contains(JobFlags::SWAP));
        assert!(!flags.contains(JobFlags::TERMINATE));
        flags.remove(JobFlags::SWAP);
        assert_eq!(flags, JobFlags::FULL_PARSE);
        flags |= JobFlags::LINK;
        assert_eq!(flags.bits(), 0xC);
        assert_eq!(format!("{:?}", flags), "JobFlags(FULL_PARSE | LINK)");
        assert!(JobFlags::empty().is_empty());
    }

    #[test]
    fn test_grow_to_exact_size() {
        let mut block = RawBlock::with_capacity(16);
        assert!(!block.grow_to(16));
        assert!(block.grow_to(5000));
        assert_eq!(block.capacity(), 5000);
        assert_eq!(block.len(), 0);
    }

    #[test]
    fn test_set_len_clamps() {
        let mut block = RawBlock::with_capacity(4);
        block.buffer_mut().copy_from_slice(&[1, 2, 3, 4]);
        block.set_len(10);
        assert_eq!(block.words(), &[1, 2, 3, 4]);
        block.set_len(2);
        assert_eq!(block.words(), &[1, 2]);
    }

    #[test]
    fn test_pool_keeps_grown_buffers() {
        let mut pool = RawBufferPool::new(100, 4);
        let mut block = pool.acquire();
        assert_eq!(block.capacity(), 100);
        block.grow_to(250);
        block.set_len(250);
        block.set_swap_needed(true);
        drop(block);

        let block = pool.acquire();
        assert_eq!(block.capacity(), 250);
        assert!(block.is_empty());
        assert!(!block.swap_needed());
    }

    #[test]
    fn test_unit_releases_block() {
        let mut pool = RawBufferPool::new(8, 4);
        let mut unit = AcquisitionUnit::new(pool.acquire(), 7, JobFlags::FULL_PARSE);
        assert_eq!(unit.block().unwrap().seq(), 7);
        assert_eq!(pool.stats().outstanding, 1);
        unit.release_block();
        assert_eq!(pool.stats().outstanding, 0);
        assert!(unit.block().is_none());

        let stop = AcquisitionUnit::terminate(8);
        assert!(stop.is_terminate());
    }
}
