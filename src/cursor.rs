//! Bounded forward-only cursor over a word array.
//!
//! Every parser and decoder in the crate reads through a [`WordCursor`]. A
//! cursor only ever sees the slice it was bound to, so a decoder handed a
//! sub-cursor for one bank cannot read into its neighbours: any attempt to read
//! past the bound returns a [`CursorError`] instead.
//!
//! Positions reported in errors are absolute word offsets within the block,
//! which makes diagnostics line up with a hex dump of the input.

use crate::error::CursorError;

/// Checked cursor over a bounded word slice.
#[derive(Debug, Clone, Copy)]
pub struct WordCursor<'a> {
    words: &'a [u32],
    pos: usize,
    base: usize,
}

impl<'a> WordCursor<'a> {
    /// Cursor over the whole slice, with absolute offsets starting at 0.
    #[must_use]
    pub fn new(words: &'a [u32]) -> Self {
        Self::with_base(words, 0)
    }

    /// Cursor over `words`, reporting offsets relative to `base`.
    #[must_use]
    pub fn with_base(words: &'a [u32], base: usize) -> Self {
        Self { words, pos: 0, base }
    }

    fn overrun(&self, needed: usize) -> CursorError {
        CursorError {
            position: self.position(),
            needed,
            remaining: self.remaining(),
        }
    }

    /// Read one word.
    #[inline]
    pub fn next_word(&mut self) -> Result<u32, CursorError> {
        let word = *self.words.get(self.pos).ok_or_else(|| self.overrun(1))?;
        self.pos += 1;
        Ok(word)
    }

    /// Look at the next word without consuming it.
    #[inline]
    #[must_use]
    pub fn peek(&self) -> Option<u32> {
        self.words.get(self.pos).copied()
    }

    /// Read a 64-bit value stored as two words, low word first.
    pub fn read_u64(&mut self) -> Result<u64, CursorError> {
        let pair = self.take(2)?;
        Ok(u64::from(pair[0]) | (u64::from(pair[1]) << 32))
    }

    /// Skip `n` words.
    pub fn skip(&mut self, n: usize) -> Result<(), CursorError> {
        if n > self.remaining() {
            return Err(self.overrun(n));
        }
        self.pos += n;
        Ok(())
    }

    /// Consume and return the next `n` words.
    pub fn take(&mut self, n: usize) -> Result<&'a [u32], CursorError> {
        if n > self.remaining() {
            return Err(self.overrun(n));
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.words[start..self.pos])
    }

    /// Consume the next `n` words and return a cursor bounded to exactly them.
    pub fn split(&mut self, n: usize) -> Result<WordCursor<'a>, CursorError> {
        let base = self.position();
        let words = self.take(n)?;
        Ok(WordCursor::with_base(words, base))
    }

    /// Consume everything that is left.
    pub fn rest(&mut self) -> &'a [u32] {
        let start = self.pos;
        self.pos = self.words.len();
        &self.words[start..]
    }

    /// The unread words, without consuming them.
    #[must_use]
    pub fn remaining_words(&self) -> &'a [u32] {
        &self.words[self.pos..]
    }

    /// Words left before the bound.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.words.len() - self.pos
    }

    /// Whether the cursor reached its bound.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.words.len()
    }

    /// Absolute word offset of the next read.
    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        self.base + self.pos
    }

    /// Words consumed since the cursor was created.
    #[inline]
    #[must_use]
    pub fn consumed(&self) -> usize {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reads_in_order() {
        let words = [1, 2, 3, 4];
        let mut cur = WordCursor::new(&words);
        assert_eq!(cur.next_word().unwrap(), 1);
        assert_eq!(cur.peek(), Some(2));
        assert_eq!(cur.take(2).unwrap(), &[2, 3]);
        assert_eq!(cur.remaining(), 1);
        assert_eq!(cur.next_word().unwrap(), 4);
        assert!(cur.is_empty());
        assert!(cur.next_word().is_err());
    }

    #[test]
    fn test_split_bounds_sub_cursor() {
        let words = [10, 11, 12, 13, 14];
        let mut cur = WordCursor::with_base(&words, 100);
        cur.skip(1).unwrap();
        let mut sub = cur.split(2).unwrap();
        assert_eq!(sub.position(), 101);
        assert_eq!(sub.next_word().unwrap(), 11);
        assert_eq!(sub.next_word().unwrap(), 12);

        let err = sub.next_word().unwrap_err();
        assert_eq!(err.position, 103);
        assert_eq!(err.remaining, 0);

        // Parent continues after the split range.
        assert_eq!(cur.next_word().unwrap(), 13);
    }

    #[test]
    fn test_split_past_end_fails_without_advancing() {
        let words = [1, 2, 3];
        let mut cur = WordCursor::new(&words);
        let err = cur.split(4).unwrap_err();
        assert_eq!(err.needed, 4);
        assert_eq!(err.remaining, 3);
        assert_eq!(cur.position(), 0);
    }

    #[test]
    fn test_read_u64_low_word_first() {
        let words = [0x89ab_cdef, 0x0123_4567];
        let mut cur = WordCursor::new(&words);
        assert_eq!(cur.read_u64().unwrap(), 0x0123_4567_89ab_cdef);
    }

    proptest! {
        #[test]
        fn proptest_cursor_never_reads_past_bound(
            words in proptest::collection::vec(any::<u32>(), 0..64),
            bound in 0usize..64,
            steps in proptest::collection::vec(0usize..8, 0..32),
        ) {
            let bound = bound.min(words.len());
            let mut cur = WordCursor::new(&words[..bound]);
            for step in steps {
                let before = cur.position();
                match cur.take(step) {
                    Ok(taken) => prop_assert_eq!(taken.len(), step),
                    Err(_) => prop_assert_eq!(cur.position(), before),
                }
                prop_assert!(cur.position() <= bound);
            }
        }
    }
}
