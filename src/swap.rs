//! Type-aware byte-order swapping of a bank tree.
//!
//! A block written on a machine of the other endianness cannot be fixed by
//! swapping every word: 16-bit payloads need their half-words swapped, 8-bit
//! payloads must not be touched, and 64-bit payloads need their word pairs
//! exchanged too. The walk below swaps headers, reads the data type, and swaps
//! each payload according to it, in place.
//!
//! [`swap_block`] converts a foreign-order block to native order (headers are
//! swapped before they are interpreted). [`swap_block_to_foreign`] does the
//! opposite for writers and tests (headers are interpreted before swapping).

use crate::error::DecodeError;
use crate::layout::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Words arrive in foreign order; headers must be swapped before use.
    ToNative,
    /// Words are native; headers are read before they are swapped.
    ToForeign,
}

/// Swap a foreign-order block (a sequence of top-level banks) to native order.
pub fn swap_block(words: &mut [u32]) -> Result<(), DecodeError> {
    swap_banks(words, Direction::ToNative)
}

/// Swap a native block to foreign order.
pub fn swap_block_to_foreign(words: &mut [u32]) -> Result<(), DecodeError> {
    swap_banks(words, Direction::ToForeign)
}

/// Swap the half-words of a word holding two 16-bit values.
#[inline]
#[must_use]
pub fn swap_u16_pair(word: u32) -> u32 {
    ((word & 0x00FF_00FF) << 8) | ((word & 0xFF00_FF00) >> 8)
}

/// Swap a header word and return the native value, whichever the direction.
#[inline]
fn swap_header(word: &mut u32, dir: Direction) -> u32 {
    let original = *word;
    *word = original.swap_bytes();
    match dir {
        Direction::ToNative => *word,
        Direction::ToForeign => original,
    }
}

fn malformed(tag: u32, offset: usize, declared: usize, available: usize) -> DecodeError {
    DecodeError::MalformedBank {
        tag,
        offset,
        declared,
        available,
    }
}

/// A region of the block whose contents are laid out as `data_type`.
struct Region {
    start: usize,
    end: usize,
    data_type: DataType,
}

/// Walk the bank tree with an explicit stack, so nesting depth is bounded by
/// the block length and not by the thread's stack.
fn swap_banks(words: &mut [u32], dir: Direction) -> Result<(), DecodeError> {
    let mut stack = vec![Region {
        start: 0,
        end: words.len(),
        data_type: DataType::Bank,
    }];
    while let Some(region) = stack.pop() {
        match region.data_type {
            DataType::Bank => swap_bank_headers(words, &region, dir, &mut stack)?,
            DataType::Segment | DataType::TagSegment => {
                swap_segment_headers(words, &region, dir, &mut stack)?;
            }
            data_type => swap_leaf(&mut words[region.start..region.end], data_type),
        }
    }
    Ok(())
}

/// Swap the two header words of every bank in `region`, queueing the payloads.
fn swap_bank_headers(
    words: &mut [u32],
    region: &Region,
    dir: Direction,
    stack: &mut Vec<Region>,
) -> Result<(), DecodeError> {
    let mut pos = region.start;
    while pos < region.end {
        let available = region.end - pos;
        if available < 2 {
            return Err(malformed(0, pos, 1, available - 1));
        }
        let length = swap_header(&mut words[pos], dir) as usize;
        let header = swap_header(&mut words[pos + 1], dir);
        let tag = header >> 16;
        if length == 0 || length > available - 1 {
            return Err(malformed(tag, pos, length, available - 1));
        }
        stack.push(Region {
            start: pos + 2,
            end: pos + 1 + length,
            data_type: DataType::from_code((header >> 8) & 0x3F),
        });
        pos += 1 + length;
    }
    Ok(())
}

/// Swap the header word of every segment or tagsegment in `region`, queueing
/// the payloads.
fn swap_segment_headers(
    words: &mut [u32],
    region: &Region,
    dir: Direction,
    stack: &mut Vec<Region>,
) -> Result<(), DecodeError> {
    let mut pos = region.start;
    while pos < region.end {
        let header = swap_header(&mut words[pos], dir);
        let length = (header & 0xFFFF) as usize;
        let (tag, code) = if region.data_type == DataType::Segment {
            (header >> 24, (header >> 16) & 0x3F)
        } else {
            (header >> 20, (header >> 16) & 0xF)
        };
        let available = region.end - pos - 1;
        if length > available {
            return Err(malformed(tag, pos, length, available));
        }
        stack.push(Region {
            start: pos + 1,
            end: pos + 1 + length,
            data_type: DataType::from_code(code),
        });
        pos += 1 + length;
    }
    Ok(())
}

/// Swap a payload of plain values.
fn swap_leaf(payload: &mut [u32], data_type: DataType) {
    match data_type {
        DataType::I16 | DataType::U16 => {
            for word in payload.iter_mut() {
                *word = swap_u16_pair(*word);
            }
        }
        DataType::Char8 | DataType::I8 | DataType::U8 => {}
        DataType::F64 | DataType::I64 | DataType::U64 => {
            let mut pairs = payload.chunks_exact_mut(2);
            for pair in &mut pairs {
                let (lo, hi) = (pair[0], pair[1]);
                pair[0] = hi.swap_bytes();
                pair[1] = lo.swap_bytes();
            }
            for word in pairs.into_remainder() {
                *word = word.swap_bytes();
            }
        }
        DataType::Bank
        | DataType::Segment
        | DataType::TagSegment
        | DataType::Unknown32
        | DataType::U32
        | DataType::F32
        | DataType::I32
        | DataType::Composite
        | DataType::Other(_) => {
            for word in payload.iter_mut() {
                *word = word.swap_bytes();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank(tag: u32, data_type: u32, num: u32, payload: &[u32]) -> Vec<u32> {
        let mut words = vec![payload.len() as u32 + 1, (tag << 16) | (data_type << 8) | num];
        words.extend_from_slice(payload);
        words
    }

    #[test]
    fn test_u32_payload_is_byte_swapped() {
        let native = bank(0x0001, 0x1, 0, &[0x1122_3344, 0xAABB_CCDD]);
        let mut foreign: Vec<u32> = native.iter().map(|w| w.swap_bytes()).collect();
        swap_block(&mut foreign).unwrap();
        assert_eq!(foreign, native);
    }

    #[test]
    fn test_u16_payload_swaps_half_words() {
        // Big-endian producer wrote the u16 values 1, 2 as bytes 00 01 00 02.
        let foreign_payload = u32::from_le_bytes([0x00, 0x01, 0x00, 0x02]);
        let mut words = bank(0x0002, 0x5, 0, &[0]);
        swap_block_to_foreign(&mut words).unwrap();
        words[2] = foreign_payload;

        swap_block(&mut words).unwrap();
        assert_eq!(words[2] & 0xFFFF, 1);
        assert_eq!(words[2] >> 16, 2);
    }

    #[test]
    fn test_u64_payload_swaps_word_pairs() {
        let value: u64 = 0x0102_0304_0506_0708;
        let native = bank(0x0003, 0xa, 0, &[value as u32, (value >> 32) as u32]);
        // Big-endian bytes of the value, read back as little-endian words.
        let be = value.to_be_bytes();
        let mut foreign = native.clone();
        swap_block_to_foreign(&mut foreign).unwrap();
        assert_eq!(foreign[2], u32::from_le_bytes([be[0], be[1], be[2], be[3]]));
        assert_eq!(foreign[3], u32::from_le_bytes([be[4], be[5], be[6], be[7]]));

        swap_block(&mut foreign).unwrap();
        assert_eq!(foreign, native);
    }

    #[test]
    fn test_char_payload_untouched() {
        let native = bank(0x0004, 0x3, 0, &[u32::from_le_bytes(*b"abcd")]);
        let mut foreign = native.clone();
        swap_block_to_foreign(&mut foreign).unwrap();
        assert_eq!(foreign[2], native[2]);
        swap_block(&mut foreign).unwrap();
        assert_eq!(foreign, native);
    }

    #[test]
    fn test_nested_segments_round_trip() {
        let seg_u64 = [(1 << 24) | (0xa << 16) | 2, 5, 0];
        let seg_u16 = [(2 << 24) | (0x5 << 16) | 1, 0x0004_0003];
        let mut payload = seg_u64.to_vec();
        payload.extend_from_slice(&seg_u16);
        let inner = bank(0xFF21, 0x20, 2, &payload);
        let native = bank(0xFF50, 0x10, 2, &inner);

        let mut words = native.clone();
        swap_block_to_foreign(&mut words).unwrap();
        assert_ne!(words, native);
        swap_block(&mut words).unwrap();
        assert_eq!(words, native);
    }

    /// An EPICS-style bank wrapped in `depth` nested segments.
    fn deeply_nested(depth: usize) -> Vec<u32> {
        let mut words = vec![0u32; depth + 3];
        for (i, word) in words.iter_mut().take(depth).enumerate() {
            let length = (depth + 2 - i) as u32;
            *word = (1 << 24) | (0x20 << 16) | length;
        }
        words[depth] = (2 << 24) | (0x3 << 16) | 2;
        words[depth + 1] = u32::from_le_bytes(*b"epic");
        words[depth + 2] = u32::from_le_bytes(*b"s\0\0\0");
        bank(0x0060, 0x20, 0, &words)
    }

    #[test]
    fn test_deep_nesting_does_not_exhaust_the_stack() {
        let native = deeply_nested(50_000);
        let mut words = native.clone();
        swap_block_to_foreign(&mut words).unwrap();
        swap_block(&mut words).unwrap();
        assert_eq!(words, native);
    }

    #[test]
    fn test_deep_nesting_with_bad_length_is_malformed() {
        let mut native = deeply_nested(20_000);
        // Innermost segment claims more words than its parent holds.
        native[2 + 20_000] = (2 << 24) | (0x3 << 16) | 9;
        let mut foreign: Vec<u32> = native.iter().map(|w| w.swap_bytes()).collect();
        let err = swap_block(&mut foreign).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedBank { declared: 9, .. }));
    }

    #[test]
    fn test_overlong_bank_is_malformed() {
        let mut words = vec![10u32.swap_bytes(), 0x0001_0100u32.swap_bytes(), 0];
        let err = swap_block(&mut words).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedBank { declared: 10, .. }));
    }
}
