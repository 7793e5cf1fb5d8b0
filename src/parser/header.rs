//! Bank, segment and tag-segment headers.

use crate::cursor::WordCursor;
use crate::error::DecodeError;
use crate::layout::DataType;
use serde::Serialize;

/// Two-word bank header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BankHeader {
    /// Payload length in words (the length word counts the second header word too).
    pub payload_len: usize,
    /// 16-bit tag.
    pub tag: u32,
    /// Padding bytes at the end of 8/16-bit payloads.
    pub pad: u32,
    /// Payload data type.
    pub data_type: DataType,
    /// 8-bit secondary identifier.
    pub num: u32,
    /// Absolute word offset of the header.
    pub offset: usize,
}

impl BankHeader {
    /// Decode the two header words.
    #[must_use]
    pub fn from_words(length: u32, word: u32, offset: usize) -> Self {
        Self {
            payload_len: (length as usize).saturating_sub(1),
            tag: word >> 16,
            pad: (word >> 14) & 0x3,
            data_type: DataType::from_code((word >> 8) & 0x3F),
            num: word & 0xFF,
            offset,
        }
    }

    /// Read a header and return it with a cursor bounded to its payload.
    ///
    /// Fails with [`DecodeError::MalformedBank`] when the declared length runs
    /// past the enclosing cursor.
    pub fn read<'a>(cur: &mut WordCursor<'a>) -> Result<(Self, WordCursor<'a>), DecodeError> {
        let offset = cur.position();
        let length = cur.next_word()?;
        if length == 0 {
            return Err(DecodeError::MalformedBank {
                tag: 0,
                offset,
                declared: 0,
                available: cur.remaining(),
            });
        }
        let header = Self::from_words(length, cur.next_word()?, offset);
        if header.payload_len > cur.remaining() {
            return Err(DecodeError::MalformedBank {
                tag: header.tag,
                offset,
                declared: header.payload_len,
                available: cur.remaining(),
            });
        }
        let payload = cur.split(header.payload_len)?;
        Ok((header, payload))
    }
}

/// One-word segment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegmentHeader {
    /// Payload length in words.
    pub payload_len: usize,
    /// 8-bit tag.
    pub tag: u32,
    /// Padding bytes.
    pub pad: u32,
    /// Payload data type.
    pub data_type: DataType,
    /// Absolute word offset of the header.
    pub offset: usize,
}

impl SegmentHeader {
    /// Decode a segment header word.
    #[must_use]
    pub fn from_word(word: u32, offset: usize) -> Self {
        Self {
            payload_len: (word & 0xFFFF) as usize,
            tag: word >> 24,
            pad: (word >> 22) & 0x3,
            data_type: DataType::from_code((word >> 16) & 0x3F),
            offset,
        }
    }

    /// Read a header and return it with a cursor bounded to its payload.
    pub fn read<'a>(cur: &mut WordCursor<'a>) -> Result<(Self, WordCursor<'a>), DecodeError> {
        let offset = cur.position();
        let header = Self::from_word(cur.next_word()?, offset);
        if header.payload_len > cur.remaining() {
            return Err(DecodeError::MalformedBank {
                tag: header.tag,
                offset,
                declared: header.payload_len,
                available: cur.remaining(),
            });
        }
        let payload = cur.split(header.payload_len)?;
        Ok((header, payload))
    }
}

/// One-word tag-segment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TagSegmentHeader {
    /// Payload length in words.
    pub payload_len: usize,
    /// 12-bit tag.
    pub tag: u32,
    /// Payload data type (4 bits).
    pub data_type: DataType,
    /// Absolute word offset of the header.
    pub offset: usize,
}

impl TagSegmentHeader {
    /// Decode a tag-segment header word.
    #[must_use]
    pub fn from_word(word: u32, offset: usize) -> Self {
        Self {
            payload_len: (word & 0xFFFF) as usize,
            tag: word >> 20,
            data_type: DataType::from_code((word >> 16) & 0xF),
            offset,
        }
    }

    /// Read a header and return it with a cursor bounded to its payload.
    pub fn read<'a>(cur: &mut WordCursor<'a>) -> Result<(Self, WordCursor<'a>), DecodeError> {
        let offset = cur.position();
        let header = Self::from_word(cur.next_word()?, offset);
        if header.payload_len > cur.remaining() {
            return Err(DecodeError::MalformedBank {
                tag: header.tag,
                offset,
                declared: header.payload_len,
                available: cur.remaining(),
            });
        }
        let payload = cur.split(header.payload_len)?;
        Ok((header, payload))
    }
}

/// Encode a bank header (length word and tag word) for `payload_len` payload words.
#[must_use]
pub fn encode_bank_header(tag: u32, data_type: DataType, num: u32, payload_len: usize) -> [u32; 2] {
    [
        payload_len as u32 + 1,
        ((tag & 0xFFFF) << 16) | ((data_type.code() & 0x3F) << 8) | (num & 0xFF),
    ]
}

/// Encode a segment header word.
#[must_use]
pub fn encode_segment_header(tag: u32, data_type: DataType, payload_len: usize) -> u32 {
    ((tag & 0xFF) << 24) | ((data_type.code() & 0x3F) << 16) | (payload_len as u32 & 0xFFFF)
}

/// Encode a tag-segment header word.
#[must_use]
pub fn encode_tagsegment_header(tag: u32, data_type: DataType, payload_len: usize) -> u32 {
    ((tag & 0xFFF) << 20) | ((data_type.code() & 0xF) << 16) | (payload_len as u32 & 0xFFFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_header_fields() {
        let words = [3, 0xFF50_1002, 0xA, 0xB];
        let mut cur = WordCursor::new(&words);
        let (header, mut payload) = BankHeader::read(&mut cur).unwrap();
        assert_eq!(header.tag, 0xFF50);
        assert_eq!(header.data_type, DataType::Bank);
        assert_eq!(header.num, 2);
        assert_eq!(header.payload_len, 2);
        assert_eq!(payload.next_word().unwrap(), 0xA);
        assert!(cur.is_empty());
    }

    #[test]
    fn test_bank_past_bound_is_malformed() {
        let words = [5, 0x0001_0100, 1, 2];
        let mut cur = WordCursor::new(&words);
        let err = BankHeader::read(&mut cur).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MalformedBank {
                tag: 1,
                offset: 0,
                declared: 4,
                available: 2
            }
        );
    }

    #[test]
    fn test_segment_and_tagsegment_headers() {
        let seg = encode_segment_header(0x62, DataType::Char8, 3);
        let header = SegmentHeader::from_word(seg, 0);
        assert_eq!((header.tag, header.payload_len), (0x62, 3));
        assert_eq!(header.data_type, DataType::Char8);

        let tseg = encode_tagsegment_header(0xABC, DataType::U32, 7);
        let header = TagSegmentHeader::from_word(tseg, 0);
        assert_eq!((header.tag, header.payload_len), (0xABC, 7));
        assert_eq!(header.data_type, DataType::U32);
    }

    #[test]
    fn test_encode_bank_header() {
        let [len, word] = encode_bank_header(0x0060, DataType::Segment, 0, 4);
        let header = BankHeader::from_words(len, word, 0);
        assert_eq!(header.payload_len, 4);
        assert_eq!(header.tag, 0x0060);
        assert_eq!(header.data_type, DataType::Segment);
    }
}
