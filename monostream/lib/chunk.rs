use std::time::Duration;

use bytes::Bytes;
use getset::{CopyGetters, Getters};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The part number given to the first chunk of a stream.
///
/// Parts are numbered from 1 so they line up with the part numbers registries use for
/// multi-part uploads.
pub const FIRST_PART: u64 = 1;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A single part of a byte stream, tagged with its position in that stream.
///
/// Every chunk owns a freshly allocated buffer. Cloning the [`Bytes`] returned by
/// [`Chunk::bytes`] is cheap and the clone may outlive the callback that received the chunk.
///
/// A chunk is never empty, so its byte range is always well formed:
/// `byte_range_end == byte_range_begin + len - 1`.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct Chunk {
    /// The content of this part.
    #[getset(get = "pub")]
    bytes: Bytes,

    /// The position of this part among all parts of the stream, starting at [`FIRST_PART`].
    #[getset(get_copy = "pub")]
    part: u64,

    /// Zero-based offset of the first byte of this part within the stream.
    #[getset(get_copy = "pub")]
    byte_range_begin: u64,

    /// Zero-based offset of the last byte of this part within the stream (inclusive).
    #[getset(get_copy = "pub")]
    byte_range_end: u64,

    /// Time spent reading this part from the source.
    #[getset(get_copy = "pub")]
    read_duration: Duration,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Chunk {
    /// Creates a chunk for `bytes` starting at `byte_range_begin`.
    ///
    /// Returns `None` if `bytes` is empty, since an empty part has no byte range.
    pub fn new(
        part: u64,
        byte_range_begin: u64,
        bytes: Bytes,
        read_duration: Duration,
    ) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }

        let byte_range_end = byte_range_begin + bytes.len() as u64 - 1;
        Some(Self {
            bytes,
            part,
            byte_range_begin,
            byte_range_end,
            read_duration,
        })
    }

    /// The number of bytes in this part.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always `false`; chunks are never empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consumes the chunk and returns its content.
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_byte_range_is_inclusive() {
        let chunk = Chunk::new(3, 6, Bytes::from_static(b"GHI"), Duration::ZERO).unwrap();

        assert_eq!(chunk.part(), 3);
        assert_eq!(chunk.byte_range_begin(), 6);
        assert_eq!(chunk.byte_range_end(), 8);
        assert_eq!(
            chunk.byte_range_end() - chunk.byte_range_begin() + 1,
            chunk.len() as u64
        );
    }

    #[test]
    fn test_chunk_single_byte() {
        let chunk = Chunk::new(FIRST_PART, 0, Bytes::from_static(b"A"), Duration::ZERO).unwrap();

        assert_eq!(chunk.byte_range_begin(), chunk.byte_range_end());
        assert_eq!(chunk.into_bytes(), Bytes::from_static(b"A"));
    }

    #[test]
    fn test_chunk_rejects_empty_bytes() {
        assert!(Chunk::new(FIRST_PART, 0, Bytes::new(), Duration::ZERO).is_none());
    }
}
