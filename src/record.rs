//! Patch records and their wire forms.
//!
//! Each record describes how to rebuild one block of the target:
//!
//! | Record       | Tag  | Wire form                                  |
//! |--------------|------|--------------------------------------------|
//! | `CopySame`   | 0x43 | tag                                        |
//! | `CopyRun`    | 0x44 | tag, count (count+1 blocks, 2-256)         |
//! | `Raw`        | 0x49 | tag, one block of data                     |
//! | `Partial`    | 0x50 | tag, length, that many bytes               |
//! | `CopyOffset` | 0x52 | tag, 3-byte big-endian reference offset    |
//! | `XorRle`     | 0x58 | tag, length, run-length coded XOR delta    |

use crate::buffer::BufferStream;
use crate::error::{PatchError, Result};

/// Tag byte for a same-position block copy.
pub const TAG_COPY_SAME: u8 = 0x43;

/// Tag byte for a run of same-position block copies.
pub const TAG_COPY_RUN: u8 = 0x44;

/// Tag byte for a verbatim full block.
pub const TAG_RAW: u8 = 0x49;

/// Tag byte for the trailing partial block.
pub const TAG_PARTIAL: u8 = 0x50;

/// Tag byte for a block copied from an explicit reference offset.
pub const TAG_COPY_OFFSET: u8 = 0x52;

/// Tag byte for a run-length coded XOR delta.
pub const TAG_XOR_RLE: u8 = 0x58;

/// One unit of the patch stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// The reference holds this block at the current output offset.
    CopySame,

    /// `count + 1` consecutive same-position copies.
    CopyRun {
        /// Number of blocks beyond the first (1-255).
        count: u8,
    },

    /// The reference holds this block at `offset`.
    CopyOffset {
        /// Byte offset into the reference, below 2^24.
        offset: u32,
    },

    /// Run-length coded XOR delta against the reference block at the
    /// current output offset.
    XorRle {
        /// The coded delta, 1-255 bytes.
        payload: Vec<u8>,
    },

    /// One full block stored verbatim.
    Raw {
        /// The block contents.
        data: Vec<u8>,
    },

    /// The trailing partial block, stored verbatim.
    Partial {
        /// The tail bytes, 1-255 of them.
        data: Vec<u8>,
    },
}

impl Record {
    /// Serialized size of this record in bytes.
    pub fn encoded_len(&self) -> usize {
        match self {
            Record::CopySame => 1,
            Record::CopyRun { .. } => 2,
            Record::CopyOffset { .. } => 4,
            Record::XorRle { payload } => 2 + payload.len(),
            Record::Raw { data } => 1 + data.len(),
            Record::Partial { data } => 2 + data.len(),
        }
    }

    /// Appends this record's wire form to `out`.
    pub fn write(&self, out: &mut BufferStream) {
        match self {
            Record::CopySame => out.write_u8(TAG_COPY_SAME),
            Record::CopyRun { count } => {
                out.write_u8(TAG_COPY_RUN);
                out.write_u8(*count);
            }
            Record::CopyOffset { offset } => {
                out.write_u8(TAG_COPY_OFFSET);
                out.write_u24_be(*offset);
            }
            Record::XorRle { payload } => {
                debug_assert!(!payload.is_empty() && payload.len() <= u8::MAX as usize);
                out.write_u8(TAG_XOR_RLE);
                out.write_u8(payload.len() as u8);
                out.write_bytes(payload);
            }
            Record::Raw { data } => {
                out.write_u8(TAG_RAW);
                out.write_bytes(data);
            }
            Record::Partial { data } => {
                debug_assert!(!data.is_empty() && data.len() <= u8::MAX as usize);
                out.write_u8(TAG_PARTIAL);
                out.write_u8(data.len() as u8);
                out.write_bytes(data);
            }
        }
    }

    /// Parses one record from `stream`.
    ///
    /// Running out of bytes mid-record is [`PatchError::TruncatedPatch`];
    /// a tag outside the record set is [`PatchError::UnknownTag`].
    pub fn read(stream: &mut BufferStream, block_size: usize) -> Result<Record> {
        let tag = stream.read_u8()?;
        match tag {
            TAG_COPY_SAME => Ok(Record::CopySame),
            TAG_COPY_RUN => Ok(Record::CopyRun {
                count: stream.read_u8()?,
            }),
            TAG_COPY_OFFSET => Ok(Record::CopyOffset {
                offset: stream.read_u24_be()?,
            }),
            TAG_XOR_RLE => {
                let len = stream.read_u8()? as usize;
                Ok(Record::XorRle {
                    payload: stream.read_bytes(len)?.to_vec(),
                })
            }
            TAG_RAW => Ok(Record::Raw {
                data: stream.read_bytes(block_size)?.to_vec(),
            }),
            TAG_PARTIAL => {
                let len = stream.read_u8()? as usize;
                Ok(Record::Partial {
                    data: stream.read_bytes(len)?.to_vec(),
                })
            }
            other => Err(PatchError::UnknownTag(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_round_trip(record: Record, block_size: usize) {
        let mut out = BufferStream::with_capacity(16);
        record.write(&mut out);
        assert_eq!(out.len(), record.encoded_len());

        let mut stream = BufferStream::from_slice(out.as_slice());
        let parsed = Record::read(&mut stream, block_size).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(stream.remaining(), 0);
    }

    #[test]
    fn test_wire_forms() {
        wire_round_trip(Record::CopySame, 8);
        wire_round_trip(Record::CopyRun { count: 255 }, 8);
        wire_round_trip(Record::CopyOffset { offset: 0x00ABCDEF }, 8);
        wire_round_trip(
            Record::XorRle {
                payload: vec![0xBE, 0xFF],
            },
            64,
        );
        wire_round_trip(Record::Raw { data: vec![7; 8] }, 8);
        wire_round_trip(Record::Partial { data: vec![1, 2] }, 8);
    }

    #[test]
    fn test_copy_offset_wire_bytes() {
        let mut out = BufferStream::with_capacity(4);
        Record::CopyOffset { offset: 0x40 }.write(&mut out);
        assert_eq!(out.as_slice(), &[TAG_COPY_OFFSET, 0x00, 0x00, 0x40]);
    }

    #[test]
    fn test_unknown_tag() {
        let mut stream = BufferStream::from_slice(&[0x00]);
        assert_eq!(
            Record::read(&mut stream, 8),
            Err(PatchError::UnknownTag(0x00))
        );
    }

    #[test]
    fn test_truncated_records() {
        for bytes in [
            &[TAG_COPY_RUN][..],
            &[TAG_COPY_OFFSET, 0x00][..],
            &[TAG_RAW, 1, 2, 3][..],
            &[TAG_XOR_RLE, 5, 1, 2][..],
            &[TAG_PARTIAL, 3, 1][..],
        ] {
            let mut stream = BufferStream::from_slice(bytes);
            assert_eq!(
                Record::read(&mut stream, 8),
                Err(PatchError::TruncatedPatch),
                "bytes: {:02X?}",
                bytes
            );
        }
    }
}
