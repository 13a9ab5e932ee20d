//! Error types for patch operations.

use std::fmt;

/// Result type for patch operations.
pub type Result<T> = std::result::Result<T, PatchError>;

/// Errors that can occur while building or applying a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The block size is zero, not a multiple of 8, or larger than 255.
    InvalidBlockSize {
        /// The rejected block size.
        size: usize,
    },

    /// The patch ended in the middle of a record, or is too short to hold
    /// a header and a checksum trailer.
    TruncatedPatch,

    /// The record stream contains a byte that is not a known record tag.
    UnknownTag(u8),

    /// A record is internally inconsistent or reads past the end of the
    /// reference.
    MalformedPatch(String),

    /// Bytes remain in the record stream after a partial-block record.
    TrailingData,

    /// The reconstructed output does not match the checksum stored in the
    /// patch trailer.
    ChecksumMismatch {
        /// CRC-32 stored in the trailer.
        expected: u32,
        /// CRC-32 of the reconstructed output.
        actual: u32,
    },
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchError::InvalidBlockSize { size } => {
                write!(
                    f,
                    "Invalid block size: {} (must be a positive multiple of 8, at most 255)",
                    size
                )
            }
            PatchError::TruncatedPatch => write!(f, "Patch data ended unexpectedly"),
            PatchError::UnknownTag(tag) => write!(f, "Unknown record tag: 0x{:02X}", tag),
            PatchError::MalformedPatch(msg) => write!(f, "Malformed patch: {}", msg),
            PatchError::TrailingData => {
                write!(f, "Trailing data after the partial-block record")
            }
            PatchError::ChecksumMismatch { expected, actual } => {
                write!(
                    f,
                    "Checksum mismatch: patch stores 0x{:08X}, reconstruction has 0x{:08X}",
                    expected, actual
                )
            }
        }
    }
}

impl std::error::Error for PatchError {}
