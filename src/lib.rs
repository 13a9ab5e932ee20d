//! # blockpatch
//!
//! Compact binary delta patches between two versions of a binary blob.
//!
//! Given a reference blob (the version a device already holds) and a target
//! blob (the version it should end up with), [`encode`] produces a patch
//! that [`decode`] replays against the reference to reproduce the target
//! bit-for-bit. A CRC-32 trailer verifies the reconstruction end to end.
//!
//! The patch is self-describing: its first byte carries the block size used
//! to build it. Patches are smallest when the target is a minor revision of
//! the reference, the typical firmware-update case.
//!
//! ## Quick Start
//!
//! ```
//! use blockpatch::{decode, encode, DEFAULT_BLOCK_SIZE};
//!
//! let reference = vec![0u8; 1024];
//! let mut target = reference.clone();
//! target[512] = 0xFF;
//!
//! let patch = encode(&target, &reference, DEFAULT_BLOCK_SIZE).unwrap();
//! let rebuilt = decode(&patch, &reference).unwrap();
//! assert_eq!(rebuilt, target);
//! ```
//!
//! ## Patch Format
//!
//! ```text
//! byte 0        block size (positive multiple of 8, at most 255)
//! bytes 1..n-4  record stream, one record per target block
//! bytes n-4..n  CRC-32 of the target, big-endian
//! ```
//!
//! Each record in the stream rebuilds one block of the target, choosing the
//! cheapest of: copying the reference block at the same offset (also as a
//! run covering up to 256 consecutive blocks), copying the reference block
//! at an explicit offset below 2^24, XORing the same-offset reference block
//! with a run-length coded delta, or storing the block verbatim. A target
//! shorter than a whole number of blocks ends with a partial-block record.
//!
//! ## Algorithm Details
//!
//! The encoder works by:
//! 1. Indexing every block-sized slice of the reference by content, with
//!    block-aligned offsets taking priority
//! 2. Walking the target block by block, greedily extending same-position
//!    matches into runs
//! 3. Falling back to the cheapest of offset copy, XOR delta, or raw bytes
//!    for blocks that moved or changed

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod buffer;
mod delta;
mod error;
mod index;
mod record;
mod rle;

pub use delta::DEFAULT_BLOCK_SIZE;
pub use error::{PatchError, Result};

/// Encodes a patch that rebuilds `target` from `reference`.
///
/// The patch can later be applied with [`decode`] against the same
/// reference to reconstruct the target exactly.
///
/// # Arguments
///
/// * `target` - The data to reconstruct when the patch is applied
/// * `reference` - The data the patch will be applied against
/// * `block_size` - Comparison granularity in bytes; a positive multiple
///   of 8, at most 255 ([`DEFAULT_BLOCK_SIZE`] is a good default)
///
/// # Errors
///
/// Returns [`PatchError::InvalidBlockSize`] if `block_size` is zero, not a
/// multiple of 8, or larger than 255. Encoding has no other failure mode:
/// a block that matches nothing in the reference is stored verbatim.
///
/// # Examples
///
/// ```
/// use blockpatch::encode;
///
/// let reference = vec![0u8; 256];
/// let target = vec![1u8; 256];
///
/// let patch = encode(&target, &reference, 64).unwrap();
/// println!("Patch size: {} bytes", patch.len());
/// ```
///
/// # Performance
///
/// Encoding time is proportional to the target size plus the cost of
/// indexing every block-sized window of the reference. Both blobs are held
/// in memory for the duration of the call.
pub fn encode(target: &[u8], reference: &[u8], block_size: usize) -> Result<Vec<u8>> {
    delta::encode(target, reference, block_size)
}

/// Applies a patch (created by [`encode`]) to `reference`, reconstructing
/// the target.
///
/// # Arguments
///
/// * `patch` - The encoded patch
/// * `reference` - The same reference data used during encoding
///
/// # Errors
///
/// Returns an error if the patch is corrupted or does not belong to this
/// reference:
///
/// - [`PatchError::TruncatedPatch`] - the patch ends mid-record or is too
///   short to hold a header and trailer
/// - [`PatchError::InvalidBlockSize`] - the header block size is invalid
/// - [`PatchError::UnknownTag`] - the stream holds an unrecognized record
/// - [`PatchError::MalformedPatch`] - a record reads past the end of the
///   reference, or an XOR delta does not decode to one whole block
/// - [`PatchError::TrailingData`] - records follow the partial-block record
/// - [`PatchError::ChecksumMismatch`] - the reconstruction does not match
///   the stored CRC-32
///
/// # Examples
///
/// ```
/// use blockpatch::{decode, encode};
///
/// let reference = b"old firmware image, version 1".repeat(8);
/// let target = b"new firmware image, version 2".repeat(8);
///
/// let patch = encode(&target, &reference, 64).unwrap();
/// let rebuilt = decode(&patch, &reference).unwrap();
/// assert_eq!(rebuilt, target);
/// ```
pub fn decode(patch: &[u8], reference: &[u8]) -> Result<Vec<u8>> {
    delta::decode(patch, reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_identical() {
        let data = vec![0xA5u8; 4096];
        let patch = encode(&data, &data, DEFAULT_BLOCK_SIZE).unwrap();
        let rebuilt = decode(&patch, &data).unwrap();
        assert_eq!(rebuilt, data);
        // An identical target collapses into a handful of run records.
        assert!(patch.len() < 16);
    }

    #[test]
    fn test_encode_decode_different() {
        let reference: Vec<u8> = (0..2048u32).map(|i| (i % 251) as u8).collect();
        let mut target = reference.clone();
        target[100] ^= 0xFF;
        target[1500] = 0;

        let patch = encode(&target, &reference, DEFAULT_BLOCK_SIZE).unwrap();
        let rebuilt = decode(&patch, &reference).unwrap();
        assert_eq!(rebuilt, target);
        assert!(patch.len() < target.len());
    }

    #[test]
    fn test_invalid_block_size_rejected() {
        assert_eq!(
            encode(b"data", b"data", 12),
            Err(PatchError::InvalidBlockSize { size: 12 })
        );
    }
}
