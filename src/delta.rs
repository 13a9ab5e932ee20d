//! Core patch generation and application.

use crate::buffer::BufferStream;
use crate::error::{PatchError, Result};
use crate::index::BlockIndex;
use crate::record::Record;
use crate::rle;

/// Block size used when the caller has no preference.
pub const DEFAULT_BLOCK_SIZE: usize = 64;

/// Largest reference offset a copy record can address (3 bytes, big-endian).
const MAX_OFFSET: usize = 0x00FF_FFFF;

/// Most extra blocks a single run record can cover.
const MAX_RUN_EXTENSION: usize = 255;

/// Patch trailer: 4-byte CRC-32 of the target, big-endian.
const TRAILER_LEN: usize = 4;

/// Encodes a patch that rebuilds `target` from `reference`.
pub fn encode(target: &[u8], reference: &[u8], block_size: usize) -> Result<Vec<u8>> {
    validate_block_size(block_size)?;

    let index = BlockIndex::build(reference, block_size);

    let mut out = BufferStream::with_capacity(target.len() / 4 + 16);
    out.write_u8(block_size as u8);

    let mut pos = 0;
    while pos + block_size <= target.len() {
        if matches_reference(target, reference, pos, block_size) {
            let extra = extend_run(target, reference, pos, block_size);
            if extra == 0 {
                Record::CopySame.write(&mut out);
            } else {
                Record::CopyRun {
                    count: extra as u8,
                }
                .write(&mut out);
            }
            pos += (extra + 1) * block_size;
            continue;
        }

        let block = &target[pos..pos + block_size];
        best_record(block, reference, pos, &index, block_size).write(&mut out);
        pos += block_size;
    }

    if pos < target.len() {
        Record::Partial {
            data: target[pos..].to_vec(),
        }
        .write(&mut out);
    }

    out.write_bytes(&crc32fast::hash(target).to_be_bytes());
    Ok(out.into_vec())
}

fn validate_block_size(block_size: usize) -> Result<()> {
    if block_size == 0 || block_size % 8 != 0 || block_size > u8::MAX as usize {
        return Err(PatchError::InvalidBlockSize { size: block_size });
    }
    Ok(())
}

/// True when the reference holds the target block at the same offset.
fn matches_reference(target: &[u8], reference: &[u8], pos: usize, block_size: usize) -> bool {
    pos + block_size <= reference.len()
        && reference[pos..pos + block_size] == target[pos..pos + block_size]
}

/// Number of blocks after `pos` that also match the reference in place.
fn extend_run(target: &[u8], reference: &[u8], pos: usize, block_size: usize) -> usize {
    let mut extra = 0;
    while extra < MAX_RUN_EXTENSION {
        let next = pos + (extra + 1) * block_size;
        if next + block_size > target.len()
            || !matches_reference(target, reference, next, block_size)
        {
            break;
        }
        extra += 1;
    }
    extra
}

/// Picks the cheapest encoding for a block with no same-position match.
///
/// Costs: offset copy 4 bytes, XOR delta 2 + payload, raw 1 + block size.
/// Ties go to the cheaper replay: offset copy, then XOR, then raw.
fn best_record(
    block: &[u8],
    reference: &[u8],
    pos: usize,
    index: &BlockIndex<'_>,
    block_size: usize,
) -> Record {
    const OFFSET_COST: usize = 4;

    let offset = index.lookup(block).filter(|&o| o <= MAX_OFFSET);
    let xor_payload = xor_rle_payload(block, reference, pos, block_size);

    match (offset, xor_payload) {
        (Some(offset), Some(payload)) if OFFSET_COST <= 2 + payload.len() => Record::CopyOffset {
            offset: offset as u32,
        },
        (_, Some(payload)) => Record::XorRle { payload },
        (Some(offset), None) => Record::CopyOffset {
            offset: offset as u32,
        },
        (None, None) => Record::Raw {
            data: block.to_vec(),
        },
    }
}

/// Run-length coded XOR delta against the same-position reference block,
/// when that block is in range and the coded form beats storing raw bytes.
/// The block size cap of 255 keeps the payload length in one byte.
fn xor_rle_payload(
    block: &[u8],
    reference: &[u8],
    pos: usize,
    block_size: usize,
) -> Option<Vec<u8>> {
    if pos + block_size > reference.len() {
        return None;
    }
    let delta: Vec<u8> = block
        .iter()
        .zip(&reference[pos..pos + block_size])
        .map(|(t, r)| t ^ r)
        .collect();
    let payload = rle::encode(&delta);
    (payload.len() < block_size).then_some(payload)
}

/// Applies `patch` to `reference`, reconstructing the target.
pub fn decode(patch: &[u8], reference: &[u8]) -> Result<Vec<u8>> {
    if patch.len() < 1 + TRAILER_LEN {
        return Err(PatchError::TruncatedPatch);
    }

    let block_size = patch[0] as usize;
    if block_size == 0 || block_size % 8 != 0 {
        return Err(PatchError::InvalidBlockSize { size: block_size });
    }

    let body_end = patch.len() - TRAILER_LEN;
    let expected = u32::from_be_bytes([
        patch[body_end],
        patch[body_end + 1],
        patch[body_end + 2],
        patch[body_end + 3],
    ]);

    let mut stream = BufferStream::from_slice(&patch[1..body_end]);
    let mut output = Vec::new();

    while stream.remaining() > 0 {
        match Record::read(&mut stream, block_size)? {
            Record::CopySame => copy_same(&mut output, reference, block_size)?,
            Record::CopyRun { count } => {
                for _ in 0..=count {
                    copy_same(&mut output, reference, block_size)?;
                }
            }
            Record::CopyOffset { offset } => {
                let offset = offset as usize;
                if offset + block_size > reference.len() {
                    return Err(PatchError::MalformedPatch(format!(
                        "copy offset {} reads past the reference ({} bytes)",
                        offset,
                        reference.len()
                    )));
                }
                output.extend_from_slice(&reference[offset..offset + block_size]);
            }
            Record::XorRle { payload } => {
                let delta = rle::decode(&payload, block_size)?;
                let pos = output.len();
                if pos + block_size > reference.len() {
                    return Err(PatchError::MalformedPatch(format!(
                        "XOR delta at output offset {} reads past the reference ({} bytes)",
                        pos,
                        reference.len()
                    )));
                }
                output.extend(
                    delta
                        .iter()
                        .zip(&reference[pos..pos + block_size])
                        .map(|(d, r)| d ^ r),
                );
            }
            Record::Raw { data } => output.extend_from_slice(&data),
            Record::Partial { data } => {
                output.extend_from_slice(&data);
                if stream.remaining() > 0 {
                    return Err(PatchError::TrailingData);
                }
            }
        }
    }

    let actual = crc32fast::hash(&output);
    if actual != expected {
        return Err(PatchError::ChecksumMismatch { expected, actual });
    }

    Ok(output)
}

/// Appends the reference block at the current output offset.
fn copy_same(output: &mut Vec<u8>, reference: &[u8], block_size: usize) -> Result<()> {
    let pos = output.len();
    if pos + block_size > reference.len() {
        return Err(PatchError::MalformedPatch(format!(
            "same-position copy at output offset {} reads past the reference ({} bytes)",
            pos,
            reference.len()
        )));
    }
    output.extend_from_slice(&reference[pos..pos + block_size]);
    Ok(())
}
