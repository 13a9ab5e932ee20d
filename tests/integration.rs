//! Integration tests for blockpatch.

use blockpatch::{decode, encode, PatchError, DEFAULT_BLOCK_SIZE};

fn crc_trailer(data: &[u8]) -> [u8; 4] {
    crc32fast::hash(data).to_be_bytes()
}

fn round_trip(target: &[u8], reference: &[u8], block_size: usize) -> Vec<u8> {
    let patch = encode(target, reference, block_size).unwrap();
    let rebuilt = decode(&patch, reference).unwrap();
    assert_eq!(rebuilt, target);
    patch
}

#[test]
fn test_identical_data() {
    let data: Vec<u8> = (0..4096u32).map(|i| (i % 253) as u8).collect();
    let patch = round_trip(&data, &data, DEFAULT_BLOCK_SIZE);
    // 64 blocks collapse into one run record.
    assert!(patch.len() < 16);
}

#[test]
fn test_minor_revision() {
    // Firmware-update shape: a few small edits scattered through the image.
    let reference: Vec<u8> = (0..16384u32)
        .map(|i| (i.wrapping_mul(2654435761) >> 24) as u8)
        .collect();
    let mut target = reference.clone();
    target[130] ^= 0x01;
    target[5000] = 0xEE;
    target[12345] ^= 0x80;

    let patch = round_trip(&target, &reference, DEFAULT_BLOCK_SIZE);
    assert!(patch.len() < target.len() / 10);
}

#[test]
fn test_moved_blocks() {
    // The target reorders whole blocks of the reference.
    let reference: Vec<u8> = (0..1024u32).map(|i| (i.wrapping_mul(197) >> 2) as u8).collect();
    let mut target = Vec::new();
    target.extend_from_slice(&reference[512..]);
    target.extend_from_slice(&reference[..512]);

    let patch = round_trip(&target, &reference, DEFAULT_BLOCK_SIZE);
    assert!(patch.len() < target.len() / 4);
}

#[test]
fn test_appended_data() {
    let reference = vec![0x5Au8; 1024];
    let mut target = reference.clone();
    target.extend((0..700u32).map(|i| (i * 7 + 1) as u8));

    round_trip(&target, &reference, DEFAULT_BLOCK_SIZE);
}

#[test]
fn test_truncated_target() {
    let reference: Vec<u8> = (0..2048u32).map(|i| (i % 241) as u8).collect();
    let target = &reference[..777];

    round_trip(target, &reference, DEFAULT_BLOCK_SIZE);
}

#[test]
fn test_empty_reference() {
    // Nothing to copy from: every block is stored raw.
    let target: Vec<u8> = (0..300u32).map(|i| (i * 11 + 3) as u8).collect();
    round_trip(&target, b"", DEFAULT_BLOCK_SIZE);
}

#[test]
fn test_empty_target() {
    let patch = round_trip(b"", b"some reference data", 8);
    // Header and trailer only.
    assert_eq!(patch.len(), 5);
}

#[test]
fn test_completely_different() {
    let reference = vec![0xAAu8; 512];
    let target = vec![0x55u8; 512];
    round_trip(&target, &reference, DEFAULT_BLOCK_SIZE);
}

#[test]
fn test_small_block_sizes() {
    let reference: Vec<u8> = (0..500u32).map(|i| (i % 239) as u8).collect();
    let mut target = reference.clone();
    target[250] ^= 0xFF;

    for block_size in [8, 16, 32, 248] {
        round_trip(&target, &reference, block_size);
    }
}

#[test]
fn test_header_carries_block_size() {
    let data = vec![1u8; 256];
    for block_size in [8, 64, 128] {
        let patch = encode(&data, &data, block_size).unwrap();
        assert_eq!(patch[0], block_size as u8);
    }
}

// ---------------------------------------------------------------------------
// Byte-exact stream scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_stream_identity_with_partial_tail() {
    // 66 bytes: one matching block plus a 2-byte tail.
    let data: Vec<u8> = (0..=0x41u8).collect();
    let patch = encode(&data, &data, 64).unwrap();

    let mut expected = vec![64, 0x43, 0x50, 0x02, 0x40, 0x41];
    expected.extend_from_slice(&crc_trailer(&data));
    assert_eq!(patch, expected);

    assert_eq!(decode(&patch, &data).unwrap(), data);
}

#[test]
fn test_stream_xor_rle() {
    // The XOR delta is 64 x 0xFF, one repeat segment.
    let reference = vec![0u8; 64];
    let target = vec![0xFFu8; 64];
    let patch = encode(&target, &reference, 64).unwrap();

    let mut expected = vec![64, 0x58, 0x02, 0xBE, 0xFF];
    expected.extend_from_slice(&crc_trailer(&target));
    assert_eq!(patch, expected);

    assert_eq!(decode(&patch, &reference).unwrap(), target);
}

#[test]
fn test_stream_copy_run() {
    // 16 identical blocks collapse into one run record.
    let data = vec![0u8; 1024];
    let patch = encode(&data, &data, 64).unwrap();

    let mut expected = vec![64, 0x44, 0x0F];
    expected.extend_from_slice(&crc_trailer(&data));
    assert_eq!(patch, expected);
    assert_eq!(patch.len(), 7);
}

#[test]
fn test_stream_run_chunking() {
    // 257 identical blocks: a full 256-block run plus one single copy.
    let data = vec![0u8; 257 * 64];
    let patch = encode(&data, &data, 64).unwrap();

    let mut expected = vec![64, 0x44, 0xFF, 0x43];
    expected.extend_from_slice(&crc_trailer(&data));
    assert_eq!(patch, expected);

    assert_eq!(decode(&patch, &data).unwrap(), data);
}

#[test]
fn test_stream_copy_offset() {
    // Two swapped blocks, each found at the other's offset.
    let block_a: Vec<u8> = (0..64).map(|i| (i * 13 + 7) as u8).collect();
    let block_b: Vec<u8> = (0..64).map(|i| (i * 91 + 3) as u8).collect();

    let mut reference = block_a.clone();
    reference.extend_from_slice(&block_b);
    let mut target = block_b.clone();
    target.extend_from_slice(&block_a);

    let patch = encode(&target, &reference, 64).unwrap();

    let mut expected = vec![64, 0x52, 0x00, 0x00, 0x40, 0x52, 0x00, 0x00, 0x00];
    expected.extend_from_slice(&crc_trailer(&target));
    assert_eq!(patch, expected);
    assert_eq!(patch.len(), 13);

    assert_eq!(decode(&patch, &reference).unwrap(), target);
}

#[test]
fn test_offset_beyond_24_bits_falls_back_to_raw() {
    // The only occurrence of the target block sits at offset 2^24, one
    // past the largest offset a copy record can address.
    let block: Vec<u8> = (0..8).map(|i| (i * 37 + 11) as u8).collect();

    let mut reference = vec![0u8; 1 << 24];
    reference.extend_from_slice(&block);
    let patch = encode(&block, &reference, 8).unwrap();
    assert_eq!(patch[1], 0x49);
    assert_eq!(decode(&patch, &reference).unwrap(), block);

    // Control: the same block within addressable range is copied by offset.
    let mut near = vec![0u8; 64];
    near[8..16].copy_from_slice(&block);
    let patch = encode(&block, &near, 8).unwrap();
    assert_eq!(&patch[1..5], &[0x52, 0x00, 0x00, 0x08]);
}

// ---------------------------------------------------------------------------
// Error paths
// ---------------------------------------------------------------------------

#[test]
fn test_invalid_block_size_on_encode() {
    for size in [0, 7, 12, 63, 256, 512] {
        assert_eq!(
            encode(b"x", b"y", size),
            Err(PatchError::InvalidBlockSize { size })
        );
    }
}

#[test]
fn test_invalid_block_size_in_header() {
    assert_eq!(
        decode(&[12, 0, 0, 0, 0], b"reference"),
        Err(PatchError::InvalidBlockSize { size: 12 })
    );
    assert_eq!(
        decode(&[0, 0, 0, 0, 0], b"reference"),
        Err(PatchError::InvalidBlockSize { size: 0 })
    );
}

#[test]
fn test_patch_too_short() {
    assert_eq!(decode(&[], b"ref"), Err(PatchError::TruncatedPatch));
    assert_eq!(decode(&[64, 0, 0, 0], b"ref"), Err(PatchError::TruncatedPatch));
}

#[test]
fn test_record_truncated_mid_stream() {
    // An offset copy cut off after one of its three offset bytes.
    assert_eq!(
        decode(&[64, 0x52, 0x00, 0, 0, 0, 0], b"ref"),
        Err(PatchError::TruncatedPatch)
    );
}

#[test]
fn test_unknown_tag() {
    let err = decode(&[64, 0x00, 0xDE, 0xAD, 0xBE, 0xEF], b"ref").unwrap_err();
    assert_eq!(err, PatchError::UnknownTag(0x00));
}

#[test]
fn test_trailing_data_after_partial() {
    let patch = [64, 0x50, 0x01, 0xAA, 0x43, 0, 0, 0, 0];
    assert_eq!(decode(&patch, b"ref"), Err(PatchError::TrailingData));
}

#[test]
fn test_copy_past_reference_end() {
    let err = decode(&[64, 0x43, 0, 0, 0, 0], &[0u8; 8]).unwrap_err();
    assert!(matches!(err, PatchError::MalformedPatch(_)));
}

#[test]
fn test_offset_copy_past_reference_end() {
    let err = decode(&[64, 0x52, 0x00, 0x01, 0x00, 0, 0, 0, 0], &[0u8; 64]).unwrap_err();
    assert!(matches!(err, PatchError::MalformedPatch(_)));
}

#[test]
fn test_xor_delta_wrong_length() {
    // The payload decodes to 2 bytes, not one whole 64-byte block.
    let err = decode(&[64, 0x58, 0x02, 0x80, 0x00, 0, 0, 0, 0], &[0u8; 64]).unwrap_err();
    assert!(matches!(err, PatchError::MalformedPatch(_)));
}

#[test]
fn test_checksum_bit_flip_detected() {
    let data = vec![3u8; 256];
    let mut patch = encode(&data, &data, 64).unwrap();
    let last = patch.len() - 1;
    patch[last] ^= 0x01;

    assert!(matches!(
        decode(&patch, &data),
        Err(PatchError::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_any_corrupted_byte_is_detected() {
    // Flipping any single byte of a valid patch must make decoding fail,
    // whatever layer catches it.
    let block_a: Vec<u8> = (0..64).map(|i| (i * 13 + 7) as u8).collect();
    let block_b: Vec<u8> = (0..64).map(|i| (i * 91 + 3) as u8).collect();
    let mut reference = block_a.clone();
    reference.extend_from_slice(&block_b);
    let mut target = block_b;
    target.extend_from_slice(&block_a);

    let patch = encode(&target, &reference, 64).unwrap();

    for i in 0..patch.len() {
        let mut corrupted = patch.clone();
        corrupted[i] ^= 0xFF;
        assert!(
            decode(&corrupted, &reference).is_err(),
            "corruption at byte {} went undetected",
            i
        );
    }
}

// ---------------------------------------------------------------------------
// Boundary shapes
// ---------------------------------------------------------------------------

#[test]
fn test_target_shorter_than_block() {
    let reference = vec![9u8; 256];
    let target = [1u8, 2, 3];
    let patch = encode(&target, &reference, 64).unwrap();

    let mut expected = vec![64, 0x50, 0x03, 1, 2, 3];
    expected.extend_from_slice(&crc_trailer(&target));
    assert_eq!(patch, expected);

    assert_eq!(decode(&patch, &reference).unwrap(), target);
}

#[test]
fn test_tail_prefers_partial_over_copy() {
    // The tail equals the reference at the same offset, but still travels
    // as a partial record: the decoder cannot know the target length.
    let reference = vec![7u8; 96];
    let target = &reference[..80];
    let patch = encode(target, &reference, 64).unwrap();

    let mut expected = vec![64, 0x43, 0x50, 0x10];
    expected.extend_from_slice(&[7u8; 16]);
    expected.extend_from_slice(&crc_trailer(target));
    assert_eq!(patch, expected);
}

#[test]
fn test_exact_multiple_has_no_partial() {
    let data = vec![0u8; 128];
    let patch = encode(&data, &data, 64).unwrap();
    let mut expected = vec![64, 0x44, 0x01];
    expected.extend_from_slice(&crc_trailer(&data));
    assert_eq!(patch, expected);
}

#[test]
fn test_patch_never_beats_raw_bound() {
    // Every record costs at most as much as storing the block raw.
    let block_size = 64;
    let target: Vec<u8> = (0..2000u32)
        .map(|i| (i.wrapping_mul(48271) >> 8) as u8)
        .collect();
    let reference = vec![0u8; 16];

    let patch = encode(&target, &reference, block_size).unwrap();
    let full_blocks = target.len() / block_size;
    let tail = target.len() % block_size;
    let bound = 1 + full_blocks * (1 + block_size) + if tail > 0 { 2 + tail } else { 0 } + 4;
    assert!(patch.len() <= bound);

    assert_eq!(decode(&patch, &reference).unwrap(), target);
}
