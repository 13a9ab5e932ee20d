//! Block index over the reference blob.
//!
//! Maps every block-sized slice of the reference to the earliest offset at
//! which it occurs. Offsets that are multiples of the block size are
//! indexed first, so an aligned occurrence wins over an unaligned one when
//! the same block appears at both.

use std::collections::HashMap;

/// Lookup table from block content to its earliest offset in the reference.
pub struct BlockIndex<'a> {
    map: HashMap<&'a [u8], usize>,
}

impl<'a> BlockIndex<'a> {
    /// Indexes every `block_size`-byte window of `reference`.
    pub fn build(reference: &'a [u8], block_size: usize) -> Self {
        debug_assert!(block_size > 0);

        let mut map: HashMap<&[u8], usize> = HashMap::new();
        if reference.len() >= block_size {
            let last = reference.len() - block_size;

            // Aligned offsets first, so they are retained as the earliest
            // match when the unaligned pass sees the same block.
            for offset in (0..=last).step_by(block_size) {
                map.entry(&reference[offset..offset + block_size])
                    .or_insert(offset);
            }
            for offset in 0..=last {
                if offset % block_size != 0 {
                    map.entry(&reference[offset..offset + block_size])
                        .or_insert(offset);
                }
            }
        }

        Self { map }
    }

    /// Returns the earliest offset at which `block` occurs in the reference.
    pub fn lookup(&self, block: &[u8]) -> Option<usize> {
        self.map.get(block).copied()
    }
}
