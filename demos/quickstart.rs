//! Basic usage example for blockpatch.

use blockpatch::{decode, encode, DEFAULT_BLOCK_SIZE};

fn main() {
    // Example 1: Minor firmware revision
    println!("=== Example 1: Minor Firmware Revision ===");
    let size = 16 * 1024;
    let reference: Vec<u8> = (0..size as u32)
        .map(|i| (i.wrapping_mul(2654435761) >> 24) as u8)
        .collect();

    // A handful of changed bytes scattered through the image.
    let mut target = reference.clone();
    target[0x0102] ^= 0x01;
    target[0x1388] = 0xEE;
    target[0x3039] ^= 0x80;

    match encode(&target, &reference, DEFAULT_BLOCK_SIZE) {
        Ok(patch) => {
            println!("Reference size: {} bytes", reference.len());
            println!("Target size:    {} bytes", target.len());
            println!("Patch size:     {} bytes", patch.len());
            println!(
                "Space saved: {:.1}%",
                (1.0 - patch.len() as f64 / target.len() as f64) * 100.0
            );

            // Decode to verify
            match decode(&patch, &reference) {
                Ok(rebuilt) => {
                    assert_eq!(rebuilt, target);
                    println!("✓ Target rebuilt bit-for-bit from reference + patch!");
                }
                Err(e) => eprintln!("Decode error: {}", e),
            }
        }
        Err(e) => eprintln!("Encode error: {}", e),
    }

    println!();

    // Example 2: Block size trade-off
    println!("=== Example 2: Block Size Trade-off ===");
    for block_size in [8, 32, 64, 128] {
        match encode(&target, &reference, block_size) {
            Ok(patch) => {
                println!("Block size {:>3} B -> patch {:>5} bytes", block_size, patch.len());
            }
            Err(e) => eprintln!("Encode error at block size {}: {}", block_size, e),
        }
    }

    println!();

    // Example 3: Appended section
    println!("=== Example 3: Appended Section ===");
    let mut extended = reference.clone();
    extended.extend((0..2048u32).map(|i| (i * 7 + 1) as u8));

    match encode(&extended, &reference, DEFAULT_BLOCK_SIZE) {
        Ok(patch) => {
            println!("Reference size: {} bytes", reference.len());
            println!("Extended size:  {} bytes", extended.len());
            println!("Patch size:     {} bytes", patch.len());

            match decode(&patch, &reference) {
                Ok(rebuilt) => {
                    assert_eq!(rebuilt, extended);
                    println!("✓ Extended image rebuilt from the original reference!");
                }
                Err(e) => eprintln!("Decode error: {}", e),
            }
        }
        Err(e) => eprintln!("Encode error: {}", e),
    }

    println!();
    println!("=== All Examples Completed ===");
}
