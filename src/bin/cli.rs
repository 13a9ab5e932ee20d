//! blockpatch CLI - block-based binary patch tool
//!
//! Usage:
//!   blockpatch encode <reference> <target> [-o <output>] [OPTIONS]
//!   blockpatch decode <reference> <patch> [output] [OPTIONS]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;
use sysinfo::System;

/// Block-based binary patch tool
#[derive(Parser)]
#[command(name = "blockpatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a patch that turns the reference file into the target file
    Encode {
        /// Reference file (the version the device already holds)
        reference: PathBuf,

        /// Target file (the version to reconstruct)
        target: PathBuf,

        /// Output patch file (defaults to <reference stem>_patch.bin)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Block size in bytes, a positive multiple of 8 up to 255
        /// (prompts interactively when omitted)
        #[arg(short, long)]
        block_size: Option<usize>,

        /// Verify the patch after creation by decoding and comparing
        #[arg(short, long)]
        verify: bool,

        /// Skip interactive prompts (block size defaults to 64)
        #[arg(short = 'y', long)]
        yes: bool,

        /// Overwrite output file if it exists
        #[arg(short, long)]
        force: bool,

        /// Suppress output except errors
        #[arg(short, long)]
        quiet: bool,
    },
    /// Apply a patch to a reference file to rebuild the target
    Decode {
        /// Reference file (the version the patch was built against)
        reference: PathBuf,

        /// Patch file
        patch: PathBuf,

        /// Output file (defaults to rebuilt.bin)
        output: Option<PathBuf>,

        /// Skip memory warning prompt
        #[arg(short = 'y', long)]
        yes: bool,

        /// Overwrite output file if it exists
        #[arg(short, long)]
        force: bool,

        /// Suppress output except errors
        #[arg(short, long)]
        quiet: bool,
    },
}

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PATCH_FAILED: i32 = 2;
const EXIT_OUT_OF_MEMORY: i32 = 4;
const EXIT_USER_CANCELLED: i32 = 5;

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Encode {
            reference,
            target,
            output,
            block_size,
            verify,
            yes,
            force,
            quiet,
        } => handle_encode(
            &reference, &target, output, block_size, verify, yes, force, quiet,
        ),
        Commands::Decode {
            reference,
            patch,
            output,
            yes,
            force,
            quiet,
        } => handle_decode(&reference, &patch, output, yes, force, quiet),
    };

    match result {
        Ok(()) => process::exit(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("{} {}", "Error:".bright_red().bold(), e);

            // Determine exit code based on error message
            let msg = e.to_string();
            let exit_code = if msg.contains("Insufficient memory") {
                EXIT_OUT_OF_MEMORY
            } else if msg.contains("ancelled") {
                EXIT_USER_CANCELLED
            } else if msg.contains("Encode failed")
                || msg.contains("Patch apply failed")
                || msg.contains("Verification failed")
            {
                EXIT_PATCH_FAILED
            } else {
                EXIT_ERROR
            };

            process::exit(exit_code);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_encode(
    reference_path: &Path,
    target_path: &Path,
    output: Option<PathBuf>,
    block_size: Option<usize>,
    verify: bool,
    yes: bool,
    force: bool,
    quiet: bool,
) -> Result<()> {
    for path in [reference_path, target_path] {
        if !path.exists() {
            bail!("File not found: {}", path.display());
        }
    }

    let output_path = output.unwrap_or_else(|| default_patch_path(reference_path));
    if output_path.exists() && !force {
        bail!(
            "Output file already exists: {}\n   Use --force to overwrite",
            output_path.display()
        );
    }

    let reference_size = fs::metadata(reference_path)
        .context("Failed to read reference file metadata")?
        .len();
    let target_size = fs::metadata(target_path)
        .context("Failed to read target file metadata")?
        .len();

    if !quiet {
        println!(
            "{} Reference: {}, Target: {}",
            "File sizes:".bright_cyan(),
            format_bytes(reference_size),
            format_bytes(target_size)
        );
    }

    let block_size = resolve_block_size(block_size, yes || quiet)?;

    // Memory check
    let required = estimate_encode_memory(reference_size, target_size);
    check_memory(required, yes, quiet)?;

    // Read files
    if !quiet {
        let total_steps = if verify { 4 } else { 3 };
        println!(
            "{} Reading files...",
            format!("Step 1/{}:", total_steps).bright_cyan()
        );
    }

    let reference_data = fs::read(reference_path)
        .with_context(|| format!("Failed to read reference file: {}", reference_path.display()))?;
    let target_data = fs::read(target_path)
        .with_context(|| format!("Failed to read target file: {}", target_path.display()))?;

    // Encode
    if !quiet {
        let total_steps = if verify { 4 } else { 3 };
        println!(
            "{} Building patch (block size {} B)...",
            format!("Step 2/{}:", total_steps).bright_cyan(),
            block_size
        );
    }

    let start = Instant::now();
    let patch = blockpatch::encode(&target_data, &reference_data, block_size)
        .map_err(|e| anyhow::anyhow!("Encode failed: {}", e))?;
    let encode_time = start.elapsed();

    // Write output
    if !quiet {
        let total_steps = if verify { 4 } else { 3 };
        println!(
            "{} Writing output...",
            format!("Step 3/{}:", total_steps).bright_cyan()
        );
    }

    fs::write(&output_path, &patch)
        .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;

    // Verify if requested
    let verify_time = if verify {
        if !quiet {
            println!("{} Verifying patch...", "Step 4/4:".bright_cyan());
        }

        let verify_start = Instant::now();
        let rebuilt = blockpatch::decode(&patch, &reference_data)
            .map_err(|e| anyhow::anyhow!("Verification failed: {}", e))?;

        if rebuilt != target_data {
            bail!(
                "Verification failed: reconstructed output does not match the target file\n   \
                 Expected {} bytes, got {} bytes",
                target_data.len(),
                rebuilt.len()
            );
        }

        Some(verify_start.elapsed())
    } else {
        None
    };

    // Success message
    if !quiet {
        println!();
        println!(
            "{} Created {} ({}, {:.1}% of target)",
            "Success:".bright_green().bold(),
            output_path.display(),
            format_bytes(patch.len() as u64),
            (patch.len() as f64 / target_size.max(1) as f64) * 100.0
        );
        print!("   Encoding took {}", format_duration(encode_time));
        if let Some(time) = verify_time {
            print!(", verification took {}", format_duration(time));
        }
        println!();
    }

    Ok(())
}

fn handle_decode(
    reference_path: &Path,
    patch_path: &Path,
    output: Option<PathBuf>,
    yes: bool,
    force: bool,
    quiet: bool,
) -> Result<()> {
    for path in [reference_path, patch_path] {
        if !path.exists() {
            bail!("File not found: {}", path.display());
        }
    }

    let output_path = output.unwrap_or_else(|| PathBuf::from("rebuilt.bin"));
    if output_path.exists() && !force {
        bail!(
            "Output file already exists: {}\n   Use --force to overwrite",
            output_path.display()
        );
    }

    let reference_size = fs::metadata(reference_path)
        .context("Failed to read reference file metadata")?
        .len();
    let patch_size = fs::metadata(patch_path)
        .context("Failed to read patch file metadata")?
        .len();

    if !quiet {
        println!(
            "{} Reference: {}, Patch: {}",
            "File sizes:".bright_cyan(),
            format_bytes(reference_size),
            format_bytes(patch_size)
        );
    }

    // Memory check
    let required = estimate_decode_memory(reference_size, patch_size);
    check_memory(required, yes, quiet)?;

    // Read files
    if !quiet {
        println!("{} Reading files...", "Step 1/3:".bright_cyan());
    }

    let reference_data = fs::read(reference_path)
        .with_context(|| format!("Failed to read reference file: {}", reference_path.display()))?;
    let patch_data = fs::read(patch_path)
        .with_context(|| format!("Failed to read patch file: {}", patch_path.display()))?;

    // Apply
    if !quiet {
        println!("{} Applying patch...", "Step 2/3:".bright_cyan());
    }

    let start = Instant::now();
    let rebuilt = blockpatch::decode(&patch_data, &reference_data)
        .map_err(|e| anyhow::anyhow!("Patch apply failed: {}", e))?;
    let decode_time = start.elapsed();

    // Write output
    if !quiet {
        println!("{} Writing output...", "Step 3/3:".bright_cyan());
    }

    fs::write(&output_path, &rebuilt)
        .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;

    // Success message
    if !quiet {
        println!();
        println!(
            "{} Created {} ({})",
            "Success:".bright_green().bold(),
            output_path.display(),
            format_bytes(rebuilt.len() as u64)
        );
        println!("   Decoding took {}", format_duration(decode_time));
    }

    Ok(())
}

// ============================================================================
// Block size selection
// ============================================================================

fn resolve_block_size(requested: Option<usize>, no_prompt: bool) -> Result<usize> {
    if let Some(size) = requested {
        if size == 0 || size % 8 != 0 || size > 255 {
            bail!(
                "Invalid block size: {} (must be a positive multiple of 8, at most 255)",
                size
            );
        }
        return Ok(size);
    }

    if no_prompt {
        return Ok(blockpatch::DEFAULT_BLOCK_SIZE);
    }

    loop {
        eprint!(
            "Block size in bytes (multiple of 8) [{}]: ",
            blockpatch::DEFAULT_BLOCK_SIZE
        );
        io::stderr().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        if input.is_empty() {
            return Ok(blockpatch::DEFAULT_BLOCK_SIZE);
        }
        match input.parse::<usize>() {
            Ok(size) if size > 0 && size % 8 == 0 && size <= 255 => return Ok(size),
            Ok(_) => eprintln!("  Must be a positive multiple of 8, at most 255."),
            Err(_) => eprintln!("  Please enter a whole number."),
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

fn estimate_encode_memory(reference_size: u64, target_size: u64) -> u64 {
    // reference + target + patch (worst case ≈ target) + block index
    reference_size + target_size + target_size + reference_size * 2
}

fn estimate_decode_memory(reference_size: u64, patch_size: u64) -> u64 {
    // reference + patch + output (estimate as reference) + 20% overhead
    reference_size + patch_size + reference_size + (reference_size / 5)
}

fn check_memory(required: u64, skip_prompt: bool, quiet: bool) -> Result<()> {
    let mut sys = System::new_all();
    sys.refresh_memory();

    let available = sys.available_memory();
    let total = sys.total_memory();

    // Check if totally insufficient (even if all apps closed)
    if required > total {
        bail!(
            "Insufficient memory\n   Required: ~{}\n   Total RAM: {}\n\n   \
             These files cannot be processed on this system.",
            format_bytes(required),
            format_bytes(total)
        );
    }

    let usage_pct = (required as f64 / available as f64) * 100.0;

    if !quiet && usage_pct < 80.0 {
        println!(
            "{} ~{} required, {} available",
            "Memory:".bright_cyan(),
            format_bytes(required),
            format_bytes(available)
        );
    }

    if usage_pct >= 80.0 {
        eprintln!();
        eprintln!(
            "{} This operation requires ~{}",
            "Memory warning:".bright_yellow().bold(),
            format_bytes(required)
        );
        eprintln!(
            "   Available: {} free ({} total)",
            format_bytes(available),
            format_bytes(total)
        );
        eprintln!(
            "   Loading these files will use {:.0}% of available memory.",
            usage_pct
        );
        eprintln!();

        if skip_prompt {
            eprintln!("   Continuing anyway (--yes flag)");
            eprintln!();
        } else {
            eprint!("   Continue? [y/N]: ");
            io::stderr().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                bail!("Cancelled by user");
            }
            eprintln!();
        }
    }

    Ok(())
}

// ============================================================================
// Utilities
// ============================================================================

fn default_patch_path(reference: &Path) -> PathBuf {
    let stem = reference
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "reference".to_string());
    reference.with_file_name(format!("{stem}_patch.bin"))
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f64();

    if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else if secs >= 0.001 {
        format!("{:.1}ms", secs * 1_000.0)
    } else {
        format!("{}µs", duration.as_micros())
    }
}
