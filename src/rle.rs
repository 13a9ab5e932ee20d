//! Run-length coding for XOR delta payloads.
//!
//! A coded sequence is a series of segments, each starting with a one-byte
//! control:
//!
//! - `0x00..=0x7F`: literal run. Low 7 bits + 1 = count (1-128), followed by
//!   that many literal bytes.
//! - `0x80..=0xFF`: repeat run. Low 7 bits + 2 = count (2-129), followed by
//!   the single byte to repeat.
//!
//! XOR deltas between similar blocks are mostly zero bytes, which collapse
//! into repeat runs.

use crate::error::{PatchError, Result};

/// Longest literal segment (control byte 0x7F).
const MAX_LITERAL: usize = 128;

/// Longest repeat segment (control byte 0xFF).
const MAX_REPEAT: usize = 129;

/// Shortest run worth a repeat segment. A run of 2 costs two bytes either
/// way, so only runs of 3 or more shrink the output.
const MIN_RUN: usize = 3;

/// High bit marks a repeat segment.
const REPEAT_FLAG: u8 = 0x80;

/// Run-length encodes a byte sequence.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / MAX_LITERAL + 1);
    let mut lit_start = 0;
    let mut i = 0;

    while i < data.len() {
        let run = run_length(data, i);

        if run >= MIN_RUN {
            flush_literal(&mut out, &data[lit_start..i]);
            // A run longer than one segment re-enters the loop; a leftover
            // of one byte joins the following literal.
            let take = run.min(MAX_REPEAT);
            out.push(REPEAT_FLAG | (take - 2) as u8);
            out.push(data[i]);
            i += take;
            lit_start = i;
        } else {
            i += 1;
            if i - lit_start == MAX_LITERAL {
                flush_literal(&mut out, &data[lit_start..i]);
                lit_start = i;
            }
        }
    }

    flush_literal(&mut out, &data[lit_start..]);
    out
}

/// Length of the run of identical bytes starting at `start`.
fn run_length(data: &[u8], start: usize) -> usize {
    let byte = data[start];
    data[start..].iter().take_while(|&&b| b == byte).count()
}

fn flush_literal(out: &mut Vec<u8>, literal: &[u8]) {
    debug_assert!(literal.len() <= MAX_LITERAL);
    if !literal.is_empty() {
        out.push((literal.len() - 1) as u8);
        out.extend_from_slice(literal);
    }
}

/// Decodes a run-length coded sequence to exactly `expected_len` bytes.
pub fn decode(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    let mut i = 0;

    while i < data.len() {
        let ctrl = data[i];
        i += 1;

        if ctrl & REPEAT_FLAG != 0 {
            let count = (ctrl & 0x7F) as usize + 2;
            let byte = *data.get(i).ok_or_else(|| {
                PatchError::MalformedPatch("repeat segment missing its fill byte".to_string())
            })?;
            i += 1;
            if out.len() + count > expected_len {
                return Err(overrun(expected_len));
            }
            out.resize(out.len() + count, byte);
        } else {
            let count = ctrl as usize + 1;
            let end = i + count;
            if end > data.len() {
                return Err(PatchError::MalformedPatch(
                    "literal segment shorter than its count".to_string(),
                ));
            }
            if out.len() + count > expected_len {
                return Err(overrun(expected_len));
            }
            out.extend_from_slice(&data[i..end]);
            i = end;
        }
    }

    if out.len() != expected_len {
        return Err(PatchError::MalformedPatch(format!(
            "run-length data decoded to {} bytes, expected {}",
            out.len(),
            expected_len
        )));
    }

    Ok(out)
}

fn overrun(expected_len: usize) -> PatchError {
    PatchError::MalformedPatch(format!(
        "run-length data expands past {} bytes",
        expected_len
    ))
}
