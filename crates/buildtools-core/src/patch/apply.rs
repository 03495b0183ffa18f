//! Applying a parsed diff to the lines of a file.

use super::error::PatchError;
use super::unified::{Hunk, UnifiedDiff};

/// Apply `diff` to `original` and return the patched lines.
///
/// Each hunk is matched at the position its header states, with exact
/// comparison of every context and removed line. Hunks must be ordered and
/// must not overlap. Any mismatch fails the whole file.
pub fn apply_diff(original: &[String], diff: &UnifiedDiff) -> Result<Vec<String>, PatchError> {
    let mut out = Vec::with_capacity(original.len());
    let mut cursor = 0usize;

    for (idx, hunk) in diff.hunks.iter().enumerate() {
        let number = idx + 1;
        let position = hunk_position(hunk);
        let end = position + hunk.old_len;

        if position < cursor {
            return Err(PatchError::OverlappingHunks { hunk: number });
        }
        if end > original.len() {
            return Err(PatchError::OutOfRange {
                hunk: number,
                start: hunk.old_start,
                end,
                len: original.len(),
            });
        }

        for (offset, expected) in hunk.pre_image().enumerate() {
            let found = &original[position + offset];
            if found != expected {
                return Err(PatchError::ContextMismatch {
                    hunk: number,
                    line: position + offset + 1,
                    expected: expected.to_string(),
                    found: found.clone(),
                });
            }
        }

        out.extend_from_slice(&original[cursor..position]);
        out.extend(hunk.post_image().map(str::to_string));
        cursor = end;
    }

    out.extend_from_slice(&original[cursor..]);
    Ok(out)
}

/// Zero-based index of the first original line a hunk covers. A pure
/// insertion (`-N,0`) goes after line N.
fn hunk_position(hunk: &Hunk) -> usize {
    if hunk.old_len == 0 {
        hunk.old_start
    } else {
        hunk.old_start.saturating_sub(1)
    }
}
