//! Errors raised while parsing or applying a unified diff.

/// Hunk numbers and line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("malformed hunk header at line {line}: {text}")]
    MalformedHunkHeader { line: usize, text: String },

    #[error("hunk {hunk} ends before its header counts are satisfied")]
    TruncatedHunk { hunk: usize },

    #[error("hunk {hunk} has more lines than its header declares (line {line})")]
    HunkOverflow { hunk: usize, line: usize },

    #[error("unexpected line {line} outside of a hunk: {text}")]
    UnexpectedLine { line: usize, text: String },

    #[error("hunk {hunk} targets lines {start}..{end} but the file has {len} lines")]
    OutOfRange {
        hunk: usize,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("hunk {hunk} overlaps the previous hunk")]
    OverlappingHunks { hunk: usize },

    #[error("hunk {hunk} context mismatch at line {line}: expected {expected:?}, found {found:?}")]
    ContextMismatch {
        hunk: usize,
        line: usize,
        expected: String,
        found: String,
    },
}
