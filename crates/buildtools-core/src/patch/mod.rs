//! Unified-diff patching of decompiled sources.

pub mod apply;
pub mod engine;
pub mod error;
pub mod unified;

pub use apply::apply_diff;
pub use engine::{PatchEngine, PatchFile, PatchLayout, PatchReport, SNAPSHOT_BRANCH};
pub use error::PatchError;
pub use unified::{ensure_header, Hunk, HunkLine, UnifiedDiff, HEADER_SCAN_LINES};
