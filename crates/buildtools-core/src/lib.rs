//! BuildTools Core Library
//!
//! Domain types, git working-copy management, cache keys, the tolerant
//! unified-diff patch engine, and the I/O helpers shared by the pipeline.

pub mod archive;
pub mod domain;
pub mod fsutil;
pub mod git;
pub mod net;
pub mod patch;
pub mod repository_set;
pub mod telemetry;

pub use domain::{
    derive_cache_key, BuildError, CacheKey, ManifestRefs, RepositoryKind, Result, VersionInfo,
    VersionManifest, CACHE_KEY_LEN, DEFAULT_REF,
};

pub use archive::extract_zip;
pub use git::{git_version, HeadState, Repository};
pub use net::{Fetcher, HttpConfig, HttpFetcher};
pub use patch::{
    apply_diff, PatchEngine, PatchError, PatchFile, PatchLayout, PatchReport, UnifiedDiff,
    SNAPSHOT_BRANCH,
};
pub use repository_set::RepositorySet;
pub use telemetry::{in_current_dispatch, LogContext, LOG_FILE};

/// BuildTools version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
