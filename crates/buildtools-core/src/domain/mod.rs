//! Domain models for BuildTools.
//!
//! - `VersionManifest`: pinned refs for one build
//! - `RepositoryKind`: the four managed working copies
//! - `VersionInfo`: which mapping files apply to the server version
//! - `CacheKey`: fingerprint gating reuse of remap/decompile outputs

pub mod cache_key;
pub mod error;
pub mod manifest;
pub mod repository;
pub mod version_info;

// Re-export main types and errors
pub use cache_key::{derive_cache_key, CacheKey, CACHE_KEY_LEN};
pub use error::{BuildError, Result};
pub use manifest::{ManifestRefs, VersionManifest, DEFAULT_REF, TOOLS_VERSION_UNSET};
pub use repository::RepositoryKind;
pub use version_info::{VersionInfo, MAPPINGS_DIR, VERSION_INFO_FILE};
