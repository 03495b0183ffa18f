//! Content-derived cache keys for the remap/decompile stages.
//!
//! The key is the last [`CACHE_KEY_LEN`] hex characters of the MD5 digest of
//! the ids of the latest commit touching the governed mapping files. Same
//! commit, same key; any new commit on those files yields a new key, so
//! cached outputs never need explicit invalidation.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::error::{BuildError, Result};
use crate::git::Repository;

/// Number of hex characters kept from the digest.
pub const CACHE_KEY_LEN: usize = 8;

/// Short fingerprint used as a path qualifier for cached pipeline outputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Fold commit ids into a key. Returns `None` when there are no ids.
    pub fn from_commit_ids<I, S>(ids: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hasher = Md5::new();
        let mut seen = false;
        for id in ids {
            hasher.update(id.as_ref().as_bytes());
            seen = true;
        }
        if !seen {
            return None;
        }

        let hex = hex::encode(hasher.finalize());
        Some(CacheKey(hex[hex.len() - CACHE_KEY_LEN..].to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the cache key from the mapping-data repository.
///
/// Runs one combined history query over all governed paths, limited to the
/// single most recent commit. No history is a fatal configuration error.
pub async fn derive_cache_key(repo: &Repository, governed_paths: &[String]) -> Result<CacheKey> {
    let commits = repo.commits_touching(governed_paths, 1).await?;
    let key = CacheKey::from_commit_ids(&commits).ok_or_else(|| BuildError::NoMappingHistory {
        repo: repo.path().to_path_buf(),
        paths: governed_paths.to_vec(),
    })?;

    info!(cache_key = %key, commit = %commits[0], "Derived mappings cache key");
    Ok(key)
}
