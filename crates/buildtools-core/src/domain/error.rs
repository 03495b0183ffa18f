//! Domain-level error taxonomy for BuildTools.

use std::path::PathBuf;

use crate::patch::PatchError;

/// BuildTools domain errors.
///
/// Every variant is fatal for a build run; nothing in the core retries.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("unsupported environment: {0}")]
    Environment(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("no commits touch {paths:?} in {}", repo.display())]
    NoMappingHistory { repo: PathBuf, paths: Vec<String> },

    #[error("network error: {0}")]
    Network(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("error running command, exit status {exit_code}: {command}")]
    ToolFailed { command: String, exit_code: i32 },

    #[error("failed to apply {}: {source}", patch.display())]
    Patch {
        patch: PathBuf,
        #[source]
        source: PatchError,
    },

    #[error("vanilla source missing for patch target: {}", .0.display())]
    MissingVanilla(PathBuf),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for BuildError {
    fn from(err: reqwest::Error) -> Self {
        BuildError::Network(err.to_string())
    }
}

impl From<zip::result::ZipError> for BuildError {
    fn from(err: zip::result::ZipError) -> Self {
        BuildError::Archive(err.to_string())
    }
}

/// Result type for BuildTools domain operations.
pub type Result<T> = std::result::Result<T, BuildError>;
