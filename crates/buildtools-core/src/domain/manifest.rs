//! Version manifest: the pinned refs for one build.

use serde::{Deserialize, Serialize};

use crate::domain::error::{BuildError, Result};
use crate::domain::repository::RepositoryKind;

/// Ref used for every repository by the development manifest.
pub const DEFAULT_REF: &str = "master";

/// Sentinel for a manifest that does not declare `toolsVersion`.
pub const TOOLS_VERSION_UNSET: i32 = -1;

fn tools_version_unset() -> i32 {
    TOOLS_VERSION_UNSET
}

/// Declarative description of one build.
///
/// `name` and `description` are informational. `tools_version` is reserved:
/// it is parsed and logged but never drives a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionManifest {
    pub name: String,
    pub description: String,
    #[serde(rename = "toolsVersion", default = "tools_version_unset")]
    pub tools_version: i32,
    pub refs: ManifestRefs,
}

/// The four repository refs. All are required; the remote descriptor uses
/// the repository directory names as keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRefs {
    #[serde(rename = "BuildData")]
    pub mapping_data: String,
    #[serde(rename = "Bukkit")]
    pub api: String,
    #[serde(rename = "CraftBukkit")]
    pub implementation: String,
    #[serde(rename = "Spigot")]
    pub distribution: String,
}

impl VersionManifest {
    /// Manifest used when no remote descriptor is consulted.
    pub fn development() -> Self {
        Self {
            name: "Dev Build".to_string(),
            description: "Development".to_string(),
            tools_version: TOOLS_VERSION_UNSET,
            refs: ManifestRefs {
                mapping_data: DEFAULT_REF.to_string(),
                api: DEFAULT_REF.to_string(),
                implementation: DEFAULT_REF.to_string(),
                distribution: DEFAULT_REF.to_string(),
            },
        }
    }

    /// Parse and validate a remote descriptor.
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: VersionManifest = serde_json::from_str(json)
            .map_err(|e| BuildError::InvalidManifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reject blank refs. Missing refs are already rejected by parsing.
    pub fn validate(&self) -> Result<()> {
        for kind in RepositoryKind::ALL {
            if self.ref_for(kind).trim().is_empty() {
                return Err(BuildError::InvalidManifest(format!(
                    "ref for {} must not be empty",
                    kind.dir_name()
                )));
            }
        }
        Ok(())
    }

    /// Ref pinned for the given repository.
    pub fn ref_for(&self, kind: RepositoryKind) -> &str {
        match kind {
            RepositoryKind::MappingData => &self.refs.mapping_data,
            RepositoryKind::Api => &self.refs.api,
            RepositoryKind::Implementation => &self.refs.implementation,
            RepositoryKind::Distribution => &self.refs.distribution,
        }
    }

    pub fn has_tools_version(&self) -> bool {
        self.tools_version != TOOLS_VERSION_UNSET
    }
}
