//! Mapping-data descriptor (`BuildData/info.json`).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::error::Result;

/// File inside the mapping-data repository describing its mapping files.
pub const VERSION_INFO_FILE: &str = "info.json";

/// Directory inside the mapping-data repository holding the mapping files.
pub const MAPPINGS_DIR: &str = "mappings";

/// Which mapping files apply to which server version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub minecraft_version: String,
    pub access_transforms: String,
    pub class_mappings: String,
    pub member_mappings: String,
    pub package_mappings: String,
}

impl Default for VersionInfo {
    fn default() -> Self {
        VersionInfo {
            minecraft_version: "1.8".to_string(),
            access_transforms: "bukkit-1.8.at".to_string(),
            class_mappings: "bukkit-1.8-cl.csrg".to_string(),
            member_mappings: "bukkit-1.8-members.csrg".to_string(),
            package_mappings: "package.srg".to_string(),
        }
    }
}

impl VersionInfo {
    /// Read `info.json` from the mapping-data checkout, falling back to the
    /// built-in 1.8 layout when the file is absent.
    pub fn load_or_default(build_data: &Path) -> Result<Self> {
        let path = build_data.join(VERSION_INFO_FILE);
        if !path.exists() {
            debug!(path = %path.display(), "No version info, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let info: VersionInfo = serde_json::from_str(&content)?;
        info!(version = %info.minecraft_version, "Loaded version info");
        Ok(info)
    }

    /// Repository-relative path of a mapping file.
    pub fn mapping_path(&self, file: &str) -> String {
        format!("{MAPPINGS_DIR}/{file}")
    }

    /// Mapping files whose history governs the cache key.
    pub fn governed_paths(&self) -> Vec<String> {
        [
            &self.access_transforms,
            &self.class_mappings,
            &self.member_mappings,
            &self.package_mappings,
        ]
        .into_iter()
        .map(|file| self.mapping_path(file))
        .collect()
    }
}
