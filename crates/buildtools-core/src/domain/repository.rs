//! The four managed repositories.

use serde::{Deserialize, Serialize};

/// Role of a managed working copy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryKind {
    /// Mappings, access transforms and the remap/decompile tools.
    MappingData,

    /// Public API sources.
    Api,

    /// Server implementation sources and the NMS patch stack.
    Implementation,

    /// Distribution sources layered on top of API and implementation.
    Distribution,
}

impl RepositoryKind {
    /// Sync order.
    pub const ALL: [RepositoryKind; 4] = [
        RepositoryKind::MappingData,
        RepositoryKind::Api,
        RepositoryKind::Implementation,
        RepositoryKind::Distribution,
    ];

    /// Directory name beside the working directory.
    pub fn dir_name(&self) -> &'static str {
        match self {
            RepositoryKind::MappingData => "BuildData",
            RepositoryKind::Api => "Bukkit",
            RepositoryKind::Implementation => "CraftBukkit",
            RepositoryKind::Distribution => "Spigot",
        }
    }

    /// Upstream clone URL.
    pub fn default_url(&self) -> &'static str {
        match self {
            RepositoryKind::MappingData => "https://hub.spigotmc.org/stash/scm/spigot/builddata.git",
            RepositoryKind::Api => "https://hub.spigotmc.org/stash/scm/spigot/bukkit.git",
            RepositoryKind::Implementation => {
                "https://hub.spigotmc.org/stash/scm/spigot/craftbukkit.git"
            }
            RepositoryKind::Distribution => "https://hub.spigotmc.org/stash/scm/spigot/spigot.git",
        }
    }

    /// Environment variable that overrides [`default_url`](Self::default_url).
    pub fn url_env_var(&self) -> &'static str {
        match self {
            RepositoryKind::MappingData => "BUILDTOOLS_BUILDDATA_URL",
            RepositoryKind::Api => "BUILDTOOLS_BUKKIT_URL",
            RepositoryKind::Implementation => "BUILDTOOLS_CRAFTBUKKIT_URL",
            RepositoryKind::Distribution => "BUILDTOOLS_SPIGOT_URL",
        }
    }
}

impl std::fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_order_starts_with_mapping_data() {
        assert_eq!(RepositoryKind::ALL[0], RepositoryKind::MappingData);
        assert_eq!(RepositoryKind::ALL[3], RepositoryKind::Distribution);
    }

    #[test]
    fn test_dir_names_are_distinct() {
        let mut names: Vec<_> = RepositoryKind::ALL.iter().map(|k| k.dir_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 4);
    }
}
