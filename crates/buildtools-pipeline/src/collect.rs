//! Copying compiled jars to the working directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Where a build artifact is produced and what it is saved as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactSpec {
    /// Build output directory, relative to the root.
    pub dir: &'static str,
    /// File name prefix of the produced jar.
    pub prefix: &'static str,
}

impl ArtifactSpec {
    /// Canonical output name, e.g. `spigot-1.8.jar`.
    pub fn output_name(&self, minecraft_version: &str) -> String {
        format!("{}-{minecraft_version}.jar", self.prefix)
    }
}

pub const ARTIFACTS: [ArtifactSpec; 2] = [
    ArtifactSpec {
        dir: "CraftBukkit/target",
        prefix: "craftbukkit",
    },
    ArtifactSpec {
        dir: "Spigot/Spigot-Server/target",
        prefix: "spigot",
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedArtifact {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Jars in `dir` named `<prefix>*.jar`, in name order.
pub fn find_matches(dir: &Path, prefix: &str) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut matches = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(prefix) && name.ends_with(".jar") && entry.file_type()?.is_file() {
            matches.push(entry.path());
        }
    }
    matches.sort();
    Ok(matches)
}

/// Copy every artifact into `root` under its canonical name.
///
/// When `required` is set a missing artifact is an error; otherwise it is
/// logged and skipped.
pub fn collect_artifacts(
    root: &Path,
    minecraft_version: &str,
    required: bool,
) -> anyhow::Result<Vec<CollectedArtifact>> {
    let mut collected = Vec::new();

    for spec in ARTIFACTS {
        let dir = root.join(spec.dir);
        let matches = find_matches(&dir, spec.prefix)?;
        if matches.is_empty() {
            if required {
                anyhow::bail!("no {}*.jar found in {}", spec.prefix, dir.display());
            }
            warn!(dir = %dir.display(), prefix = spec.prefix, "No artifact to collect");
            continue;
        }

        let target = root.join(spec.output_name(minecraft_version));
        for source in matches {
            info!(source = %source.display(), target = %target.display(), "Copying artifact");
            fs::copy(&source, &target).with_context(|| {
                format!("failed to copy {} to {}", source.display(), target.display())
            })?;
            collected.push(CollectedArtifact {
                source,
                target: target.clone(),
            });
        }
    }

    Ok(collected)
}
