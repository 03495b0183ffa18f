//! Applying the implementation repository's patch stack.
//!
//! Patches are always applied to the vanilla decompiled sources, never to a
//! previously patched file. The whole set is parsed and applied in memory
//! before the live tree is touched, so a bad patch leaves nothing behind.
//!
//! Once written, the patched tree is committed to a throw-away branch and
//! the repository is checked back out to the pinned ref (or to where HEAD
//! was, when no ref is pinned). The patched files are then moved back over
//! the checkout: git stays at the pinned ref while the files on disk are the
//! patched ones.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use super::apply::apply_diff;
use super::unified::{ensure_header, UnifiedDiff};
use crate::domain::error::{BuildError, Result};
use crate::fsutil;
use crate::git::Repository;

pub use crate::git::SNAPSHOT_BRANCH;

/// Extension of patch files, replaced by [`SOURCE_EXTENSION`] for targets.
pub const PATCH_EXTENSION: &str = ".patch";
pub const SOURCE_EXTENSION: &str = ".java";

/// Where patches, vanilla sources and the live tree live.
#[derive(Debug, Clone)]
pub struct PatchLayout {
    /// Patch directory, relative to the repository root.
    pub patches: PathBuf,
    /// Source root inside the repository (`src/main/java`).
    pub source_root: PathBuf,
    /// Package directory the patches target, relative to both source roots.
    pub package: PathBuf,
    /// Decompiled vanilla source root.
    pub vanilla: PathBuf,
    /// Scratch directory for backups and the held patched tree.
    pub work: PathBuf,
}

impl PatchLayout {
    /// Layout of the server implementation repository.
    pub fn implementation(vanilla: impl Into<PathBuf>, work: impl Into<PathBuf>) -> Self {
        PatchLayout {
            patches: PathBuf::from("nms-patches"),
            source_root: PathBuf::from("src/main/java"),
            package: PathBuf::from("net/minecraft/server"),
            vanilla: vanilla.into(),
            work: work.into(),
        }
    }

    /// Top-level directory of the patched package inside the source root.
    fn managed_root(&self) -> PathBuf {
        self.package
            .components()
            .next()
            .map(|c| PathBuf::from(c.as_os_str()))
            .unwrap_or_else(|| self.package.clone())
    }
}

/// A patch file and the source file it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchFile {
    pub path: PathBuf,
    /// Target relative to a source root.
    pub target: PathBuf,
}

impl PatchFile {
    /// `Foo.patch` and `Foo.java.patch` both target `<package>/Foo.java`.
    /// Returns `None` for files without the patch extension.
    pub fn from_path(path: PathBuf, package: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let stem = name.strip_suffix(PATCH_EXTENSION)?;
        let stem = stem.strip_suffix(SOURCE_EXTENSION).unwrap_or(stem);
        if stem.is_empty() {
            return None;
        }
        let target = package.join(format!("{stem}{SOURCE_EXTENSION}"));
        Some(PatchFile { path, target })
    }
}

/// Outcome of [`PatchEngine::apply`].
#[derive(Debug, Clone)]
pub struct PatchReport {
    /// Files written, relative to the source root.
    pub applied: Vec<PathBuf>,
    /// Where the previous patched tree was moved, if there was one.
    pub backup: Option<PathBuf>,
    /// Commit on [`SNAPSHOT_BRANCH`] holding the patched tree.
    pub snapshot: String,
    /// Patches that had no `+++` header.
    pub headerless: usize,
}

struct PlannedFile {
    target: PathBuf,
    lines: Vec<String>,
}

pub struct PatchEngine<'a> {
    repo: &'a Repository,
    layout: PatchLayout,
    pinned: Option<String>,
}

impl<'a> PatchEngine<'a> {
    pub fn new(repo: &'a Repository, layout: PatchLayout) -> Self {
        PatchEngine {
            repo,
            layout,
            pinned: None,
        }
    }

    /// Check `reference` out after the snapshot instead of the recorded HEAD.
    pub fn restore_to(mut self, reference: impl Into<String>) -> Self {
        self.pinned = Some(reference.into());
        self
    }

    pub fn layout(&self) -> &PatchLayout {
        &self.layout
    }

    fn source_root(&self) -> PathBuf {
        self.repo.path().join(&self.layout.source_root)
    }

    /// Live directory that is backed up, snapshotted and restored.
    pub fn managed_dir(&self) -> PathBuf {
        self.source_root().join(self.layout.managed_root())
    }

    /// Patch files in name order.
    pub fn collect_patches(&self) -> Result<Vec<PatchFile>> {
        let dir = self.repo.path().join(&self.layout.patches);
        let mut paths = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut patches = Vec::with_capacity(paths.len());
        for path in paths {
            match PatchFile::from_path(path.clone(), &self.layout.package) {
                Some(patch) => patches.push(patch),
                None => debug!(path = %path.display(), "Skipping non-patch file"),
            }
        }
        Ok(patches)
    }

    /// Parse every patch and apply it to its vanilla file, in memory.
    fn plan(&self, patches: &[PatchFile]) -> Result<(Vec<PlannedFile>, usize)> {
        let mut planned = Vec::with_capacity(patches.len());
        let mut headerless = 0;

        for patch in patches {
            let name = patch.path.file_name().unwrap_or_default().to_string_lossy();
            info!(patch = %name, "Patching");

            let mut lines = fsutil::read_lines(&patch.path)?;
            if ensure_header(&mut lines) {
                debug!(patch = %name, "No +++ header, synthesized one");
                headerless += 1;
            }

            let fail = |source| BuildError::Patch {
                patch: patch.path.clone(),
                source,
            };
            let diff = UnifiedDiff::parse(&lines).map_err(fail)?;

            let vanilla = self.layout.vanilla.join(&patch.target);
            if !vanilla.is_file() {
                return Err(BuildError::MissingVanilla(vanilla));
            }
            let original = fsutil::read_lines(&vanilla)?;
            let patched = apply_diff(&original, &diff).map_err(fail)?;

            planned.push(PlannedFile {
                target: patch.target.clone(),
                lines: patched,
            });
        }

        Ok((planned, headerless))
    }

    /// Move the live managed directory aside, if present.
    fn backup(&self) -> Result<Option<PathBuf>> {
        let live = self.managed_dir();
        if !live.exists() {
            return Ok(None);
        }

        let backup = self
            .layout
            .work
            .join(format!("nms.old.{}", Utc::now().timestamp_millis()));
        info!(backup = %backup.display(), "Backing up NMS dir");
        fsutil::move_dir(&live, &backup)?;
        Ok(Some(backup))
    }

    /// Where git goes back to after the snapshot commit.
    ///
    /// A checkout still on [`SNAPSHOT_BRANCH`] is left over from an
    /// interrupted run; HEAD is detached there so the branch can be replaced.
    async fn restore_target(&self) -> Result<String> {
        if self.repo.is_on_branch(SNAPSHOT_BRANCH).await? {
            info!(branch = SNAPSHOT_BRANCH, "Leaving stale snapshot branch");
            self.repo.detach().await?;
        }
        match &self.pinned {
            Some(reference) => Ok(reference.clone()),
            None => Ok(self.repo.head_state().await?.checkout_target().to_string()),
        }
    }

    /// Apply the full patch set and snapshot it.
    pub async fn apply(&self) -> Result<PatchReport> {
        let patches = self.collect_patches()?;
        let (planned, headerless) = self.plan(&patches)?;
        let restore = self.restore_target().await?;

        let backup = self.backup()?;
        let source_root = self.source_root();
        for file in &planned {
            fsutil::write_lines(&source_root.join(&file.target), &file.lines)?;
        }
        let applied: Vec<PathBuf> = planned.into_iter().map(|f| f.target).collect();
        info!(count = applied.len(), "Applied patches");

        let snapshot = self.snapshot_and_restore(&restore, !applied.is_empty()).await?;

        Ok(PatchReport {
            applied,
            backup,
            snapshot,
            headerless,
        })
    }

    /// Commit the patched tree to [`SNAPSHOT_BRANCH`], check out `restore`,
    /// and put the patched files back on disk.
    async fn snapshot_and_restore(&self, restore: &str, stage: bool) -> Result<String> {
        let live = self.managed_dir();
        let held = self.layout.work.join("nms.patched");
        if held.exists() {
            fs::remove_dir_all(&held)?;
        }
        fs::create_dir_all(&live)?;
        fsutil::copy_dir(&live, &held)?;

        self.repo.delete_branch(SNAPSHOT_BRANCH).await?;
        self.repo.checkout_new_branch(SNAPSHOT_BRANCH).await?;

        if stage {
            let pathspec = self.layout.source_root.join(self.layout.managed_root());
            self.repo
                .add_force(&pathspec.to_string_lossy().replace('\\', "/"))
                .await?;
        }
        let message = format!("Patched tree $ {}", Utc::now().to_rfc2822());
        let snapshot = self.repo.commit(&message).await?;
        info!(branch = SNAPSHOT_BRANCH, commit = %snapshot, "Snapshot committed");

        self.repo.checkout(restore).await?;
        info!(reference = restore, "Restored checkout");

        fsutil::replace_dir(&held, &live)?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_target_from_name() {
        let patch = PatchFile::from_path(
            PathBuf::from("nms-patches/EntityPlayer.patch"),
            Path::new("net/minecraft/server"),
        )
        .unwrap();
        assert_eq!(
            patch.target,
            PathBuf::from("net/minecraft/server/EntityPlayer.java")
        );
    }

    #[test]
    fn test_source_extension_not_doubled() {
        let patch =
            PatchFile::from_path(PathBuf::from("Foo.java.patch"), Path::new("net/minecraft/server"))
                .unwrap();
        assert_eq!(patch.target, PathBuf::from("net/minecraft/server/Foo.java"));
    }

    #[test]
    fn test_non_patch_file_skipped() {
        assert!(PatchFile::from_path(PathBuf::from("README.md"), Path::new("net")).is_none());
    }

    #[test]
    fn test_managed_root_is_first_package_component() {
        let layout = PatchLayout::implementation("/tmp/decompile-x", "/tmp/work");
        assert_eq!(layout.managed_root(), PathBuf::from("net"));
    }
}
