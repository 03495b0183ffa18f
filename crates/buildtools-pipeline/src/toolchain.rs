//! Maven bootstrap and invocation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use buildtools_core::{extract_zip, in_current_dispatch, Fetcher};
use tracing::info;

use crate::runner::ToolCommand;

/// Directory name of the pinned Maven distribution.
pub const MAVEN_DIR: &str = "apache-maven-3.2.3";

/// Heap setting passed to Maven unless the caller set `MAVEN_OPTS`.
pub const DEFAULT_MAVEN_OPTS: &str = "-Xmx1024M";

/// A Maven installation beside the repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MavenHome {
    home: PathBuf,
}

impl MavenHome {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Use `root/apache-maven-3.2.3`, downloading and unpacking it first
    /// when missing. The archive is unpacked into a scratch directory and
    /// the distribution renamed into place.
    pub async fn ensure(root: &Path, url: &str, fetcher: &dyn Fetcher) -> anyhow::Result<Self> {
        let home = root.join(MAVEN_DIR);
        if home.exists() {
            info!(maven = %home.display(), "Using existing Maven");
            return Ok(Self::new(home));
        }

        info!("Maven does not exist, downloading");
        let scratch = tempfile::Builder::new()
            .prefix(".maven-")
            .tempdir_in(root)
            .with_context(|| format!("failed to create scratch directory in {}", root.display()))?;
        let archive = scratch.path().join("mvn.zip");
        fetcher
            .download(url, &archive)
            .await
            .with_context(|| format!("failed to download Maven from {url}"))?;

        let unpacked = scratch.path().join("unpacked");
        let (zip, target) = (archive.clone(), unpacked.clone());
        in_current_dispatch(move || extract_zip(&zip, &target, None))
            .await
            .context("extraction task failed")?
            .context("failed to unpack Maven")?;

        let extracted = unpacked.join(MAVEN_DIR);
        if !extracted.is_dir() {
            anyhow::bail!("Maven archive from {url} has no {MAVEN_DIR} directory");
        }
        fs::rename(&extracted, &home)
            .with_context(|| format!("failed to move Maven into {}", home.display()))?;
        info!(maven = %home.display(), "Maven ready");
        Ok(Self::new(home))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn launcher(&self) -> PathBuf {
        self.home.join("bin").join("mvn")
    }

    /// `sh <maven>/bin/mvn <args>` in `cwd`.
    pub fn command<I, S>(&self, cwd: impl Into<PathBuf>, args: I) -> ToolCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command = ToolCommand::new("sh", cwd)
            .arg(self.launcher().to_string_lossy().to_string())
            .args(args);
        match std::env::var_os("MAVEN_OPTS") {
            Some(_) => command,
            None => command.env("MAVEN_OPTS", DEFAULT_MAVEN_OPTS),
        }
    }
}
