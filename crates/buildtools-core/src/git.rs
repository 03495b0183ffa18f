//! Git working-copy management.
//!
//! All operations shell out to `git` against a local working copy. Failures
//! carry git's stderr and are never retried.

use std::path::{Path, PathBuf};
use std::process::Output;

use tokio::process::Command;
use tracing::{debug, info};

use crate::domain::error::{BuildError, Result};
use crate::domain::manifest::DEFAULT_REF;

/// Identity used for snapshot commits when the user has none configured.
pub const FALLBACK_USER_NAME: &str = "BuildTools";
pub const FALLBACK_USER_EMAIL: &str = "unconfigured@null.spigotmc.org";

/// Branch holding the snapshot commit of the patched implementation tree.
pub const SNAPSHOT_BRANCH: &str = "patched";

const UPSTREAM_MASTER: &str = "origin/master";

/// Where HEAD points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadState {
    /// HEAD is a symbolic ref to a local branch.
    Branch(String),
    /// HEAD is detached at a commit.
    Detached(String),
}

impl HeadState {
    /// Argument that checks this state back out.
    pub fn checkout_target(&self) -> &str {
        match self {
            HeadState::Branch(name) => name,
            HeadState::Detached(sha) => sha,
        }
    }
}

impl std::fmt::Display for HeadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeadState::Branch(name) => write!(f, "branch {name}"),
            HeadState::Detached(sha) => write!(f, "detached at {sha}"),
        }
    }
}

/// Handle to a local working copy.
#[derive(Debug, Clone)]
pub struct Repository {
    path: PathBuf,
}

impl Repository {
    /// Open an existing working copy.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let repo = Repository { path: path.into() };
        repo.git(&["rev-parse", "--git-dir"]).await.map_err(|_| {
            BuildError::Git(format!("{} is not a git repository", repo.path.display()))
        })?;
        Ok(repo)
    }

    /// Clone `url` into `path` unless the path already exists, in which case
    /// the existing working copy is reused as-is.
    pub async fn open_or_clone(url: &str, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            return Self::open(path).await;
        }

        info!(url, target = %path.display(), "Starting clone");
        let target = path.to_string_lossy().to_string();
        run_git(None, &["clone", url, &target]).await?;

        let repo = Repository { path };
        let head = repo.head_sha().await?;
        info!(url, target = %repo.path.display(), head = %head, "Cloned git repository");
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bring the working copy to `reference`.
    ///
    /// Resets to `origin/master` and fetches first so the local master
    /// tracking ref is current even when `reference` is a tag or commit.
    /// A checkout left on [`SNAPSHOT_BRANCH`] is moved back to master first.
    pub async fn sync(&self, reference: &str) -> Result<()> {
        info!(repo = %self.path.display(), "Pulling updates");

        if self.is_on_branch(SNAPSHOT_BRANCH).await? {
            info!(
                repo = %self.path.display(),
                branch = SNAPSHOT_BRANCH,
                "Leaving stale snapshot branch"
            );
            self.git(&["checkout", "--force", DEFAULT_REF]).await?;
        }

        self.reset_hard(UPSTREAM_MASTER).await?;
        self.git(&["fetch"]).await?;
        info!(repo = %self.path.display(), "Successfully fetched updates");

        self.reset_hard(reference).await?;
        if reference == DEFAULT_REF {
            self.reset_hard(UPSTREAM_MASTER).await?;
        }

        info!(repo = %self.path.display(), reference, "Checked out");
        Ok(())
    }

    pub async fn reset_hard(&self, reference: &str) -> Result<()> {
        self.git(&["reset", "--hard", reference]).await.map(|_| ())
    }

    pub async fn head_sha(&self) -> Result<String> {
        let sha = self.git(&["rev-parse", "HEAD"]).await?;
        if sha.is_empty() {
            return Err(BuildError::Git(
                "git rev-parse HEAD returned empty output".to_string(),
            ));
        }
        Ok(sha)
    }

    pub async fn head_state(&self) -> Result<HeadState> {
        let output = self
            .git_raw(&["symbolic-ref", "--quiet", "--short", "HEAD"])
            .await?;
        if output.status.success() {
            let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Ok(HeadState::Branch(name));
        }
        Ok(HeadState::Detached(self.head_sha().await?))
    }

    pub async fn is_on_branch(&self, name: &str) -> Result<bool> {
        Ok(matches!(self.head_state().await?, HeadState::Branch(b) if b == name))
    }

    /// Ids of the most recent commits touching any of `paths`, newest first.
    pub async fn commits_touching(&self, paths: &[String], max_count: usize) -> Result<Vec<String>> {
        let limit = format!("--max-count={max_count}");
        let mut args = vec!["log", limit.as_str(), "--format=%H", "--"];
        args.extend(paths.iter().map(String::as_str));

        let stdout = self.git(&args).await?;
        Ok(stdout.lines().map(str::to_string).collect())
    }

    pub async fn branch_exists(&self, name: &str) -> Result<bool> {
        let reference = format!("refs/heads/{name}");
        let output = self
            .git_raw(&["rev-parse", "--verify", "--quiet", &reference])
            .await?;
        Ok(output.status.success())
    }

    /// Force-delete a local branch; a missing branch is not an error.
    pub async fn delete_branch(&self, name: &str) -> Result<()> {
        if self.branch_exists(name).await? {
            self.git(&["branch", "-D", name]).await?;
        }
        Ok(())
    }

    /// Create (or reset) `name` at HEAD and switch to it.
    pub async fn checkout_new_branch(&self, name: &str) -> Result<()> {
        self.git(&["checkout", "-B", name]).await.map(|_| ())
    }

    pub async fn checkout(&self, reference: &str) -> Result<()> {
        self.git(&["checkout", reference]).await.map(|_| ())
    }

    /// Detach HEAD at its current commit.
    pub async fn detach(&self) -> Result<()> {
        self.git(&["checkout", "--detach"]).await.map(|_| ())
    }

    /// Stage `pathspec`, including paths matched by ignore rules.
    pub async fn add_force(&self, pathspec: &str) -> Result<()> {
        self.git(&["add", "--force", "--", pathspec]).await.map(|_| ())
    }

    /// Commit whatever is staged and return the new commit id.
    pub async fn commit(&self, message: &str) -> Result<String> {
        let mut args: Vec<String> = Vec::new();
        if !self.has_identity().await? {
            debug!("Git identity not set, using fallback");
            args.extend([
                "-c".to_string(),
                format!("user.name={FALLBACK_USER_NAME}"),
                "-c".to_string(),
                format!("user.email={FALLBACK_USER_EMAIL}"),
            ]);
        }
        args.extend([
            "commit".to_string(),
            "--allow-empty".to_string(),
            "--quiet".to_string(),
            "-m".to_string(),
            message.to_string(),
        ]);

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.git(&args).await?;
        self.head_sha().await
    }

    /// Whether both `user.name` and `user.email` resolve for this repository.
    pub async fn has_identity(&self) -> Result<bool> {
        for key in ["user.name", "user.email"] {
            let output = self.git_raw(&["config", key]).await?;
            if !output.status.success() || output.stdout.iter().all(u8::is_ascii_whitespace) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// `git status --porcelain` output; empty means clean.
    pub async fn status_porcelain(&self) -> Result<String> {
        self.git(&["status", "--porcelain"]).await
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        run_git(Some(&self.path), args).await
    }

    async fn git_raw(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .output()
            .await
            .map_err(|e| BuildError::Git(format!("failed to run git: {e}")))
    }
}

/// Check that `git` can be executed.
pub async fn git_version() -> Result<String> {
    run_git(None, &["--version"]).await
}

/// Run git and return trimmed stdout, failing with stderr on non-zero exit.
async fn run_git(cwd: Option<&Path>, args: &[&str]) -> Result<String> {
    let mut command = Command::new("git");
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let output = command
        .output()
        .await
        .map_err(|e| BuildError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BuildError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        debug!(git = args.first().copied().unwrap_or_default(), "{line}");
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
