//! Top-level build driver.
//!
//! The build is a linear state machine:
//! `Start -> ConfigParsed -> ToolchainReady -> ReposSynced -> ArtifactMapped
//! -> Decompiled -> Patched -> Compiled -> ArtifactsCollected -> Done`,
//! with `Failed` reachable from any state. Each state is entered once; a
//! failed build is retried by running again, and the on-disk outputs of
//! completed stages make the rerun resume where it stopped.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use buildtools_core::{
    derive_cache_key, git_version, BuildError, CacheKey, Fetcher, HttpFetcher, PatchEngine,
    PatchLayout, PatchReport, RepositoryKind, RepositorySet, VersionInfo, VersionManifest,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::collect::{collect_artifacts, CollectedArtifact};
use crate::compile::{install_mapped_jar, Compiler};
use crate::config::BuildConfig;
use crate::pipeline::{ArtifactPipeline, StageRecord};
use crate::runner::{ProcessRunner, ToolCommand, ToolRunner};
use crate::toolchain::MavenHome;

/// Build progress.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    Start,
    ConfigParsed,
    ToolchainReady,
    ReposSynced,
    ArtifactMapped,
    Decompiled,
    Patched,
    Compiled,
    ArtifactsCollected,
    Done,
    Failed,
}

impl BuildState {
    /// The only state reachable on success, if any.
    pub fn next(self) -> Option<BuildState> {
        use BuildState::*;
        match self {
            Start => Some(ConfigParsed),
            ConfigParsed => Some(ToolchainReady),
            ToolchainReady => Some(ReposSynced),
            ReposSynced => Some(ArtifactMapped),
            ArtifactMapped => Some(Decompiled),
            Decompiled => Some(Patched),
            Patched => Some(Compiled),
            Compiled => Some(ArtifactsCollected),
            ArtifactsCollected => Some(Done),
            Done | Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BuildState::Done | BuildState::Failed)
    }
}

impl std::fmt::Display for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BuildState::Start => "START",
            BuildState::ConfigParsed => "CONFIG_PARSED",
            BuildState::ToolchainReady => "TOOLCHAIN_READY",
            BuildState::ReposSynced => "REPOS_SYNCED",
            BuildState::ArtifactMapped => "ARTIFACT_MAPPED",
            BuildState::Decompiled => "DECOMPILED",
            BuildState::Patched => "PATCHED",
            BuildState::Compiled => "COMPILED",
            BuildState::ArtifactsCollected => "ARTIFACTS_COLLECTED",
            BuildState::Done => "DONE",
            BuildState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Tracks the current state and rejects anything but the next one.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: BuildState,
    history: Vec<BuildState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self {
            state: BuildState::Start,
            history: vec![BuildState::Start],
        }
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// States entered so far, in order.
    pub fn history(&self) -> &[BuildState] {
        &self.history
    }

    pub fn advance(&mut self, to: BuildState) -> anyhow::Result<()> {
        if self.state.next() != Some(to) {
            anyhow::bail!("invalid build transition {} -> {to}", self.state);
        }
        info!(from = %self.state, to = %to, "Build state");
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    /// Enter `Failed`. No-op once terminal.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = BuildState::Failed;
            self.history.push(BuildState::Failed);
        }
    }
}

/// Context attached to the error of a failed build.
///
/// `states` ends with [`BuildState::Failed`]; `reached` is the last state
/// entered before the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailed {
    pub reached: BuildState,
    pub states: Vec<BuildState>,
}

impl std::fmt::Display for BuildFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "build failed after {}", self.reached)
    }
}

/// Summary of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub manifest: VersionManifest,
    pub minecraft_version: String,
    pub cache_key: CacheKey,
    pub stages: Vec<StageRecord>,
    pub patches: PatchReport,
    pub artifacts: Vec<CollectedArtifact>,
    pub states: Vec<BuildState>,
    pub duration_ms: u64,
}

/// Check the execution environment before anything is touched: a usable
/// `bash` and a `git` on the path.
pub async fn preflight(runner: &dyn ToolRunner, root: &Path) -> anyhow::Result<()> {
    let shell = ToolCommand::new("bash", root).args(["-c", "exit"]);
    let usable = matches!(runner.run(&shell).await, Ok(run) if run.passed());
    if !usable {
        return Err(BuildError::Environment(
            "must run through bash; bash -c exit did not succeed".to_string(),
        )
        .into());
    }

    let version = git_version()
        .await
        .map_err(|e| BuildError::Environment(format!("git is required: {e}")))?;
    info!(git = %version, "Environment ok");
    Ok(())
}

/// The development manifest with `dev`/`dont-update`, otherwise the
/// remote descriptor.
pub async fn resolve_manifest(
    config: &BuildConfig,
    fetcher: &dyn Fetcher,
) -> anyhow::Result<VersionManifest> {
    if !config.fetch_manifest() {
        info!("Using development manifest");
        return Ok(VersionManifest::development());
    }

    info!(url = %config.remote.manifest_url, "Checking for latest version");
    let json = fetcher
        .get_text(&config.remote.manifest_url)
        .await
        .context("could not get latest version")?;
    info!("Found latest version");
    info!("{}", json.trim());

    let manifest = VersionManifest::from_json(&json)?;
    info!(
        name = %manifest.name,
        description = %manifest.description,
        tools_version = manifest.tools_version,
        "Resolved manifest"
    );
    Ok(manifest)
}

/// Drives a complete build.
pub struct BuildOrchestrator {
    config: BuildConfig,
    runner: Arc<dyn ToolRunner>,
    fetcher: Arc<dyn Fetcher>,
}

impl BuildOrchestrator {
    pub fn new(config: BuildConfig, runner: Arc<dyn ToolRunner>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            runner,
            fetcher,
        }
    }

    /// Orchestrator with real processes and an HTTP client built from the
    /// configuration.
    pub fn from_config(config: BuildConfig) -> anyhow::Result<Self> {
        let fetcher = HttpFetcher::new(&config.http).context("failed to build HTTP client")?;
        Ok(Self::new(config, Arc::new(ProcessRunner::new()), Arc::new(fetcher)))
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Run the build to `Done`, or stop at the first failure. A failed
    /// build's error carries a [`BuildFailed`] context.
    pub async fn run(&self) -> anyhow::Result<BuildReport> {
        let mut machine = StateMachine::new();
        match self.drive(&mut machine).await {
            Ok(report) => Ok(report),
            Err(err) => {
                let reached = machine.state();
                machine.fail();
                error!(state = %reached, "Build failed");
                Err(err.context(BuildFailed {
                    reached,
                    states: machine.history().to_vec(),
                }))
            }
        }
    }

    async fn drive(&self, machine: &mut StateMachine) -> anyhow::Result<BuildReport> {
        let start = Instant::now();
        let config = &self.config;
        let root = config.root();
        let flags = config.flags;
        info!(root = %root.display(), ?flags, "Starting build");

        fs::create_dir_all(root)
            .with_context(|| format!("failed to create {}", root.display()))?;
        preflight(self.runner.as_ref(), root).await?;
        let manifest = resolve_manifest(config, self.fetcher.as_ref()).await?;
        machine.advance(BuildState::ConfigParsed)?;

        let repos = RepositorySet::open_or_clone(root, |kind| {
            config.remote.repository_url(kind).to_string()
        })
        .await
        .context("failed to prepare repositories")?;
        let maven = MavenHome::ensure(root, &config.remote.maven_url, self.fetcher.as_ref()).await?;
        machine.advance(BuildState::ToolchainReady)?;

        if config.sync_repositories() {
            repos
                .sync(&manifest)
                .await
                .context("failed to sync repositories")?;
        } else {
            info!("Not updating repositories");
        }
        machine.advance(BuildState::ReposSynced)?;

        let build_data = repos.get(RepositoryKind::MappingData);
        let info = VersionInfo::load_or_default(build_data.path())?;
        let cache_key = derive_cache_key(build_data, &info.governed_paths()).await?;
        let minecraft_version = info.minecraft_version.clone();
        let pipeline = ArtifactPipeline::new(
            root,
            info,
            cache_key.clone(),
            config.remote.server_jar_url(&minecraft_version),
            self.runner.clone(),
            self.fetcher.clone(),
        );

        let mut stages = pipeline.map().await?;
        let mapped = pipeline.layout().mapped_jar(&cache_key);
        self.runner
            .run_checked(&install_mapped_jar(&maven, root, &mapped, &minecraft_version))
            .await
            .context("failed to install mapped jar")?;
        machine.advance(BuildState::ArtifactMapped)?;

        let decompiled = pipeline.decompile().await?;
        let vanilla = decompiled.output.clone();
        stages.push(decompiled);
        machine.advance(BuildState::Decompiled)?;

        info!("Applying CraftBukkit patches");
        let layout = PatchLayout::implementation(vanilla, pipeline.layout().dir());
        let patches = PatchEngine::new(repos.get(RepositoryKind::Implementation), layout)
            .restore_to(manifest.ref_for(RepositoryKind::Implementation))
            .apply()
            .await
            .context("failed to apply implementation patches")?;
        machine.advance(BuildState::Patched)?;

        Compiler::new(root, maven, flags, self.runner.clone())
            .run()
            .await?;
        machine.advance(BuildState::Compiled)?;

        let artifacts = collect_artifacts(root, &minecraft_version, !flags.skip_compile)?;
        machine.advance(BuildState::ArtifactsCollected)?;

        machine.advance(BuildState::Done)?;
        info!(
            artifacts = artifacts.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Build complete"
        );

        Ok(BuildReport {
            manifest,
            minecraft_version,
            cache_key,
            stages,
            patches,
            artifacts,
            states: machine.history().to_vec(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
