//! The cache-keyed remap and decompile pipeline.
//!
//! Every stage is gated on its output path: an existing output is reused,
//! a missing one is produced. Outputs are written beside their final path
//! with a `.part` suffix and renamed into place only once the stage
//! succeeds, so an interrupted run never leaves a file that passes the
//! existence check while being incomplete.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use buildtools_core::{extract_zip, fsutil, in_current_dispatch, CacheKey, Fetcher, VersionInfo};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::runner::ToolRunner;
use crate::stage::{PipelineStage, DECOMPILE_PREFIX};

/// Suffix of in-progress stage outputs.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Paths of the cache-keyed intermediates under `work/`.
#[derive(Debug, Clone)]
pub struct WorkLayout {
    dir: PathBuf,
}

impl WorkLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn vanilla_jar(&self, minecraft_version: &str) -> PathBuf {
        self.dir
            .join(format!("minecraft_server.{minecraft_version}.jar"))
    }

    /// Final mapped jar.
    pub fn mapped_jar(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("mapped.{key}.jar"))
    }

    pub fn class_mapped_jar(&self, key: &CacheKey) -> PathBuf {
        fsutil::with_suffix(&self.mapped_jar(key), "-cl")
    }

    pub fn member_mapped_jar(&self, key: &CacheKey) -> PathBuf {
        fsutil::with_suffix(&self.mapped_jar(key), "-m")
    }

    /// Decompiled vanilla source root.
    pub fn decompile_dir(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("decompile-{key}"))
    }
}

/// Whether a stage did work.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Ran,
    /// Output already existed.
    Cached,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: PipelineStage,
    pub outcome: StageOutcome,
    pub output: PathBuf,
}

/// Result of a complete pipeline execution.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub cache_key: CacheKey,

    /// Final mapped jar.
    pub mapped_jar: PathBuf,

    /// Decompiled vanilla source root.
    pub decompile_dir: PathBuf,

    /// Stages in execution order.
    pub stages: Vec<StageRecord>,

    pub duration_ms: u64,
}

impl PipelineResult {
    pub fn ran_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.outcome == StageOutcome::Ran)
            .count()
    }

    pub fn cached_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.outcome == StageOutcome::Cached)
            .count()
    }
}

/// Drives the vanilla jar through the remap passes and decompilation.
pub struct ArtifactPipeline {
    root: PathBuf,
    layout: WorkLayout,
    info: VersionInfo,
    cache_key: CacheKey,
    server_jar_url: String,
    runner: Arc<dyn ToolRunner>,
    fetcher: Arc<dyn Fetcher>,
}

impl ArtifactPipeline {
    /// Pipeline rooted at `root`, keeping intermediates in `root/work`.
    /// `server_jar_url` is fetched when the vanilla jar is missing.
    pub fn new(
        root: impl Into<PathBuf>,
        info: VersionInfo,
        cache_key: CacheKey,
        server_jar_url: impl Into<String>,
        runner: Arc<dyn ToolRunner>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let root = root.into();
        Self {
            layout: WorkLayout::new(root.join(crate::config::WORK_DIR)),
            root,
            info,
            cache_key,
            server_jar_url: server_jar_url.into(),
            runner,
            fetcher,
        }
    }

    pub fn layout(&self) -> &WorkLayout {
        &self.layout
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.cache_key
    }

    /// Run every stage.
    pub async fn run(&self) -> anyhow::Result<PipelineResult> {
        let start = Instant::now();
        info!(cache_key = %self.cache_key, "Starting artifact pipeline");

        let mut stages = self.map().await?;
        stages.push(self.decompile().await?);

        let result = PipelineResult {
            cache_key: self.cache_key.clone(),
            mapped_jar: self.layout.mapped_jar(&self.cache_key),
            decompile_dir: self.layout.decompile_dir(&self.cache_key),
            stages,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            ran = result.ran_count(),
            cached = result.cached_count(),
            "Artifact pipeline finished"
        );
        Ok(result)
    }

    /// Download the server jar and produce the final mapped jar.
    pub async fn map(&self) -> anyhow::Result<Vec<StageRecord>> {
        fs::create_dir_all(self.layout.dir())
            .with_context(|| format!("failed to create {}", self.layout.dir().display()))?;

        let key = &self.cache_key;
        let vanilla = self.layout.vanilla_jar(&self.info.minecraft_version);
        let class_mapped = self.layout.class_mapped_jar(key);
        let member_mapped = self.layout.member_mapped_jar(key);
        let mapped = self.layout.mapped_jar(key);

        let mut records = vec![self.download_server(&vanilla).await?];
        if mapped.exists() {
            info!(mapped = %mapped.display(), "Final mapped jar exists, skipping remap");
            for (stage, output) in [
                (PipelineStage::ClassRemap, class_mapped),
                (PipelineStage::MemberRemap, member_mapped),
                (PipelineStage::AccessTransform, mapped),
            ] {
                records.push(StageRecord {
                    stage,
                    outcome: StageOutcome::Cached,
                    output,
                });
            }
            return Ok(records);
        }

        records.push(
            self.remap(PipelineStage::ClassRemap, &vanilla, &class_mapped)
                .await?,
        );
        records.push(
            self.remap(PipelineStage::MemberRemap, &class_mapped, &member_mapped)
                .await?,
        );
        records.push(
            self.remap(PipelineStage::AccessTransform, &member_mapped, &mapped)
                .await?,
        );
        Ok(records)
    }

    /// Extract the server package from the mapped jar and decompile it.
    pub async fn decompile(&self) -> anyhow::Result<StageRecord> {
        let stage = PipelineStage::Decompile;
        let output = self.layout.decompile_dir(&self.cache_key);
        if output.exists() {
            info!(stage = %stage, output = %output.display(), "Output exists, skipping");
            return Ok(cached(stage, output));
        }

        let mapped = self.layout.mapped_jar(&self.cache_key);
        let partial = fsutil::with_suffix(&output, PARTIAL_SUFFIX);
        if partial.exists() {
            fs::remove_dir_all(&partial)
                .with_context(|| format!("failed to clear {}", partial.display()))?;
        }
        let classes = partial.join("classes");

        info!(jar = %mapped.display(), prefix = DECOMPILE_PREFIX, "Extracting classes");
        let (jar, target) = (mapped.clone(), classes.clone());
        let extracted =
            in_current_dispatch(move || extract_zip(&jar, &target, Some(DECOMPILE_PREFIX)))
                .await
                .context("extraction task failed")?
                .with_context(|| format!("failed to extract {}", mapped.display()))?;
        info!(files = extracted, "Extracted classes");

        self.run_stage(stage, &classes, &partial).await?;
        fs::rename(&partial, &output)
            .with_context(|| format!("failed to move {} into place", output.display()))?;
        info!(output = %output.display(), "Decompiled");
        Ok(ran(stage, output))
    }

    async fn download_server(&self, vanilla: &Path) -> anyhow::Result<StageRecord> {
        let stage = PipelineStage::DownloadServer;
        if vanilla.exists() {
            info!(stage = %stage, output = %vanilla.display(), "Output exists, skipping");
            return Ok(cached(stage, vanilla.to_path_buf()));
        }

        let url = &self.server_jar_url;
        self.fetcher
            .download(url, vanilla)
            .await
            .with_context(|| format!("failed to download server jar from {url}"))?;
        Ok(ran(stage, vanilla.to_path_buf()))
    }

    async fn remap(
        &self,
        stage: PipelineStage,
        input: &Path,
        output: &Path,
    ) -> anyhow::Result<StageRecord> {
        if output.exists() {
            info!(stage = %stage, output = %output.display(), "Output exists, skipping");
            return Ok(cached(stage, output.to_path_buf()));
        }

        let partial = fsutil::with_suffix(output, PARTIAL_SUFFIX);
        if partial.exists() {
            fs::remove_file(&partial)
                .with_context(|| format!("failed to clear {}", partial.display()))?;
        }

        self.run_stage(stage, input, &partial).await?;
        if !partial.exists() {
            anyhow::bail!("{stage} produced no output at {}", partial.display());
        }
        fs::rename(&partial, output)
            .with_context(|| format!("failed to move {} into place", output.display()))?;
        info!(stage = %stage, output = %output.display(), "Stage complete");
        Ok(ran(stage, output.to_path_buf()))
    }

    async fn run_stage(&self, stage: PipelineStage, input: &Path, output: &Path) -> anyhow::Result<()> {
        let command = stage
            .command(&self.root, &self.info, input, output)
            .with_context(|| format!("{stage} has no command"))?;
        self.runner
            .run_checked(&command)
            .await
            .with_context(|| format!("stage {stage} failed"))?;
        Ok(())
    }
}

fn ran(stage: PipelineStage, output: PathBuf) -> StageRecord {
    StageRecord {
        stage,
        outcome: StageOutcome::Ran,
        output,
    }
}

fn cached(stage: PipelineStage, output: PathBuf) -> StageRecord {
    StageRecord {
        stage,
        outcome: StageOutcome::Cached,
        output,
    }
}
