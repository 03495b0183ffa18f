//! BuildTools Pipeline - remap, decompile, patch and compile
//!
//! Provides the build orchestrator that:
//! - Resolves the manifest and syncs the four repositories
//! - Runs the cache-keyed remap/decompile pipeline through external tools
//! - Applies the implementation patch stack and compiles with Maven
//! - Collects the resulting server jars

pub mod collect;
pub mod compile;
pub mod config;
pub mod fakes;
pub mod orchestrator;
pub mod pipeline;
pub mod runner;
pub mod stage;
pub mod toolchain;

// Re-export key types
pub use collect::{collect_artifacts, CollectedArtifact};
pub use compile::Compiler;
pub use config::{BuildConfig, BuildFlags, RemoteConfig};
pub use orchestrator::{BuildFailed, BuildOrchestrator, BuildReport, BuildState};
pub use pipeline::{ArtifactPipeline, PipelineResult, StageOutcome, StageRecord, WorkLayout};
pub use runner::{ProcessRunner, ToolCommand, ToolRun, ToolRunner};
pub use stage::PipelineStage;
pub use toolchain::MavenHome;
