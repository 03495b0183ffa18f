//! BuildTools CLI
//!
//! The `buildtools` command reproduces a Spigot build in the current
//! directory: it resolves the pinned refs, syncs the four repositories,
//! remaps and decompiles the server jar, applies the CraftBukkit patches,
//! compiles everything with Maven and copies the server jars here.
//!
//! Progress goes to the console and to `BuildTools.log.txt`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use buildtools_core::{LogContext, LOG_FILE};
use buildtools_pipeline::{BuildConfig, BuildFlags, BuildOrchestrator, BuildReport};
use clap::Parser;
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[command(name = "buildtools")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build Spigot and CraftBukkit from source", long_about = None)]
struct Cli {
    /// Accept any TLS certificate for downloads
    #[arg(long)]
    disable_certificate_check: bool,

    /// Use the development manifest and do not update the repositories
    #[arg(long)]
    dont_update: bool,

    /// Patch sources without compiling them
    #[arg(long)]
    skip_compile: bool,

    /// Also build the API sources jar
    #[arg(long)]
    generate_source: bool,

    /// Also build the API javadoc jar
    #[arg(long)]
    generate_docs: bool,

    /// Build the latest development refs instead of the published version
    #[arg(long)]
    dev: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn flags(&self) -> BuildFlags {
        BuildFlags {
            disable_certificate_check: self.disable_certificate_check,
            dont_update: self.dont_update,
            skip_compile: self.skip_compile,
            generate_source: self.generate_source,
            generate_docs: self.generate_docs,
            dev: self.dev,
        }
    }

    fn level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}

/// Help and version requests succeed; every other parse error is a usage
/// failure.
fn parse_exit_code(err: &clap::Error) -> u8 {
    if err.use_stderr() {
        1
    } else {
        0
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(parse_exit_code(&err));
        }
    };

    let root = match std::env::current_dir() {
        Ok(root) => root,
        Err(e) => {
            eprintln!("Cannot determine working directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log = LogContext::install(&root.join(LOG_FILE), cli.json, cli.level());
    if let Some(path) = log.log_file() {
        info!(log_file = %path.display(), "Logging to file");
    }

    let code = match run(root, cli.flags()).await {
        Ok(report) => {
            for artifact in &report.artifacts {
                info!(jar = %artifact.target.display(), "Saved");
            }
            info!(
                name = %report.manifest.name,
                cache_key = %report.cache_key,
                duration_ms = report.duration_ms,
                "Success! Everything completed successfully"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    };

    drop(log);
    code
}

async fn run(root: PathBuf, flags: BuildFlags) -> Result<BuildReport> {
    let config = BuildConfig::new(root, flags);
    let orchestrator =
        BuildOrchestrator::from_config(config).context("Failed to set up the build")?;
    orchestrator.run().await
}
