//! External tool execution with live output.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use buildtools_core::{BuildError, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;
use tracing::{debug, info};

/// How long to wait for output draining once the process has exited.
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A single external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    /// Executable name or path.
    pub program: String,

    pub args: Vec<String>,

    /// Working directory.
    pub cwd: PathBuf,

    /// Extra environment; the parent environment is inherited.
    pub env: Vec<(String, String)>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Command line as reported in logs and errors.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a tool invocation.
#[derive(Debug, Clone)]
pub struct ToolRun {
    /// Command line that ran.
    pub command: String,

    /// Exit code (0 = success, -1 when killed by a signal).
    pub exit_code: i32,

    pub duration_ms: u64,
}

impl ToolRun {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `command` to completion. A non-zero exit is not an error here.
    async fn run(&self, command: &ToolCommand) -> Result<ToolRun>;

    /// Run `command`, failing with [`BuildError::ToolFailed`] on a non-zero
    /// exit.
    async fn run_checked(&self, command: &ToolCommand) -> Result<ToolRun> {
        let run = self.run(command).await?;
        if !run.passed() {
            return Err(BuildError::ToolFailed {
                command: run.command,
                exit_code: run.exit_code,
            });
        }
        Ok(run)
    }
}

/// [`ToolRunner`] that spawns real processes and echoes their output.
///
/// Stdout and stderr are drained by two tasks while the parent waits on
/// exit, so tools writing heavily to both never block on a full pipe. The
/// drains are awaited for at most `drain_grace` after exit and then aborted;
/// trailing output may therefore be cut short.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    drain_grace: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_drain_grace(drain_grace: Duration) -> Self {
        Self { drain_grace }
    }

    async fn settle(&self, drain: Option<JoinHandle<()>>, stream: &'static str) {
        let Some(mut handle) = drain else {
            return;
        };
        if tokio::time::timeout(self.drain_grace, &mut handle)
            .await
            .is_err()
        {
            debug!(stream, "Output still draining after exit, abandoning");
            handle.abort();
        }
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolRun> {
        let rendered = command.display();
        info!(cwd = %command.cwd.display(), command = %rendered, "Running tool");
        let start = Instant::now();

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.cwd)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BuildError::Environment(format!("failed to start {}: {e}", command.program))
            })?;

        let stdout = child.stdout.take().map(|out| drain(out, "stdout"));
        let stderr = child.stderr.take().map(|err| drain(err, "stderr"));

        let status = child.wait().await?;
        self.settle(stdout, "stdout").await;
        self.settle(stderr, "stderr").await;

        let run = ToolRun {
            command: rendered,
            exit_code: status.code().unwrap_or(-1),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        debug!(
            command = %run.command,
            exit_code = run.exit_code,
            duration_ms = run.duration_ms,
            "Tool exited"
        );
        Ok(run)
    }
}

/// Echo each line of `reader` at INFO, tagged with its stream.
fn drain<R>(reader: R, stream: &'static str) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(
        async move {
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf);
                        info!(stream, "{}", line.trim_end_matches(['\r', '\n']));
                    }
                    Err(e) => {
                        debug!(stream, error = %e, "Stopped reading tool output");
                        break;
                    }
                }
            }
        }
        .with_current_subscriber(),
    )
}
