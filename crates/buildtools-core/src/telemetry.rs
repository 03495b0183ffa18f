//! Logging context for a build run.
//!
//! [`LogContext::install`] builds a subscriber that writes to the console
//! and to a log file, and installs it as the default dispatcher for as long
//! as the context lives. Dropping the context restores whatever dispatcher
//! was active before; process-wide stdout/stderr are never replaced.
//!
//! Work spawned onto other tasks or threads must carry the dispatcher along
//! (`WithSubscriber::with_current_subscriber`, [`in_current_dispatch`]).

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::subscriber::DefaultGuard;
use tracing::{warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log file written in the working directory.
pub const LOG_FILE: &str = "BuildTools.log.txt";

/// Active console + file logging for one run.
pub struct LogContext {
    log_file: Option<PathBuf>,
    _guard: DefaultGuard,
}

impl LogContext {
    /// Install console and file logging.
    ///
    /// * `json` - emit JSON lines on the console; the file is always plain text.
    /// * `level` - verbosity when `RUST_LOG` is not set.
    ///
    /// A log file that cannot be created downgrades to console-only logging.
    pub fn install(log_file: &Path, json: bool, level: Level) -> Self {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

        let file = File::create(log_file);
        let file_layer = file.as_ref().ok().and_then(|f| f.try_clone().ok()).map(|f| {
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(f))
        });

        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(json.then(|| fmt::layer().with_target(false).json()))
            .with((!json).then(|| fmt::layer().with_target(false)))
            .with(file_layer);
        let guard = tracing::subscriber::set_default(subscriber);

        let log_file = match file {
            Ok(_) => Some(log_file.to_path_buf()),
            Err(e) => {
                warn!(path = %log_file.display(), error = %e, "Failed to create log file");
                None
            }
        };

        LogContext {
            log_file,
            _guard: guard,
        }
    }

    /// Path of the log file, when one is being written.
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }
}

/// Run blocking work on the blocking pool with the caller's dispatcher.
pub async fn in_current_dispatch<F, T>(work: F) -> std::io::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let dispatch = tracing::dispatcher::get_default(|d| d.clone());
    tokio::task::spawn_blocking(move || tracing::dispatcher::with_default(&dispatch, work))
        .await
        .map_err(std::io::Error::other)
}
