//! Diagnostics go to a file: the terminal belongs to the feed.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::error::LogError;

/// `<data dir>/danmaku-feed/danmaku-feed.log`, or the working directory when
/// the platform has no data dir.
pub fn default_log_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("danmaku-feed"))
        .unwrap_or_default()
        .join("danmaku-feed.log")
}

/// Install the global subscriber writing to `path`.
///
/// `RUST_LOG` takes precedence over `level`. Keep the returned guard alive
/// for the life of the process; dropping it flushes pending lines.
///
/// # Errors
///
/// Returns an error if the log file or its directory cannot be created, or
/// if a global subscriber is already installed.
pub fn init(path: &Path, level: &str) -> Result<WorkerGuard, LogError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_thread_names(true)
        .with_target(false);

    Registry::default().with(filter).with(layer).try_init()?;

    info!(path = %path.display(), level, "logging initialized");
    Ok(guard)
}
