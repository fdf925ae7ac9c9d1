//! Logging for nudge
//!
//! The CLI writes structured `tracing` output to a daily-rotated file under
//! the XDG state directory (`~/.local/state/nudge/nudge.log.<date>`). Nothing
//! is logged to stdout, which carries command output.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Keeps the background log writer alive; pending lines are flushed on drop.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Base path of the log file. Rotated files append a date suffix.
pub fn log_file_path() -> PathBuf {
    Config::log_path()
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. At most `config.max_files`
/// rotated files are kept.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let path = log_file_path();
    let (dir, prefix) = split_log_path(&path)?;
    std::fs::create_dir_all(dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(config.max_files.max(1))
        .build(dir)
        .map_err(|e| Error::Config(format!("failed to open log file: {}", e)))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!(path = %path.display(), level = %config.level, "Logging initialized");

    Ok(LoggingGuard { _guard: guard })
}

fn split_log_path(path: &Path) -> Result<(&Path, &str)> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Config(format!("log path has no directory: {}", path.display())))?;
    let prefix = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::Config(format!("log path has no file name: {}", path.display())))?;
    Ok((dir, prefix))
}

/// Route logs to the test harness. Safe to call from every test.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
