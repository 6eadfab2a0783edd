//! File-based logging for the TUI host.
//!
//! Stdout is never used for logs — it is reserved for the terminal view.
//! All tracing output goes to a daily-rolling file under the platform data
//! dir; a stderr layer is enabled only when `RUST_LOG` is set (useful for
//! development, where the TUI is usually run with `--once`).

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// The base filename for the rolling log file.
const LOG_FILE_NAME: &str = "vantage.log";

/// Initialise the tracing subscriber with file + optional stderr layers.
///
/// Returns a [`WorkerGuard`] that must be held for the lifetime of the
/// program — dropping it flushes and closes the log file writer.
pub fn init() -> WorkerGuard {
    let log_dir = default_data_dir();

    if let Err(err) = std::fs::create_dir_all(&log_dir) {
        eprintln!(
            "warning: could not create log directory {}: {err}",
            log_dir.display()
        );
    }

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    let stderr_layer = std::env::var("RUST_LOG").is_ok().then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    guard
}

pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "vantage", "vantage")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(std::env::temp_dir)
}
