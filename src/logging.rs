//! tracing setup: stderr console plus a daily log file.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info,townbot=debug";

/// Overrides the platform log directory.
pub const LOG_DIR_ENV: &str = "TOWNBOT_LOG_DIR";

/// Install the global subscriber. Call after `.env` is loaded so `RUST_LOG`
/// and `TOWNBOT_LOG_DIR` from it apply.
///
/// Keep the guard alive until exit; dropping it flushes the file writer.
pub fn init() -> Result<(WorkerGuard, PathBuf)> {
    let log_dir = log_dir(std::env::var_os(LOG_DIR_ENV).map(PathBuf::from))?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, "townbot.log"));

    // File lines carry call sites; console lines stay compact.
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true);
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(filter())
        .with(file_layer)
        .with(console_layer)
        .init();

    tracing::debug!("Logging to {}", log_dir.display());
    Ok((guard, log_dir))
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn log_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit.filter(|d| !d.as_os_str().is_empty()) {
        return Ok(dir);
    }
    let dirs = directories::ProjectDirs::from("com", "gastown", "townbot")
        .context("could not determine a home directory for logs")?;
    Ok(dirs.data_dir().join("logs"))
}
