use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::Local;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_LEVEL_ENV: &str = "TASKBOARD_SYNC_LOG_LEVEL";
const LOG_FILE_PREFIX: &str = "taskboard-sync-";
const DEFAULT_LEVEL: &str = "warn";

/// Installs a file-backed subscriber and returns the path being written to.
///
/// Records are written by a background worker. Keep the returned guard alive
/// until exit; dropping it flushes whatever is still queued.
pub fn init_logging() -> anyhow::Result<(PathBuf, WorkerGuard)> {
    let log_dir = log_directory()?;
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory '{}'", log_dir.display()))?;

    let log_file_path = log_file_path(&log_dir);
    let (writer, guard) = file_writer(&log_file_path)?;

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(log_filter(std::env::var(LOG_LEVEL_ENV).ok().as_deref()))
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::info!(path = %log_file_path.display(), "logging initialized");

    Ok((log_file_path, guard))
}

fn file_writer(path: &Path) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    let file = fs::File::create(path)
        .with_context(|| format!("failed to create log file '{}'", path.display()))?;
    Ok(tracing_appender::non_blocking(file))
}

fn log_filter(raw_level: Option<&str>) -> EnvFilter {
    EnvFilter::new(filter_directive(raw_level))
}

fn filter_directive(raw_level: Option<&str>) -> String {
    let level = raw_level
        .and_then(normalize_log_level)
        .unwrap_or(DEFAULT_LEVEL);
    format!("{level},taskboard_sync={level}")
}

fn normalize_log_level(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

pub fn log_directory() -> anyhow::Result<PathBuf> {
    let data_dir =
        dirs::data_local_dir().ok_or_else(|| anyhow!("failed to determine local data directory"))?;
    Ok(data_dir.join("taskboard-sync").join("logs"))
}

pub fn log_file_path(log_dir: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    log_dir.join(format!("{LOG_FILE_PREFIX}{timestamp}.log"))
}
