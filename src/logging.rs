//! Tracing setup shared by every heft binary.
//!
//! Events go to stderr, since stdout carries the one-line run summary, and to
//! `<app root>/logs/<binary>_<timestamp>.log`. Only the newest
//! [`MAX_LOG_FILES`] files are kept.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

use crate::config;

pub const MAX_LOG_FILES: usize = 10;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("No config directory available for log files")]
    NoLogDir,
    #[error("Failed to prepare log directory {path}: {source}")]
    LogDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to format log file timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("Failed to install tracing subscriber: {0}")]
    Install(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install the global subscriber for `component` (the binary name).
///
/// Calling it again is a no-op. On error nothing is installed and the caller
/// keeps running without logs.
pub fn init(component: &str) -> Result<(), LoggingError> {
    if LOG_GUARD.get().is_some() {
        return Ok(());
    }
    let dir = config::logs_dir().ok_or(LoggingError::NoLogDir)?;
    let dir_err = |source| LoggingError::LogDir {
        path: dir.clone(),
        source,
    };
    fs::create_dir_all(&dir).map_err(dir_err)?;
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let file_name = log_file_name(component, OffsetDateTime::now_utc().to_offset(offset))?;
    let stale = prune_logs(&dir, MAX_LOG_FILES - 1).map_err(dir_err)?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, &file_name));
    let timer = OffsetTime::new(offset, Rfc3339);
    let subscriber = Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::layer()
                .with_timer(timer.clone())
                .with_writer(std::io::stderr),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_timer(timer)
                .with_writer(file_writer),
        );
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = LOG_GUARD.set(guard);

    for (path, err) in stale {
        tracing::warn!("Could not remove old log {}: {err}", path.display());
    }
    tracing::debug!("Logging to {}", dir.join(&file_name).display());
    Ok(())
}

/// `<component>_<YYYYMMDDTHHMMSS>.log`; the stamp sorts chronologically.
fn log_file_name(component: &str, now: OffsetDateTime) -> Result<String, LoggingError> {
    let stamp = now.format(format_description!(
        "[year][month][day]T[hour][minute][second]"
    ))?;
    Ok(format!("{component}_{stamp}.log"))
}

fn stamp_of(name: &str) -> Option<&str> {
    name.strip_suffix(".log")?.rsplit_once('_').map(|(_, stamp)| stamp)
}

/// Delete all but the newest `keep` log files, ordered by their stamp.
///
/// Returns the files that could not be removed.
fn prune_logs(dir: &Path, keep: usize) -> std::io::Result<Vec<(PathBuf, std::io::Error)>> {
    let mut logs: Vec<(String, PathBuf)> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            let stamp = stamp_of(&name)?.to_string();
            Some((stamp, entry.path()))
        })
        .collect();
    logs.sort();
    let excess = logs.len().saturating_sub(keep);
    Ok(logs
        .into_iter()
        .take(excess)
        .filter_map(|(_, path)| fs::remove_file(&path).err().map(|err| (path, err)))
        .collect())
}
