//! Daily log file setup.
//!
//! The host application calls [`init`] once at startup; the cache client
//! itself never installs a subscriber.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::LoggerConfig;

/// Logging setup errors
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install subscriber: {0}")]
    Install(String),
}

/// Path of the log file for `date`: `applog-YYYYMMDD.log` inside `dir`, or
/// in the working directory when `dir` is empty.
#[must_use]
pub fn log_file_path(dir: &str, date: NaiveDate) -> PathBuf {
    let file_name = format!(
        "applog-{}{:02}{:02}.log",
        date.year(),
        date.month(),
        date.day()
    );

    if dir.is_empty() {
        PathBuf::from(file_name)
    } else {
        Path::new(dir).join(file_name)
    }
}

/// Install a global subscriber appending to today's log file.
///
/// Returns the path written to.
///
/// # Errors
///
/// Fails when the file cannot be opened or a global subscriber is already set.
pub fn init(config: &LoggerConfig) -> Result<PathBuf, LoggingError> {
    let path = log_file_path(&config.path, chrono::Local::now().date_naive());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| LoggingError::Open {
            path: path.clone(),
            source,
        })?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| LoggingError::Open {
            path: path.clone(),
            source,
        })?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.level.as_str())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))?;

    tracing::info!(path = %path.display(), "Logging initialized");
    Ok(path)
}
