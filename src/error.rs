//! Error handling module
//!
//! Two layers of failure exist in a verification run:
//! - `AppError` is fatal for the command that hit it (pool setup, snapshot
//!   file, enumeration, report output).
//! - `FingerprintError` belongs to a single table and is recorded into that
//!   table's fingerprint instead of being propagated.

use std::path::PathBuf;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Connection pool could not be initialized: {0}")]
    PoolInit(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Snapshot file {} not found", path.display())]
    SnapshotNotFound { path: PathBuf },

    #[error("Invalid snapshot file {}: {message}", path.display())]
    InvalidSnapshot { path: PathBuf, message: String },

    #[error("Backup failed: {0}")]
    Backup(String),

    #[error("Report error: {0}")]
    Report(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn pool_init(msg: impl std::fmt::Display) -> Self {
        Self::PoolInit(msg.to_string())
    }

    pub fn backup(msg: impl Into<String>) -> Self {
        Self::Backup(msg.into())
    }

    pub fn invalid_snapshot(path: impl Into<PathBuf>, msg: impl std::fmt::Display) -> Self {
        Self::InvalidSnapshot {
            path: path.into(),
            message: msg.to_string(),
        }
    }
}

/// Result type alias for fatal operations
pub type AppResult<T> = Result<T, AppError>;

/// Failure while fingerprinting one table
#[derive(Error, Debug)]
pub enum FingerprintError {
    #[error("{0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("could not acquire connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("worker task failed: {0}")]
    Task(String),
}

impl FingerprintError {
    pub fn task(msg: impl std::fmt::Display) -> Self {
        Self::Task(msg.to_string())
    }
}

/// Render an error with its cause chain, one cause per line.
pub fn format_detailed(err: &(dyn std::error::Error + 'static)) -> String {
    let mut output = format!("Error: {}", err);

    let mut source = err.source();
    let mut depth = 1;
    while let Some(cause) = source {
        output.push_str(&format!("\n  Caused by ({}): {}", depth, cause));
        source = cause.source();
        depth += 1;
    }

    output
}
