//! Output-subsystem error type.

use thiserror::Error;

/// Errors produced by `dg-output`.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("unsupported output extension {0:?} (use .json, .csv, .db, or .xml)")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type OutputResult<T> = Result<T, OutputError>;
