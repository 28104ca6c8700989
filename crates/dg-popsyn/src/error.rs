//! Population-synthesis error type.

use thiserror::Error;

/// Errors produced by `dg-popsyn`.
#[derive(Debug, Error)]
pub enum PopError {
    /// Misconfigured input data (shares not summing to one, empty strata).
    /// Always fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// The packaged or user-supplied activity data violates a structural
    /// requirement (most importantly: the all-undefined bucket must exist
    /// and cover both from-activities).  Always fatal.
    #[error("activity data integrity error: {0}")]
    DataIntegrity(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] dg_core::CoreError),
}

pub type PopResult<T> = Result<T, PopError>;
