//! Core error type.
//!
//! Sub-crates define their own error enums and either convert `CoreError`
//! via `#[from]` or wrap it as one variant — whichever keeps error sites
//! clean.

use thiserror::Error;

/// The top-level error type for `dg-core` and a common base for sub-crates.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Every weight in a candidate set was zero.  Callers substitute a
    /// uniform distribution and log the fallback.
    #[error("all candidate weights are zero")]
    DegenerateWeights,

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("covariance error: {0}")]
    Covariance(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Shorthand result type for `dg-core`.
pub type CoreResult<T> = Result<T, CoreError>;
