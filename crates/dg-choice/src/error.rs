//! Choice-subsystem error type.

use thiserror::Error;

/// Errors produced by `dg-choice`.
#[derive(Debug, Error)]
pub enum ChoiceError {
    #[error("OD matrix error: {0}")]
    Od(String),

    /// The calibrator supports HOME→WORK flow tables only.
    #[error("unsupported OD activity pair {origin}→{destination}")]
    UnsupportedOdPair { origin: String, destination: String },

    #[error("distance distribution data error: {0}")]
    Deterrence(String),

    #[error("GeoJSON error: {0}")]
    GeoJson(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] dg_core::CoreError),
}

pub type ChoiceResult<T> = Result<T, ChoiceError>;
