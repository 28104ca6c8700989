//! Area-subsystem error type.

use thiserror::Error;

/// Errors produced by `dg-area`.
#[derive(Debug, Error)]
pub enum AreaError {
    #[error("OSM parse error: {0}")]
    Osm(String),

    #[error("GeoJSON error: {0}")]
    GeoJson(String),

    #[error("census error: {0}")]
    Census(String),

    #[error("no buildings found inside the buffered model area")]
    EmptyArea,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache error: {0}")]
    Cache(String),
}

pub type AreaResult<T> = Result<T, AreaError>;
