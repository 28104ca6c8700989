//! Routing-subsystem error type.

use thiserror::Error;

use dg_core::LatLon;

/// Errors produced by `dg-routing`.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// No road node within snapping range of the coordinate.  Callers
    /// blacklist the endpoint and fall back to Euclidean distance.
    #[error("no routable point near {0}")]
    PointNotFound(LatLon),

    /// The graph is disconnected between the snapped endpoints.
    #[error("no route between {from} and {to}")]
    NoRoute { from: LatLon, to: LatLon },

    #[error("OSM parse error: {0}")]
    Osm(String),

    #[error("matrix persistence error: {0}")]
    Persist(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RoutingResult<T> = Result<T, RoutingError>;
