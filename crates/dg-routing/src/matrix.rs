//! Persisted binary distance matrix.
//!
//! Format: `(coords, values)` where `values` is a row-major `n × n` matrix
//! of `f32` meters and `-1.0` marks an absent entry.  On load, entries are
//! remapped to the current run's locations by **exact** lat-lon equality —
//! which is why the workspace stores coordinates as `f64` end to end.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use dg_core::LatLon;

use crate::{RoutingError, RoutingResult};

/// Marker for an entry that was never computed (or failed to route).
pub const ABSENT: f32 = -1.0;

#[derive(Serialize, Deserialize)]
pub struct DistanceMatrix {
    pub coords: Vec<LatLon>,
    /// Row-major `n × n`; `values[i * n + j]` is the distance from
    /// `coords[i]` to `coords[j]` in meters, or [`ABSENT`].
    pub values: Vec<f32>,
}

impl DistanceMatrix {
    pub fn new(coords: Vec<LatLon>) -> Self {
        let n = coords.len();
        Self {
            coords,
            values: vec![ABSENT; n * n],
        }
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.coords.len()
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.values[i * self.n() + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, v: f32) {
        let n = self.n();
        self.values[i * n + j] = v;
    }
}

/// File path for a persisted matrix, keyed by `(router label, location
/// count, lat-lon bounding box)`.
pub fn matrix_path(cache_dir: &Path, label: &str, coords: &[LatLon]) -> PathBuf {
    let mut min_lat = f64::INFINITY;
    let mut min_lon = f64::INFINITY;
    let mut max_lat = f64::NEG_INFINITY;
    let mut max_lon = f64::NEG_INFINITY;
    for c in coords {
        min_lat = min_lat.min(c.lat);
        min_lon = min_lon.min(c.lon);
        max_lat = max_lat.max(c.lat);
        max_lon = max_lon.max(c.lon);
    }
    let key = format!(
        "{label}-{}-{min_lat:.6}_{min_lon:.6}_{max_lat:.6}_{max_lon:.6}.bin",
        coords.len()
    );
    cache_dir.join("routing-matrix-cache").join(key)
}

pub fn save_matrix(path: &Path, matrix: &DistanceMatrix) -> RoutingResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = bincode::serialize(matrix).map_err(|e| RoutingError::Persist(e.to_string()))?;
    std::fs::write(path, bytes)?;
    Ok(())
}

pub fn load_matrix(path: &Path) -> RoutingResult<DistanceMatrix> {
    let bytes = std::fs::read(path)?;
    let matrix: DistanceMatrix =
        bincode::deserialize(&bytes).map_err(|e| RoutingError::Persist(e.to_string()))?;
    if matrix.values.len() != matrix.coords.len() * matrix.coords.len() {
        return Err(RoutingError::Persist(format!(
            "matrix shape mismatch: {} coords, {} values",
            matrix.coords.len(),
            matrix.values.len()
        )));
    }
    Ok(matrix)
}
