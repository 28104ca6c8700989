//! Two-tier bounded distance cache with a pre-warmed hot submatrix.
//!
//! # Structure
//!
//! - **Hot submatrix** — all-pairs distances among the top-N locations by
//!   priority (N = `size_outer`), computed once at startup (or loaded from
//!   disk) and immutable afterwards.  Covers the overwhelming majority of
//!   destination-choice queries because high-attraction locations dominate
//!   both origins and destinations.
//! - **LRU tiers** — an outer LRU of origin rows (≤ `size_outer` entries),
//!   each row an inner LRU of destination distances (≤ `size_inner`).
//!   Total memory is O(size_outer × size_inner × 4 B).
//!
//! # Concurrency
//!
//! The outer map is behind one short-lived lock; each row has its own lock
//! held across compute-and-insert, so concurrent misses on the same origin
//! serialize instead of double-computing.  Misses on different origins
//! proceed in parallel.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use dg_core::LatLon;

use crate::matrix::{self, DistanceMatrix, ABSENT};
use crate::router::{RoutePoint, Router};
use crate::RoutingResult;

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct DistanceCacheConfig {
    /// Hot-matrix rank and outer LRU bound.
    pub size_outer: usize,
    /// Inner (per-origin) LRU bound.
    pub size_inner: usize,
}

impl Default for DistanceCacheConfig {
    fn default() -> Self {
        Self {
            size_outer: 5_000,
            size_inner: 20_000,
        }
    }
}

/// One end of a cached distance query.
///
/// `key` is the location's stable interner handle
/// ([`dg_core::LocationArena::route_key`]); `None` marks a location that
/// cannot be routed (dummy zones), which always falls back to Euclidean.
#[derive(Copy, Clone, Debug)]
pub struct CacheEndpoint {
    pub key: Option<u32>,
    pub point: RoutePoint,
}

// ── Hot submatrix ─────────────────────────────────────────────────────────────

struct HotMatrix {
    matrix: DistanceMatrix,
    /// Location key → matrix row/column.
    index_of: FxHashMap<u32, usize>,
    path: PathBuf,
    dirty: bool,
}

// ── DistanceCache ─────────────────────────────────────────────────────────────

type Row = Arc<Mutex<LruCache<u32, f32>>>;

/// The two-tier distance store shared by destination choice.
pub struct DistanceCache {
    config: DistanceCacheConfig,
    rows: Mutex<LruCache<u32, Row>>,
    hot: Option<HotMatrix>,
    /// Keys of endpoints the router reported as unroutable; queried once,
    /// then answered with Euclidean forever.
    blacklist: Mutex<FxHashSet<u32>>,
}

impl DistanceCache {
    pub fn new(config: DistanceCacheConfig) -> Self {
        let outer = NonZeroUsize::new(config.size_outer.max(1)).unwrap();
        Self {
            config,
            rows: Mutex::new(LruCache::new(outer)),
            hot: None,
            blacklist: Mutex::new(FxHashSet::default()),
        }
    }

    /// Load or build the hot submatrix.
    ///
    /// `locations` pairs every routable location's key with its endpoint;
    /// `priorities` ranks them (higher = more likely to be queried).  If a
    /// matrix persisted under the derived key exists it is loaded and
    /// remapped by exact lat-lon match; otherwise the top-N all-pairs
    /// distances are computed in parallel across origins.
    pub fn load(
        &mut self,
        locations: &[(u32, RoutePoint)],
        priorities: &[f64],
        cache_dir: &Path,
        router: &dyn Router,
    ) {
        // Top-N keys by priority, ties broken by key for determinism.
        let n = self.config.size_outer.min(locations.len());
        let mut ranked: Vec<usize> = (0..locations.len()).collect();
        ranked.sort_by(|&a, &b| {
            priorities[b]
                .partial_cmp(&priorities[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| locations[a].0.cmp(&locations[b].0))
        });
        ranked.truncate(n);

        let chosen: Vec<(u32, RoutePoint)> = ranked.iter().map(|&i| locations[i]).collect();
        let coords: Vec<LatLon> = chosen.iter().map(|(_, p)| p.latlon).collect();
        let path = matrix::matrix_path(cache_dir, router.label(), &coords);

        if let Ok(loaded) = matrix::load_matrix(&path) {
            // Remap rows/columns by exact lat-lon coordinates.
            let mut by_coord: FxHashMap<(u64, u64), usize> = FxHashMap::default();
            for (i, c) in loaded.coords.iter().enumerate() {
                by_coord.insert(c.bit_key(), i);
            }
            let all_present = chosen
                .iter()
                .all(|(_, p)| by_coord.contains_key(&p.latlon.bit_key()));
            if all_present && loaded.n() == chosen.len() {
                // Reorder into the current run's key order.
                let mut matrix = DistanceMatrix::new(coords);
                for (i, (_, pi)) in chosen.iter().enumerate() {
                    let li = by_coord[&pi.latlon.bit_key()];
                    for (j, (_, pj)) in chosen.iter().enumerate() {
                        let lj = by_coord[&pj.latlon.bit_key()];
                        matrix.set(i, j, loaded.get(li, lj));
                    }
                }
                log::info!("loaded routing matrix ({} locations) from cache", matrix.n());
                self.hot = Some(HotMatrix {
                    matrix,
                    index_of: chosen.iter().enumerate().map(|(i, (k, _))| (*k, i)).collect(),
                    path,
                    dirty: false,
                });
                return;
            }
            log::warn!("persisted routing matrix does not match current locations; rebuilding");
        }

        // Build: one shortest-path tree per origin, across the worker pool.
        log::info!("pre-computing routing matrix for {} locations", chosen.len());
        let points: Vec<RoutePoint> = chosen.iter().map(|(_, p)| *p).collect();
        let rows: Vec<Vec<f32>> = (0..chosen.len())
            .into_par_iter()
            .map(|i| {
                router
                    .distances_one_to_many(points[i], &points)
                    .into_iter()
                    .map(|r| r.map(|d| d as f32).unwrap_or(ABSENT))
                    .collect()
            })
            .collect();

        let mut matrix = DistanceMatrix::new(coords);
        for (i, row) in rows.into_iter().enumerate() {
            for (j, v) in row.into_iter().enumerate() {
                matrix.set(i, j, v);
            }
        }

        self.hot = Some(HotMatrix {
            matrix,
            index_of: chosen.iter().enumerate().map(|(i, (k, _))| (*k, i)).collect(),
            path,
            dirty: true,
        });
    }

    /// Persist the hot submatrix.  Failure is logged by the caller and is
    /// non-fatal.
    pub fn flush(&mut self) -> RoutingResult<()> {
        if let Some(hot) = &mut self.hot {
            if hot.dirty {
                matrix::save_matrix(&hot.path, &hot.matrix)?;
                hot.dirty = false;
            }
        }
        Ok(())
    }

    /// Distances in meters from `origin` to each destination, in order.
    ///
    /// Resolution order per pair: Euclidean for unroutable endpoints and
    /// blacklisted ones → hot submatrix → per-origin LRU → router compute
    /// (memoized).  Routing failures fall back to Euclidean; a
    /// `PointNotFound` additionally blacklists the endpoint.
    pub fn distances_from_to(
        &self,
        origin: CacheEndpoint,
        dests: &[CacheEndpoint],
        router: &dyn Router,
    ) -> Vec<f64> {
        let mut out = vec![0.0f64; dests.len()];

        let Some(origin_key) = origin.key else {
            // Dummy origin: everything is Euclidean.
            for (o, d) in out.iter_mut().zip(dests) {
                *o = origin.point.proj.distance_m(d.point.proj);
            }
            return out;
        };
        if self.is_blacklisted(origin_key) {
            for (o, d) in out.iter_mut().zip(dests) {
                *o = origin.point.proj.distance_m(d.point.proj);
            }
            return out;
        }

        let hot_row = self
            .hot
            .as_ref()
            .and_then(|h| h.index_of.get(&origin_key).copied());

        // First pass: satisfy what we can without touching the router.
        let mut misses: Vec<usize> = Vec::new();
        {
            let row = self.row(origin_key);
            let mut row_guard = row.lock();
            for (j, dest) in dests.iter().enumerate() {
                let Some(dest_key) = dest.key else {
                    out[j] = origin.point.proj.distance_m(dest.point.proj);
                    continue;
                };
                if let (Some(hot), Some(i)) = (self.hot.as_ref(), hot_row) {
                    if let Some(&k) = hot.index_of.get(&dest_key) {
                        let v = hot.matrix.get(i, k);
                        if v >= 0.0 {
                            out[j] = v as f64;
                            continue;
                        }
                    }
                }
                if let Some(&v) = row_guard.get(&dest_key) {
                    out[j] = v as f64;
                    continue;
                }
                if self.is_blacklisted(dest_key) {
                    out[j] = origin.point.proj.distance_m(dest.point.proj);
                    continue;
                }
                misses.push(j);
            }

            // Second pass: one batched router call for all misses, with the
            // row lock held so concurrent queries for this origin coalesce.
            if !misses.is_empty() {
                let points: Vec<RoutePoint> = misses.iter().map(|&j| dests[j].point).collect();
                let results = router.distances_one_to_many(origin.point, &points);
                for (&j, result) in misses.iter().zip(results) {
                    let dest = &dests[j];
                    match result {
                        Ok(d) => {
                            out[j] = d;
                            row_guard.put(dest.key.unwrap(), d as f32);
                        }
                        Err(e) => {
                            // PointNotFound names the failing coordinate:
                            // blacklist the origin itself when it is the one
                            // off the network, not the innocent destination.
                            if let crate::RoutingError::PointNotFound(p) = &e {
                                if p.bit_key() == origin.point.latlon.bit_key() {
                                    self.blacklist_endpoint(origin_key, &e);
                                } else {
                                    self.blacklist_endpoint(dest.key.unwrap(), &e);
                                }
                            }
                            out[j] = origin.point.proj.distance_m(dest.point.proj);
                        }
                    }
                }
            }
        }

        out
    }

    // ── Internals ─────────────────────────────────────────────────────────

    /// Fetch or create the inner LRU row for `origin_key`.
    fn row(&self, origin_key: u32) -> Row {
        let mut rows = self.rows.lock();
        if let Some(row) = rows.get(&origin_key) {
            return Arc::clone(row);
        }
        let row: Row = Arc::new(Mutex::new(LruCache::new(
            NonZeroUsize::new(self.config.size_inner.max(1)).unwrap(),
        )));
        rows.put(origin_key, Arc::clone(&row));
        row
    }

    fn is_blacklisted(&self, key: u32) -> bool {
        self.blacklist.lock().contains(&key)
    }

    fn blacklist_endpoint(&self, key: u32, reason: &crate::RoutingError) {
        let mut bl = self.blacklist.lock();
        if bl.insert(key) {
            // Log once per endpoint.
            log::warn!("blacklisting unroutable location {key}: {reason}");
        }
    }
}
