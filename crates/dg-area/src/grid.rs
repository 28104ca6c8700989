//! Grid clusterer: bundles buildings into aggregation cells via k-means.
//!
//! # Contract
//!
//! `k = ceil(area / precision²)` for the focus area, so the average
//! building-to-centroid distance lands near the precision parameter.  In
//! the buffer ring the precision is relaxed quadratically with distance
//! from the focus boundary (a band 2 km out clusters 9× coarser), keeping
//! the cell count manageable for large buffers.
//!
//! Clustering is deterministic under a fixed seed: k-means++ seeding and
//! Lloyd iterations both draw only from the clustering seed domain.

use geo::{EuclideanDistance, MultiPolygon, Point};

use dg_core::{
    ActivityType, Building, Cell, CellId, DemandRng, ProjPoint, RunSeed, SeedDomain,
    TransverseMercator,
};

/// Width of one buffer distance band.
const BAND_WIDTH_M: f64 = 1_000.0;
/// Lloyd iteration cap; assignments converge long before this in practice.
const MAX_ITERATIONS: usize = 50;

#[derive(Clone, Debug)]
pub struct GridConfig {
    /// Target cell edge length in the focus area, meters.  Default 150.
    pub precision_m: f64,
    pub seed: u64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { precision_m: 150.0, seed: 0 }
    }
}

/// Cluster `buildings` into cells and stamp each building's owning cell.
///
/// `focus` must be in the model CRS; `focus_area_m2` is its polygon area.
/// Returns the cell list with aggregates left at zero — call
/// [`dg_core::LocationArena::rebuild_cell_aggregates`] after attractions
/// are computed.
pub fn cluster_grid(
    buildings: &mut [Building],
    focus: &MultiPolygon<f64>,
    focus_area_m2: f64,
    cfg: &GridConfig,
    tm: &TransverseMercator,
) -> Vec<Cell> {
    let mut rng = RunSeed::new(cfg.seed).domain(SeedDomain::Clustering);

    // ── Partition buildings into the focus set and buffer bands ───────────
    let mut bands: Vec<Vec<usize>> = Vec::new();
    for (i, b) in buildings.iter().enumerate() {
        let band = if b.in_focus {
            0
        } else {
            let d = Point::new(b.coord.x, b.coord.y).euclidean_distance(focus);
            1 + (d / BAND_WIDTH_M).floor() as usize
        };
        if bands.len() <= band {
            bands.resize_with(band + 1, Vec::new);
        }
        bands[band].push(i);
    }

    // ── Cluster each band at its own precision ────────────────────────────
    let mut cells: Vec<Cell> = Vec::new();
    for (band, members) in bands.iter().enumerate() {
        if members.is_empty() {
            continue;
        }
        let relax = (1 + band) as f64;
        let precision = cfg.precision_m * relax * relax;

        let area_m2 = if band == 0 {
            focus_area_m2
        } else {
            bbox_area(buildings, members)
        };
        let k = ((area_m2 / (precision * precision)).ceil() as usize)
            .clamp(1, members.len());

        let points: Vec<ProjPoint> = members.iter().map(|&i| buildings[i].coord).collect();
        let assignment = kmeans(&points, k, &mut rng);

        // Materialize non-empty clusters.
        let mut by_cluster: Vec<Vec<usize>> = vec![Vec::new(); k];
        for (local, &cluster) in assignment.iter().enumerate() {
            by_cluster[cluster].push(members[local]);
        }
        for cluster_members in by_cluster.into_iter().filter(|m| !m.is_empty()) {
            let id = CellId(cells.len() as u32);
            let centroid = mean_point(buildings, &cluster_members);
            let avg_dist = cluster_members
                .iter()
                .map(|&i| buildings[i].coord.distance_m(centroid))
                .sum::<f64>()
                / cluster_members.len() as f64;

            for &i in &cluster_members {
                buildings[i].cell = id;
            }
            cells.push(Cell {
                id,
                centroid,
                latlon: tm.to_latlon(centroid),
                members: cluster_members
                    .into_iter()
                    .map(|i| buildings[i].id)
                    .collect(),
                attraction: [0.0; ActivityType::COUNT],
                population: 0.0,
                in_focus: false,
                od_zone: None,
                // Strictly positive: a single-building cell still has spread.
                avg_distance_to_self: avg_dist.max(1.0),
                region_type: 7,
            });
        }
    }

    cells
}

/// Assign a RegioStar7-like settlement class from cell population density.
///
/// Call after census folding and aggregate rebuilding.
pub fn assign_region_types(cells: &mut [Cell]) {
    for cell in cells {
        // Approximate the cell footprint from its member spread.
        let radius_km = (2.0 * cell.avg_distance_to_self / 1_000.0).max(0.05);
        let area_km2 = std::f64::consts::PI * radius_km * radius_km;
        let density = cell.population / area_km2;

        cell.region_type = match density {
            d if d >= 4_000.0 => 1,
            d if d >= 2_000.0 => 2,
            d if d >= 1_000.0 => 3,
            d if d >= 500.0   => 4,
            d if d >= 250.0   => 5,
            d if d >= 100.0   => 6,
            _                 => 7,
        };
    }
}

// ── K-means internals ─────────────────────────────────────────────────────────

/// Lloyd's algorithm with k-means++ seeding.  Returns the cluster index per
/// point.
fn kmeans(points: &[ProjPoint], k: usize, rng: &mut DemandRng) -> Vec<usize> {
    debug_assert!(k >= 1 && k <= points.len());

    // ── k-means++ seeding ─────────────────────────────────────────────────
    let mut centers: Vec<ProjPoint> = Vec::with_capacity(k);
    centers.push(points[rng.gen_range(0..points.len())]);

    let mut dist2: Vec<f64> = points
        .iter()
        .map(|p| sq_dist(*p, centers[0]))
        .collect();

    while centers.len() < k {
        let total: f64 = dist2.iter().sum();
        let next = if total <= 0.0 {
            // All remaining points coincide with a center — pick any.
            rng.gen_range(0..points.len())
        } else {
            let mut u = rng.u01() * total;
            let mut chosen = points.len() - 1;
            for (i, d) in dist2.iter().enumerate() {
                u -= d;
                if u <= 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        };
        let c = points[next];
        centers.push(c);
        for (d, p) in dist2.iter_mut().zip(points.iter()) {
            *d = d.min(sq_dist(*p, c));
        }
    }

    // ── Lloyd iterations ──────────────────────────────────────────────────
    let mut assignment = vec![0usize; points.len()];
    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let mut best = 0;
            let mut best_d = f64::INFINITY;
            for (c, center) in centers.iter().enumerate() {
                let d = sq_dist(*p, *center);
                if d < best_d {
                    best_d = d;
                    best = c;
                }
            }
            if assignment[i] != best {
                assignment[i] = best;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![(0.0f64, 0.0f64, 0usize); centers.len()];
        for (i, p) in points.iter().enumerate() {
            let s = &mut sums[assignment[i]];
            s.0 += p.x;
            s.1 += p.y;
            s.2 += 1;
        }
        for (c, s) in sums.iter().enumerate() {
            if s.2 > 0 {
                centers[c] = ProjPoint::new(s.0 / s.2 as f64, s.1 / s.2 as f64);
            }
        }
    }

    assignment
}

#[inline]
fn sq_dist(a: ProjPoint, b: ProjPoint) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

fn mean_point(buildings: &[Building], members: &[usize]) -> ProjPoint {
    let n = members.len() as f64;
    let (sx, sy) = members.iter().fold((0.0, 0.0), |(sx, sy), &i| {
        (sx + buildings[i].coord.x, sy + buildings[i].coord.y)
    });
    ProjPoint::new(sx / n, sy / n)
}

fn bbox_area(buildings: &[Building], members: &[usize]) -> f64 {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &i in members {
        let p = buildings[i].coord;
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    ((max_x - min_x) * (max_y - min_y)).max(1.0)
}
