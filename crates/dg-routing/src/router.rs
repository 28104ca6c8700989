//! Routing trait and the two built-in implementations.
//!
//! # Pluggability
//!
//! The distance cache, destination-choice engine and trip resolver call
//! routing only through [`Router`], so the network backend can be swapped
//! without touching them.  `BeelineRouter` answers from plain geometry;
//! `NetworkRouter` runs Dijkstra over the CSR road graph.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use dg_core::{LatLon, Mode, ProjPoint};

use crate::network::{NodeIdx, RoadNetwork};
use crate::{RoutingError, RoutingResult};

// ── Endpoint & leg types ──────────────────────────────────────────────────────

/// A routable endpoint carrying both coordinate spaces: the model CRS for
/// Euclidean math and snapping, lat-lon for path output and persistence.
#[derive(Copy, Clone, Debug)]
pub struct RoutePoint {
    pub proj: ProjPoint,
    pub latlon: LatLon,
}

/// The result of a full routing query for one trip.
#[derive(Clone, Debug)]
pub struct RouteLeg {
    pub distance_m: f64,
    pub time_s: f64,
    /// Node polyline, populated only when the caller asks for paths.
    pub path: Option<Vec<LatLon>>,
}

// ── Router trait ──────────────────────────────────────────────────────────────

/// Pluggable routing engine.
///
/// Implementations must be `Send + Sync`: the cache pre-fill and the agent
/// loop both call routers from Rayon worker threads.
pub trait Router: Send + Sync {
    /// Short label used in persisted-matrix cache keys.
    fn label(&self) -> &'static str;

    /// Network distance in meters between two points.
    fn distance_m(&self, from: RoutePoint, to: RoutePoint) -> RoutingResult<f64>;

    /// Distances from one origin to many destinations, in order.
    ///
    /// The default forwards to [`distance_m`][Self::distance_m]; the
    /// network router overrides this with a single shortest-path tree.
    fn distances_one_to_many(
        &self,
        from: RoutePoint,
        tos: &[RoutePoint],
    ) -> Vec<RoutingResult<f64>> {
        tos.iter().map(|&to| self.distance_m(from, to)).collect()
    }

    /// Full route for one trip: distance, travel time for `mode`, and
    /// optionally the path polyline.
    fn route(
        &self,
        from: RoutePoint,
        to: RoutePoint,
        mode: Mode,
        with_path: bool,
    ) -> RoutingResult<RouteLeg>;
}

// ── BeelineRouter ─────────────────────────────────────────────────────────────

/// Straight-line distances in the model CRS; travel time from the mode's
/// constant speed.  Never fails.
pub struct BeelineRouter;

impl Router for BeelineRouter {
    fn label(&self) -> &'static str {
        "beeline"
    }

    fn distance_m(&self, from: RoutePoint, to: RoutePoint) -> RoutingResult<f64> {
        Ok(from.proj.distance_m(to.proj))
    }

    fn route(
        &self,
        from: RoutePoint,
        to: RoutePoint,
        mode: Mode,
        with_path: bool,
    ) -> RoutingResult<RouteLeg> {
        let distance_m = from.proj.distance_m(to.proj);
        let time_s = distance_m / (mode.fallback_speed_kmh() / 3.6);
        Ok(RouteLeg {
            distance_m,
            time_s,
            path: with_path.then(|| vec![from.latlon, to.latlon]),
        })
    }
}

// ── NetworkRouter ─────────────────────────────────────────────────────────────

/// Speed assumptions for modes without their own edge costs, m/s.
const WALK_SPEED_MPS: f64 = 1.4;
const BIKE_SPEED_MPS: f64 = 4.2;
const TRANSIT_SPEED_MPS: f64 = 6.25; // 22.5 km/h incl. stops

/// Dijkstra over the CSR road graph.
///
/// Car uses the pre-computed per-edge travel times; foot and bike derive
/// cost from edge length at their constant speeds.  Transit has no network
/// of its own here and approximates over the road graph.
pub struct NetworkRouter {
    network: RoadNetwork,
}

impl NetworkRouter {
    pub fn new(network: RoadNetwork) -> Self {
        Self { network }
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    fn snap(&self, p: RoutePoint) -> RoutingResult<NodeIdx> {
        self.network
            .snap(p.proj)
            .ok_or(RoutingError::PointNotFound(p.latlon))
    }
}

impl Router for NetworkRouter {
    fn label(&self) -> &'static str {
        "network"
    }

    fn distance_m(&self, from: RoutePoint, to: RoutePoint) -> RoutingResult<f64> {
        let src = self.snap(from)?;
        let dst = self.snap(to)?;
        let settled = shortest_path_tree(&self.network, src, Mode::CarDriver, Some(&[dst]));
        settled[dst.index()]
            .map(|(dist_m, _)| dist_m)
            .ok_or(RoutingError::NoRoute {
                from: from.latlon,
                to: to.latlon,
            })
    }

    fn distances_one_to_many(
        &self,
        from: RoutePoint,
        tos: &[RoutePoint],
    ) -> Vec<RoutingResult<f64>> {
        let src = match self.snap(from) {
            Ok(s) => s,
            Err(_) => {
                return tos
                    .iter()
                    .map(|_| Err(RoutingError::PointNotFound(from.latlon)))
                    .collect();
            }
        };

        // Snap all targets first so the tree search knows when to stop.
        let snapped: Vec<Option<NodeIdx>> =
            tos.iter().map(|&t| self.network.snap(t.proj)).collect();
        let targets: Vec<NodeIdx> = snapped.iter().flatten().copied().collect();
        let settled = shortest_path_tree(&self.network, src, Mode::CarDriver, Some(&targets));

        snapped
            .iter()
            .zip(tos)
            .map(|(maybe_node, &to)| match maybe_node {
                None => Err(RoutingError::PointNotFound(to.latlon)),
                Some(node) => settled[node.index()]
                    .map(|(dist_m, _)| dist_m)
                    .ok_or(RoutingError::NoRoute {
                        from: from.latlon,
                        to: to.latlon,
                    }),
            })
            .collect()
    }

    fn route(
        &self,
        from: RoutePoint,
        to: RoutePoint,
        mode: Mode,
        with_path: bool,
    ) -> RoutingResult<RouteLeg> {
        let src = self.snap(from)?;
        let dst = self.snap(to)?;

        // Indexed by node: the edge that settled it.
        let mut prev_edge = vec![u32::MAX; self.network.node_count().max(1)];
        let settled = dijkstra(
            &self.network,
            src,
            mode,
            Some(&[dst]),
            Some(&mut prev_edge),
        );
        let (distance_m, time_s) = settled[dst.index()].ok_or(RoutingError::NoRoute {
            from: from.latlon,
            to: to.latlon,
        })?;

        let path = with_path.then(|| reconstruct_path(&self.network, &prev_edge, src, dst));
        Ok(RouteLeg { distance_m, time_s, path })
    }
}

// ── Dijkstra internals ────────────────────────────────────────────────────────

/// Edge cost in milliseconds for the given mode (integer for exact heap
/// ordering), plus the true accumulated (distance, time) per node.
#[inline]
fn edge_cost_ms(network: &RoadNetwork, edge: usize, mode: Mode) -> u64 {
    let secs = match mode {
        Mode::CarDriver | Mode::CarPassenger | Mode::Undefined => {
            network.edge_car_s[edge] as f64
        }
        Mode::Foot => network.edge_len_m[edge] as f64 / WALK_SPEED_MPS,
        Mode::Bicycle => network.edge_len_m[edge] as f64 / BIKE_SPEED_MPS,
        Mode::PublicTransit => network.edge_len_m[edge] as f64 / TRANSIT_SPEED_MPS,
    };
    (secs * 1_000.0) as u64
}

/// One-to-many shortest-path tree.  Returns per-node `(distance_m, time_s)`
/// along the time-optimal path, `None` for unreached nodes.
///
/// With `targets`, the search stops once all targets are settled.
pub(crate) fn shortest_path_tree(
    network: &RoadNetwork,
    src: NodeIdx,
    mode: Mode,
    targets: Option<&[NodeIdx]>,
) -> Vec<Option<(f64, f64)>> {
    dijkstra(network, src, mode, targets, None)
}

fn dijkstra(
    network: &RoadNetwork,
    src: NodeIdx,
    mode: Mode,
    targets: Option<&[NodeIdx]>,
    mut prev_edge: Option<&mut [u32]>,
) -> Vec<Option<(f64, f64)>> {
    let n = network.node_count();
    let mut cost = vec![u64::MAX; n];
    let mut best: Vec<Option<(f64, f64)>> = vec![None; n];

    let mut remaining: Option<rustc_hash::FxHashSet<NodeIdx>> =
        targets.map(|t| t.iter().copied().collect());

    cost[src.index()] = 0;
    best[src.index()] = Some((0.0, 0.0));

    // Min-heap: Reverse makes BinaryHeap behave as one; the NodeIdx
    // secondary key keeps tie-breaking deterministic.
    let mut heap: BinaryHeap<Reverse<(u64, NodeIdx)>> = BinaryHeap::new();
    heap.push(Reverse((0, src)));

    while let Some(Reverse((c, node))) = heap.pop() {
        if c > cost[node.index()] {
            continue; // stale entry
        }
        if let Some(rem) = remaining.as_mut() {
            rem.remove(&node);
            if rem.is_empty() {
                break;
            }
        }

        let (dist_here, time_here) = best[node.index()].unwrap_or((0.0, 0.0));
        for e in network.out_edges(node) {
            let neighbor = network.edge_target[e];
            let new_cost = c.saturating_add(edge_cost_ms(network, e, mode));
            if new_cost < cost[neighbor.index()] {
                cost[neighbor.index()] = new_cost;
                best[neighbor.index()] = Some((
                    dist_here + network.edge_len_m[e] as f64,
                    time_here + edge_cost_ms(network, e, mode) as f64 / 1_000.0,
                ));
                if let Some(prev) = prev_edge.as_deref_mut() {
                    prev[neighbor.index()] = e as u32;
                }
                heap.push(Reverse((new_cost, neighbor)));
            }
        }
    }

    best
}

fn reconstruct_path(
    network: &RoadNetwork,
    prev_edge: &[u32],
    src: NodeIdx,
    dst: NodeIdx,
) -> Vec<LatLon> {
    let mut nodes = vec![dst];
    let mut cur = dst;
    while cur != src {
        let e = prev_edge[cur.index()];
        if e == u32::MAX {
            break;
        }
        cur = network.edge_source[e as usize];
        nodes.push(cur);
    }
    nodes.reverse();
    nodes.into_iter().map(|n| network.node_latlon(n)).collect()
}
