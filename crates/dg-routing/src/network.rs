//! Road network construction from extracted segments.
//!
//! # Input
//!
//! The area extractor hands over [`RoadSegment`] polylines whose vertices
//! carry a stable junction key; this module never touches the source
//! format.  Construction unifies junctions across segments, materializes
//! directed edges, and lays them out for the router.
//!
//! # Layout
//!
//! Outgoing edges are stored in **Compressed Sparse Row** form, built by
//! counting-sort placement: one sweep counts each node's out-degree, a
//! prefix sum turns the counts into row offsets, and a second sweep
//! scatters every edge directly into its slot.  No intermediate edge list
//! and no sort — edge order within a row follows segment order, which is
//! deterministic for a given extract.
//!
//! For a node `n`, its outgoing edges occupy
//! `first_out[n] .. first_out[n + 1]`; iterating them is a contiguous
//! scan, the access pattern the router's inner loop wants.
//!
//! # Snapping
//!
//! An R-tree over projected node positions resolves arbitrary model-CRS
//! points to road nodes.  A snap farther than [`MAX_SNAP_M`] fails: the
//! location is not on the network, and the caller's blacklist takes over.

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use rustc_hash::FxHashMap;

use dg_core::{LatLon, ProjPoint, RoadSegment};

/// Maximum distance between a query point and its snapped road node.
pub const MAX_SNAP_M: f64 = 2_000.0;

// ── NodeIdx ───────────────────────────────────────────────────────────────────

/// Index of a road-network node.  Local to this crate: the rest of the
/// workspace never addresses network internals.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeIdx(pub u32);

impl NodeIdx {
    pub const INVALID: NodeIdx = NodeIdx(u32::MAX);

    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ── R-tree entry ──────────────────────────────────────────────────────────────

#[derive(Clone)]
struct NodeEntry {
    point: [f64; 2],
    id: NodeIdx,
}

impl RTreeObject for NodeEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for NodeEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

// ── RoadNetwork ───────────────────────────────────────────────────────────────

/// Directed road graph in CSR form plus a spatial index for snapping.
pub struct RoadNetwork {
    /// Projected position of each node.
    pub(crate) node_proj: Vec<ProjPoint>,
    /// Geographic position of each node (for path polylines).
    pub(crate) node_latlon: Vec<LatLon>,

    /// CSR row offsets; length = node_count + 1.
    pub(crate) first_out: Vec<u32>,
    /// Edge endpoints, grouped by source node.
    pub(crate) edge_source: Vec<NodeIdx>,
    pub(crate) edge_target: Vec<NodeIdx>,
    /// Physical edge length in meters.
    pub(crate) edge_len_m: Vec<f32>,
    /// Car travel time in seconds; other modes derive cost from length.
    pub(crate) edge_car_s: Vec<f32>,

    snap_index: RTree<NodeEntry>,
}

impl RoadNetwork {
    /// Build the graph from extracted road segments.
    ///
    /// Vertices sharing a junction key collapse onto one node; every
    /// consecutive vertex pair becomes a directed edge (both directions
    /// unless the segment is one-way).
    pub fn from_segments(segments: &[RoadSegment]) -> RoadNetwork {
        // ── Unify junctions ───────────────────────────────────────────────
        let mut node_of_key: FxHashMap<i64, NodeIdx> = FxHashMap::default();
        let mut node_proj: Vec<ProjPoint> = Vec::new();
        let mut node_latlon: Vec<LatLon> = Vec::new();

        for segment in segments {
            for vertex in &segment.vertices {
                node_of_key.entry(vertex.key).or_insert_with(|| {
                    let idx = NodeIdx(node_proj.len() as u32);
                    node_proj.push(vertex.proj);
                    node_latlon.push(vertex.latlon);
                    idx
                });
            }
        }
        let node_count = node_proj.len();

        // ── Counting sort: degree count → row offsets → scatter ───────────
        let mut first_out = vec![0u32; node_count + 1];
        for_each_directed_edge(segments, &node_of_key, |from, _, _, _| {
            first_out[from.index() + 1] += 1;
        });
        for i in 1..=node_count {
            first_out[i] += first_out[i - 1];
        }
        let edge_count = first_out[node_count] as usize;

        let mut cursor: Vec<u32> = first_out[..node_count].to_vec();
        let mut edge_source = vec![NodeIdx::INVALID; edge_count];
        let mut edge_target = vec![NodeIdx::INVALID; edge_count];
        let mut edge_len_m = vec![0.0f32; edge_count];
        let mut edge_car_s = vec![0.0f32; edge_count];
        for_each_directed_edge(segments, &node_of_key, |from, to, len_m, car_s| {
            let slot = cursor[from.index()] as usize;
            cursor[from.index()] += 1;
            edge_source[slot] = from;
            edge_target[slot] = to;
            edge_len_m[slot] = len_m;
            edge_car_s[slot] = car_s;
        });
        debug_assert!(edge_target.iter().all(|t| *t != NodeIdx::INVALID));

        // ── Snap index ────────────────────────────────────────────────────
        let snap_index = RTree::bulk_load(
            node_proj
                .iter()
                .enumerate()
                .map(|(i, p)| NodeEntry {
                    point: [p.x, p.y],
                    id: NodeIdx(i as u32),
                })
                .collect(),
        );

        RoadNetwork {
            node_proj,
            node_latlon,
            first_out,
            edge_source,
            edge_target,
            edge_len_m,
            edge_car_s,
            snap_index,
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_proj.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_proj.is_empty()
    }

    #[inline]
    pub(crate) fn out_edges(&self, node: NodeIdx) -> std::ops::Range<usize> {
        self.first_out[node.index()] as usize..self.first_out[node.index() + 1] as usize
    }

    pub fn node_latlon(&self, node: NodeIdx) -> LatLon {
        self.node_latlon[node.index()]
    }

    /// Snap a model-CRS point to its nearest road node.
    ///
    /// `None` when the network is empty or the nearest node is farther
    /// than [`MAX_SNAP_M`].
    pub fn snap(&self, p: ProjPoint) -> Option<NodeIdx> {
        let entry = self.snap_index.nearest_neighbor(&[p.x, p.y])?;
        if entry.distance_2(&[p.x, p.y]) <= MAX_SNAP_M * MAX_SNAP_M {
            Some(entry.id)
        } else {
            None
        }
    }
}

/// Visit every directed edge implied by `segments`, in segment order.
/// Two-way segments yield both directions back to back.
fn for_each_directed_edge<F>(
    segments: &[RoadSegment],
    node_of_key: &FxHashMap<i64, NodeIdx>,
    mut f: F,
) where
    F: FnMut(NodeIdx, NodeIdx, f32, f32),
{
    for segment in segments {
        for pair in segment.vertices.windows(2) {
            let from = node_of_key[&pair[0].key];
            let to = node_of_key[&pair[1].key];
            let len_m = pair[0].proj.distance_m(pair[1].proj) as f32;
            let car_s = (len_m as f64 / segment.speed_mps) as f32;
            f(from, to, len_m, car_s);
            if !segment.oneway {
                f(to, from, len_m, car_s);
            }
        }
    }
}
