//! R-tree over building centroids for polygon → building queries.

use geo::{BoundingRect, Contains, MultiPolygon, Point};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use dg_core::{Building, BuildingId, ProjPoint};

/// Entry stored in the R-tree: a projected centroid with its `BuildingId`.
#[derive(Clone)]
struct BuildingEntry {
    point: [f64; 2],
    id: BuildingId,
}

impl RTreeObject for BuildingEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for BuildingEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Spatial index answering "which buildings fall inside this polygon".
///
/// Used by census folding and OD-zone stamping; queries the R-tree with the
/// polygon's bounding box and refines with an exact containment test.
pub struct BuildingIndex {
    tree: RTree<BuildingEntry>,
}

impl BuildingIndex {
    /// Bulk-load from the arena's building list.
    pub fn new(buildings: &[Building]) -> Self {
        let entries: Vec<BuildingEntry> = buildings
            .iter()
            .map(|b| BuildingEntry {
                point: [b.coord.x, b.coord.y],
                id: b.id,
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// IDs of all buildings whose centroid lies inside `polygon`
    /// (model CRS), in ascending ID order.
    pub fn buildings_in(&self, polygon: &MultiPolygon<f64>) -> Vec<BuildingId> {
        let Some(bbox) = polygon.bounding_rect() else {
            return Vec::new();
        };
        let envelope = AABB::from_corners(
            [bbox.min().x, bbox.min().y],
            [bbox.max().x, bbox.max().y],
        );
        let mut ids: Vec<BuildingId> = self
            .tree
            .locate_in_envelope(&envelope)
            .filter(|e| polygon.contains(&Point::new(e.point[0], e.point[1])))
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// The building nearest to `p`, or `None` for an empty index.
    pub fn nearest(&self, p: ProjPoint) -> Option<BuildingId> {
        self.tree.nearest_neighbor(&[p.x, p.y]).map(|e| e.id)
    }
}
