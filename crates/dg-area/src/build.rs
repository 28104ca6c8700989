//! The area-construction pipeline: OSM extract → enriched building list.

use std::path::Path;

use geo::{Area, BoundingRect, Centroid, Contains, EuclideanDistance, Geometry, Intersects,
          MultiPolygon, Point};
use log::info;
use rstar::{RTree, RTreeObject, AABB};

use dg_core::{
    ActivityType, Building, BuildingId, CellId, Landuse, LatLon, PoiCounts, RunSeed, SeedDomain,
    TransverseMercator,
};

use crate::census::{apply_census, CensusEntry};
use crate::cover::stamp_membership;
use crate::osm::{self, GeoBounds, OsmExtract, PoiKind};
use crate::{AreaError, AreaResult, BuildingIndex};

/// Buildings with a projected footprint at or below this area are mapping
/// noise (sheds, artifacts) and are discarded.
const MIN_BUILDING_AREA_M2: f64 = 10.0;

// ── ModelArea ─────────────────────────────────────────────────────────────────

/// The assembled model area: enriched buildings plus the geometry context
/// every later stage needs.
pub struct ModelArea {
    pub buildings: Vec<Building>,
    /// Drivable road polylines from the same PBF pass, for the network
    /// router.
    pub roads: Vec<dg_core::RoadSegment>,
    /// Focus polygon in the model CRS.
    pub focus: MultiPolygon<f64>,
    pub focus_area_m2: f64,
    /// Buffer radius around the focus, meters.
    pub buffer_m: f64,
    pub projection: TransverseMercator,
}

// ── AreaBuilder ───────────────────────────────────────────────────────────────

/// Configures and runs the C3 pipeline.
pub struct AreaBuilder {
    focus_latlon: MultiPolygon<f64>,
    buffer_m: f64,
    census: Vec<CensusEntry>,
    census_share: f64,
    seed: u64,
}

impl AreaBuilder {
    /// `focus` is the user-supplied polygon in EPSG:4326.
    pub fn new(focus: MultiPolygon<f64>, buffer_m: f64, seed: u64) -> Self {
        Self {
            focus_latlon: focus,
            buffer_m,
            census: Vec::new(),
            census_share: 1.0,
            seed,
        }
    }

    /// Attach census polygons (already projected) and the population share
    /// to simulate.
    pub fn census(mut self, entries: Vec<CensusEntry>, share: f64) -> Self {
        self.census = entries;
        self.census_share = share;
        self
    }

    /// The projection every stage of this run must share, derived from the
    /// focus centroid longitude.
    pub fn projection(&self) -> TransverseMercator {
        let central_lon = self
            .focus_latlon
            .centroid()
            .map(|c| c.x())
            .unwrap_or_default();
        TransverseMercator::new(central_lon)
    }

    /// Stream `osm_path` and produce the enriched building list.
    pub fn build(self, osm_path: &Path) -> AreaResult<ModelArea> {
        let tm = self.projection();
        let bounds =
            GeoBounds::around(&self.focus_latlon, self.buffer_m).ok_or(AreaError::EmptyArea)?;

        info!("streaming OSM extract from {}", osm_path.display());
        let mut extract = osm::extract(osm_path, bounds, &tm)?;
        info!(
            "extracted {} buildings, {} POIs, {} land-use areas, {} road segments",
            extract.buildings.len(),
            extract.pois.len(),
            extract.landuses.len(),
            extract.roads.len()
        );

        let focus = project_multipolygon(&self.focus_latlon, &tm);
        let focus_area_m2 = focus.unsigned_area();

        let roads = std::mem::take(&mut extract.roads);
        let mut buildings = assemble_buildings(extract, &focus, self.buffer_m, &tm);
        if buildings.is_empty() {
            return Err(AreaError::EmptyArea);
        }

        // Census folding.
        if !self.census.is_empty() {
            let index = BuildingIndex::new(&buildings);
            let mut rng = RunSeed::new(self.seed).domain(SeedDomain::Census);
            apply_census(
                &mut buildings,
                &index,
                &self.census,
                self.census_share,
                &mut rng,
            );
            let total: f64 = buildings.iter().map(|b| b.population).sum();
            info!("census folded: {total:.0} residents distributed");
        }

        info!(
            "model area ready: {} buildings ({} in focus)",
            buildings.len(),
            buildings.iter().filter(|b| b.in_focus).count()
        );

        Ok(ModelArea {
            buildings,
            roads,
            focus,
            focus_area_m2,
            buffer_m: self.buffer_m,
            projection: tm,
        })
    }
}

// ── Pipeline stages ───────────────────────────────────────────────────────────

/// Filter, enrich and number the raw buildings.
fn assemble_buildings(
    extract: OsmExtract,
    focus: &MultiPolygon<f64>,
    buffer_m: f64,
    tm: &TransverseMercator,
) -> Vec<Building> {
    // Keep buildings with a real footprint inside the buffered area.
    let kept: Vec<&osm::RawBuilding> = extract
        .buildings
        .iter()
        .filter(|b| b.area_m2 > MIN_BUILDING_AREA_M2)
        .filter(|b| {
            let p = Point::new(b.centroid.x, b.centroid.y);
            focus.contains(&p) || p.euclidean_distance(focus) <= buffer_m
        })
        .collect();

    // POI spatial index for intersection counting.
    let poi_tree = RTree::bulk_load(
        extract
            .pois
            .iter()
            .map(|p| PoiEntry {
                point: [p.point.x, p.point.y],
                kind: p.kind,
            })
            .collect(),
    );

    // Land-use index over polygon bounding boxes.
    let landuse_tree = RTree::bulk_load(
        extract
            .landuses
            .iter()
            .enumerate()
            .filter_map(|(i, l)| {
                l.geometry.bounding_rect().map(|r| LanduseEntry {
                    bbox: AABB::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y]),
                    index: i,
                })
            })
            .collect(),
    );

    // Focus membership for all kept centroids in one fast_covers pass.
    let centroids: Vec<_> = kept.iter().map(|b| b.centroid).collect();
    let in_focus = stamp_membership(focus, &centroids);

    kept.into_iter()
        .enumerate()
        .map(|(i, raw)| {
            let mut poi = PoiCounts::default();
            if let Some(r) = raw.geometry.bounding_rect() {
                let envelope =
                    AABB::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y]);
                for entry in poi_tree.locate_in_envelope(&envelope) {
                    let p = Point::new(entry.point[0], entry.point[1]);
                    if raw.geometry.intersects(&p) {
                        match entry.kind {
                            PoiKind::Shop      => poi.shops += 1,
                            PoiKind::Office    => poi.offices += 1,
                            PoiKind::Education => poi.education += 1,
                            PoiKind::Leisure   => poi.leisure += 1,
                        }
                    }
                }
            }

            // First intersecting land-use area wins.
            let landuse = raw
                .geometry
                .bounding_rect()
                .and_then(|r| {
                    let envelope =
                        AABB::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y]);
                    landuse_tree
                        .locate_in_envelope_intersecting(&envelope)
                        .find(|e| extract.landuses[e.index].geometry.intersects(&raw.geometry))
                        .map(|e| extract.landuses[e.index].kind)
                })
                .unwrap_or(Landuse::None);

            Building {
                id: BuildingId(i as u32),
                coord: raw.centroid,
                latlon: raw.latlon,
                area_m2: raw.area_m2,
                population: 0.0,
                landuse,
                poi,
                in_focus: in_focus[i],
                od_zone: None,
                cell: CellId::INVALID,
                attraction: [0.0; ActivityType::COUNT],
            }
        })
        .collect()
}

// ── Spatial index entries ─────────────────────────────────────────────────────

struct PoiEntry {
    point: [f64; 2],
    kind: PoiKind,
}

impl RTreeObject for PoiEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

struct LanduseEntry {
    bbox: AABB<[f64; 2]>,
    index: usize,
}

impl RTreeObject for LanduseEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.bbox
    }
}

// ── GeoJSON helpers shared across the crate ───────────────────────────────────

/// Read the focus-area polygon from a GeoJSON file (EPSG:4326).
///
/// Accepts a FeatureCollection (all polygonal features are unioned into one
/// MultiPolygon), a single Feature, or a bare geometry.
pub fn load_area_geojson(path: &Path) -> AreaResult<MultiPolygon<f64>> {
    let raw = std::fs::read_to_string(path)?;
    let gj: geojson::GeoJson = raw
        .parse()
        .map_err(|e: geojson::Error| AreaError::GeoJson(e.to_string()))?;

    let mut polygons: Vec<geo::Polygon<f64>> = Vec::new();
    let mut push_geom = |value: geojson::Value| -> AreaResult<()> {
        let geom: Geometry<f64> = value
            .try_into()
            .map_err(|e: geojson::Error| AreaError::GeoJson(e.to_string()))?;
        if let Some(mp) = to_multipolygon(geom) {
            polygons.extend(mp.0);
        }
        Ok(())
    };

    match gj {
        geojson::GeoJson::FeatureCollection(fc) => {
            for f in fc.features {
                if let Some(g) = f.geometry {
                    push_geom(g.value)?;
                }
            }
        }
        geojson::GeoJson::Feature(f) => {
            if let Some(g) = f.geometry {
                push_geom(g.value)?;
            }
        }
        geojson::GeoJson::Geometry(g) => push_geom(g.value)?,
    }

    if polygons.is_empty() {
        return Err(AreaError::GeoJson("no polygonal geometry in area file".into()));
    }
    Ok(MultiPolygon(polygons))
}

/// Flatten any polygonal geometry into a MultiPolygon.
pub fn to_multipolygon(geom: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geom {
        Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        Geometry::MultiPolygon(mp) => Some(mp),
        Geometry::GeometryCollection(gc) => {
            let polys: Vec<geo::Polygon<f64>> = gc
                .0
                .into_iter()
                .filter_map(to_multipolygon)
                .flat_map(|mp| mp.0)
                .collect();
            if polys.is_empty() {
                None
            } else {
                Some(MultiPolygon(polys))
            }
        }
        _ => None,
    }
}

/// Project a lat-lon MultiPolygon into the model CRS.
pub fn project_multipolygon(
    mp: &MultiPolygon<f64>,
    tm: &TransverseMercator,
) -> MultiPolygon<f64> {
    use geo::MapCoords;
    mp.map_coords(|c| {
        let p = tm.to_model(LatLon::new(c.y, c.x));
        geo::Coord { x: p.x, y: p.y }
    })
}
