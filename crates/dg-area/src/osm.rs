//! OSM PBF streaming: tag classification and geometry assembly.
//!
//! # What is loaded
//!
//! A single sequential pass collects four element families:
//!
//! - **Buildings** — closed ways and multipolygon relations tagged
//!   `building=*` (except `building=no`).
//! - **POIs** — nodes or ways carrying shop / office / education /
//!   leisure tags (see [`poi_kind`]).  A building way with a POI tag
//!   yields both a building and a POI at its centroid.
//! - **Land-use areas** — `landuse=residential|commercial|retail|industrial`.
//! - **Roads** — drivable `highway=*` ways, emitted as
//!   [`RoadSegment`] polylines for the routing crate.  Ways leaving the
//!   clip box are split at the gap; runs shorter than two vertices are
//!   dropped.
//!
//! # Memory note
//!
//! Node coordinates are buffered in a `FxHashMap<i64, LatLon>` for the
//! assembly phase, pre-filtered by the expanded bounding box of the model
//! area so a country-scale extract does not blow up memory.  The map is
//! freed as soon as geometries are assembled.

use std::path::Path;

use geo::{Area, BoundingRect, Centroid, Coord, LineString, MultiPolygon, Polygon};
use osmpbf::{Element, ElementReader, RelMemberType};
use rustc_hash::FxHashMap;

use dg_core::{LatLon, ProjPoint, RoadSegment, RoadVertex, TransverseMercator};

use crate::{AreaError, AreaResult};

// ── Raw extract types ─────────────────────────────────────────────────────────

/// POI category, bucketed by the activity it attracts.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PoiKind {
    Shop,
    Office,
    Education,
    Leisure,
}

/// A building footprint in the model CRS, before enrichment.
pub struct RawBuilding {
    pub geometry: Polygon<f64>,
    pub centroid: ProjPoint,
    pub latlon: LatLon,
    pub area_m2: f64,
}

/// A point of interest, reduced to a representative point.
pub struct RawPoi {
    pub point: ProjPoint,
    pub kind: PoiKind,
}

/// A land-use area in the model CRS.
pub struct RawLanduse {
    pub geometry: Polygon<f64>,
    pub kind: dg_core::Landuse,
}

/// Everything retained from one PBF pass.
pub struct OsmExtract {
    pub buildings: Vec<RawBuilding>,
    pub pois: Vec<RawPoi>,
    pub landuses: Vec<RawLanduse>,
    pub roads: Vec<RoadSegment>,
}

// ── Public entry point ────────────────────────────────────────────────────────

/// Geographic bounding box used to pre-filter nodes during streaming.
#[derive(Copy, Clone, Debug)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl GeoBounds {
    #[inline]
    fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    /// Grow by `margin_deg` degrees on every side.
    pub fn expand(self, margin_deg: f64) -> GeoBounds {
        GeoBounds {
            min_lat: self.min_lat - margin_deg,
            min_lon: self.min_lon - margin_deg,
            max_lat: self.max_lat + margin_deg,
            max_lon: self.max_lon + margin_deg,
        }
    }

    /// Clip box for a focus area: its bounding box grown by the buffer
    /// radius (converted generously to degrees) plus a safety margin.
    ///
    /// `None` for an empty focus geometry.
    pub fn around(focus_latlon: &MultiPolygon<f64>, buffer_m: f64) -> Option<GeoBounds> {
        let bbox = focus_latlon.bounding_rect()?;
        let margin_deg = buffer_m / 111_000.0 + 0.01;
        Some(
            GeoBounds {
                min_lat: bbox.min().y,
                min_lon: bbox.min().x,
                max_lat: bbox.max().y,
                max_lon: bbox.max().x,
            }
            .expand(margin_deg),
        )
    }
}

/// Stream `path` and extract buildings, POIs and land-use areas within
/// `bounds`, projected through `tm`.
pub fn extract(
    path: &Path,
    bounds: GeoBounds,
    tm: &TransverseMercator,
) -> AreaResult<OsmExtract> {
    // ── Phase 1: one sequential pass over the PBF ─────────────────────────
    let reader =
        ElementReader::from_path(path).map_err(|e| AreaError::Osm(e.to_string()))?;

    let mut nodes: FxHashMap<i64, LatLon> = FxHashMap::default();
    let mut ways: Vec<TaggedWay> = Vec::new();
    let mut way_refs: FxHashMap<i64, Vec<i64>> = FxHashMap::default();
    let mut relations: Vec<BuildingRelation> = Vec::new();
    let mut node_pois: Vec<(i64, PoiKind)> = Vec::new();
    let mut road_ways: Vec<RoadWay> = Vec::new();

    reader
        .for_each(|elem| match elem {
            Element::Node(n) => {
                if bounds.contains(n.lat(), n.lon()) {
                    nodes.insert(n.id(), LatLon::new(n.lat(), n.lon()));
                }
                let tags: Vec<(&str, &str)> = n.tags().collect();
                if let Some(kind) = poi_kind(&tags) {
                    node_pois.push((n.id(), kind));
                }
            }
            Element::DenseNode(n) => {
                if bounds.contains(n.lat(), n.lon()) {
                    nodes.insert(n.id(), LatLon::new(n.lat(), n.lon()));
                }
                let tags: Vec<(&str, &str)> = n.tags().collect();
                if let Some(kind) = poi_kind(&tags) {
                    node_pois.push((n.id(), kind));
                }
            }
            Element::Way(w) => {
                let tags: Vec<(&str, &str)> = w.tags().collect();
                let refs: Vec<i64> = w.refs().collect();

                let class = WayClass {
                    building: is_building(&tags),
                    poi: poi_kind(&tags),
                    landuse: landuse_kind(&tags),
                };
                if class.building || class.poi.is_some() || class.landuse.is_some() {
                    ways.push(TaggedWay { refs: refs.clone(), class });
                }
                if let Some((speed_mps, oneway)) = drivable(&tags) {
                    road_ways.push(RoadWay { refs: refs.clone(), speed_mps, oneway });
                }
                // All way geometries are retained: multipolygon members are
                // usually untagged.
                way_refs.insert(w.id(), refs);
            }
            Element::Relation(r) => {
                let tags: Vec<(&str, &str)> = r.tags().collect();
                let is_mp = tags.iter().any(|(k, v)| *k == "type" && *v == "multipolygon");
                let building = is_building(&tags);
                let landuse = landuse_kind(&tags);
                if is_mp && (building || landuse.is_some()) {
                    let mut outers = Vec::new();
                    let mut inners = Vec::new();
                    for m in r.members() {
                        if m.member_type != RelMemberType::Way {
                            continue;
                        }
                        match m.role() {
                            Ok("inner") => inners.push(m.member_id),
                            // Blank roles are treated as outer, per OSM convention.
                            Ok(_) => outers.push(m.member_id),
                            Err(_) => {}
                        }
                    }
                    relations.push(BuildingRelation { outers, inners, building, landuse });
                }
            }
        })
        .map_err(|e| AreaError::Osm(e.to_string()))?;

    // ── Phase 2: assemble geometries ──────────────────────────────────────
    let mut buildings = Vec::new();
    let mut pois = Vec::new();
    let mut landuses = Vec::new();

    for (id, kind) in node_pois {
        if let Some(&ll) = nodes.get(&id) {
            pois.push(RawPoi { point: tm.to_model(ll), kind });
        }
    }

    for way in &ways {
        let Some(ring) = resolve_ring(&way.refs, &nodes, tm) else {
            continue;
        };
        let polygon = Polygon::new(ring, vec![]);
        let area = polygon.unsigned_area();
        let Some(c) = polygon.centroid() else { continue };
        let centroid = ProjPoint::new(c.x(), c.y());

        if way.class.building {
            buildings.push(RawBuilding {
                latlon: tm.to_latlon(centroid),
                geometry: polygon.clone(),
                centroid,
                area_m2: area,
            });
        }
        if let Some(kind) = way.class.poi {
            pois.push(RawPoi { point: centroid, kind });
        }
        if let Some(kind) = way.class.landuse {
            landuses.push(RawLanduse { geometry: polygon, kind });
        }
    }

    for rel in &relations {
        for polygon in assemble_multipolygon(rel, &way_refs, &nodes, tm) {
            let area = polygon.unsigned_area();
            let Some(c) = polygon.centroid() else { continue };
            let centroid = ProjPoint::new(c.x(), c.y());
            if rel.building {
                buildings.push(RawBuilding {
                    latlon: tm.to_latlon(centroid),
                    geometry: polygon.clone(),
                    centroid,
                    area_m2: area,
                });
            }
            if let Some(kind) = rel.landuse {
                landuses.push(RawLanduse { geometry: polygon, kind });
            }
        }
    }

    let roads = assemble_roads(&road_ways, &nodes, tm);

    drop(nodes);
    drop(way_refs);

    Ok(OsmExtract { buildings, pois, landuses, roads })
}

/// Convenience for runs that already have their buildings cached: stream
/// the file once and keep only the road polylines.
pub fn extract_roads(
    path: &Path,
    focus_latlon: &MultiPolygon<f64>,
    buffer_m: f64,
    tm: &TransverseMercator,
) -> AreaResult<Vec<RoadSegment>> {
    let bounds = GeoBounds::around(focus_latlon, buffer_m).ok_or(AreaError::EmptyArea)?;
    Ok(extract(path, bounds, tm)?.roads)
}

// ── Internal types ────────────────────────────────────────────────────────────

struct WayClass {
    building: bool,
    poi: Option<PoiKind>,
    landuse: Option<dg_core::Landuse>,
}

struct TaggedWay {
    refs: Vec<i64>,
    class: WayClass,
}

struct BuildingRelation {
    outers: Vec<i64>,
    inners: Vec<i64>,
    building: bool,
    landuse: Option<dg_core::Landuse>,
}

struct RoadWay {
    refs: Vec<i64>,
    speed_mps: f64,
    oneway: bool,
}

// ── Tag helpers ───────────────────────────────────────────────────────────────

fn is_building(tags: &[(&str, &str)]) -> bool {
    tags.iter().any(|(k, v)| *k == "building" && *v != "no")
}

/// Classify POI tags.  First match wins; the order mirrors tag specificity
/// (a shop inside an office building is a shop).
fn poi_kind(tags: &[(&str, &str)]) -> Option<PoiKind> {
    for (k, v) in tags {
        match (*k, *v) {
            ("shop", _) => return Some(PoiKind::Shop),
            ("office", _) => return Some(PoiKind::Office),
            ("amenity", "school" | "university" | "kindergarten") => {
                return Some(PoiKind::Education);
            }
            ("amenity", "restaurant" | "cafe" | "fast_food" | "place_of_worship") => {
                return Some(PoiKind::Leisure);
            }
            ("tourism", _) => return Some(PoiKind::Leisure),
            _ => {}
        }
    }
    None
}

/// Classify a way as car-drivable, returning `(speed m/s, oneway)`.
///
/// Speeds are conservative urban defaults by road class; `maxspeed`
/// parsing is deliberately skipped — trip times feed a logit and a diary,
/// not a traffic model.  Motorways and their links are implicitly one-way
/// in OSM convention; anything else follows the `oneway` tag.
fn drivable(tags: &[(&str, &str)]) -> Option<(f64, bool)> {
    // (class prefix, km/h).  A `_link` suffix inherits its parent class.
    const SPEED_KMH: [(&str, f64); 8] = [
        ("motorway", 120.0),
        ("trunk", 100.0),
        ("primary", 80.0),
        ("secondary", 60.0),
        ("tertiary", 50.0),
        ("residential", 30.0),
        ("living_street", 30.0),
        ("service", 20.0),
    ];

    let highway = tags.iter().find(|(k, _)| *k == "highway").map(|(_, v)| *v)?;
    if matches!(
        highway,
        "footway" | "path" | "cycleway" | "pedestrian" | "steps" | "track"
    ) {
        return None;
    }

    let kmh = SPEED_KMH
        .iter()
        .find(|(class, _)| highway == *class || highway.strip_suffix("_link") == Some(*class))
        .map(|(_, kmh)| *kmh)
        // Unknown drivable class: cautious default rather than dropping.
        .unwrap_or(30.0);

    let oneway = highway.starts_with("motorway")
        || tags
            .iter()
            .any(|(k, v)| *k == "oneway" && matches!(*v, "yes" | "1" | "true"));

    Some((kmh / 3.6, oneway))
}

fn landuse_kind(tags: &[(&str, &str)]) -> Option<dg_core::Landuse> {
    tags.iter().find_map(|(k, v)| {
        if *k != "landuse" {
            return None;
        }
        match *v {
            "residential" => Some(dg_core::Landuse::Residential),
            "commercial"  => Some(dg_core::Landuse::Commercial),
            "retail"      => Some(dg_core::Landuse::Retail),
            "industrial"  => Some(dg_core::Landuse::Industrial),
            _             => None,
        }
    })
}

// ── Geometry assembly ─────────────────────────────────────────────────────────

/// Resolve a way's node refs to a closed projected ring.
///
/// Returns `None` when nodes are missing (outside the pre-filter box) or
/// the ring has fewer than four coordinates.
fn resolve_ring(
    refs: &[i64],
    nodes: &FxHashMap<i64, LatLon>,
    tm: &TransverseMercator,
) -> Option<LineString<f64>> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(refs.len() + 1);
    for id in refs {
        let ll = nodes.get(id)?;
        let p = tm.to_model(*ll);
        coords.push(Coord { x: p.x, y: p.y });
    }
    if coords.len() < 3 {
        return None;
    }
    if coords.first() != coords.last() {
        coords.push(coords[0]);
    }
    if coords.len() < 4 {
        return None;
    }
    Some(LineString::from(coords))
}

/// Merge a relation's member ways into rings and build polygons with holes.
///
/// The line merger repeatedly joins open segments on shared endpoint node
/// IDs until each chain closes; unclosed leftovers are dropped.
fn assemble_multipolygon(
    rel: &BuildingRelation,
    way_refs: &FxHashMap<i64, Vec<i64>>,
    nodes: &FxHashMap<i64, LatLon>,
    tm: &TransverseMercator,
) -> Vec<Polygon<f64>> {
    let outer_rings = merge_rings(&rel.outers, way_refs);
    let inner_rings = merge_rings(&rel.inners, way_refs);

    let mut outers: Vec<Polygon<f64>> = Vec::new();
    for ring in &outer_rings {
        if let Some(ls) = resolve_ring(ring, nodes, tm) {
            outers.push(Polygon::new(ls, vec![]));
        }
    }

    // Attach each inner ring to the first outer that contains its lead point.
    for ring in &inner_rings {
        let Some(ls) = resolve_ring(ring, nodes, tm) else { continue };
        let Some(first) = ls.points().next() else { continue };
        use geo::Contains;
        if let Some(outer) = outers.iter_mut().find(|o| o.contains(&first)) {
            outer.interiors_push(ls);
        }
    }

    outers
}

/// Turn road ways into clipped [`RoadSegment`] polylines.
///
/// The node map only holds coordinates inside the clip box, so a way may
/// come back in pieces: every maximal run of resolvable refs with at
/// least two vertices becomes its own segment.
fn assemble_roads(
    road_ways: &[RoadWay],
    nodes: &FxHashMap<i64, LatLon>,
    tm: &TransverseMercator,
) -> Vec<RoadSegment> {
    let mut segments = Vec::new();
    for way in road_ways {
        let mut run: Vec<RoadVertex> = Vec::new();
        let mut flush = |run: &mut Vec<RoadVertex>| {
            if run.len() >= 2 {
                segments.push(RoadSegment {
                    vertices: std::mem::take(run),
                    speed_mps: way.speed_mps,
                    oneway: way.oneway,
                });
            } else {
                run.clear();
            }
        };

        for &key in &way.refs {
            match nodes.get(&key) {
                Some(&latlon) => run.push(RoadVertex {
                    key,
                    proj: tm.to_model(latlon),
                    latlon,
                }),
                // Ref outside the clip box: the way continues elsewhere.
                None => flush(&mut run),
            }
        }
        flush(&mut run);
    }
    segments
}

/// Join open way-segments into closed node-ID rings by matching endpoints.
fn merge_rings(member_ids: &[i64], way_refs: &FxHashMap<i64, Vec<i64>>) -> Vec<Vec<i64>> {
    let mut segments: Vec<Vec<i64>> = member_ids
        .iter()
        .filter_map(|id| way_refs.get(id).cloned())
        .filter(|refs| refs.len() >= 2)
        .collect();

    let mut rings = Vec::new();
    while let Some(mut chain) = segments.pop() {
        loop {
            if chain.first() == chain.last() && chain.len() > 3 {
                rings.push(chain);
                break;
            }
            let tail = *chain.last().unwrap();
            // Find a segment sharing the chain's tail endpoint.
            let pos = segments.iter().position(|s| {
                *s.first().unwrap() == tail || *s.last().unwrap() == tail
            });
            match pos {
                Some(i) => {
                    let mut seg = segments.swap_remove(i);
                    if *seg.last().unwrap() == tail {
                        seg.reverse();
                    }
                    chain.extend_from_slice(&seg[1..]);
                }
                // Open chain with no continuation — drop it.
                None => break,
            }
        }
    }
    rings
}
