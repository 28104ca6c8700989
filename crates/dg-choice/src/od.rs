//! OD-matrix GeoJSON parsing, zone stamping, and dummy-location creation.
//!
//! # Input format
//!
//! A FeatureCollection where each feature is one zone polygon with
//! properties:
//!
//! - `name` — unique zone identifier,
//! - `origin_activity` / `destination_activity` — activity labels
//!   (only `HOME` → `WORK` is accepted, see the calibrator),
//! - `destinations` — object mapping destination zone names to flows.

use std::path::Path;

use geo::{Centroid, Intersects, MultiPolygon};
use rustc_hash::FxHashMap;

use dg_area::{build as area_build, BuildingIndex};
use dg_core::{
    ActivityType, DummyId, DummyZone, LatLon, LocationArena, ProjPoint, TransverseMercator, ZoneId,
};

use crate::{ChoiceError, ChoiceResult};

// ── Types ─────────────────────────────────────────────────────────────────────

/// One OD zone: a named polygon with outgoing flows.
pub struct OdZone {
    pub id: ZoneId,
    pub name: String,
    /// Zone polygon in the model CRS.
    pub polygon: MultiPolygon<f64>,
    pub centroid: ProjPoint,
    pub latlon: LatLon,
    /// Outgoing flows keyed by destination `ZoneId`; non-negative.
    pub flows: FxHashMap<ZoneId, f64>,
    /// `true` when the zone polygon intersects the focus area.
    pub overlaps_focus: bool,
}

/// The parsed flow table.
pub struct OdMatrix {
    pub zones: Vec<OdZone>,
    pub origin_activity: ActivityType,
    pub destination_activity: ActivityType,
}

impl OdMatrix {
    pub fn zone(&self, id: ZoneId) -> &OdZone {
        &self.zones[id.index()]
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse an OD GeoJSON file (EPSG:4326) into the model CRS.
///
/// Rejects activity pairs other than HOME→WORK, negative flows, and
/// duplicate zone names — all configuration errors that abort the run.
pub fn load_od_matrix(
    path: &Path,
    tm: &TransverseMercator,
    focus: &MultiPolygon<f64>,
) -> ChoiceResult<OdMatrix> {
    let raw = std::fs::read_to_string(path)?;
    parse_od_matrix(&raw, tm, focus)
}

/// [`load_od_matrix`] over an in-memory string (testing seam).
pub fn parse_od_matrix(
    raw: &str,
    tm: &TransverseMercator,
    focus: &MultiPolygon<f64>,
) -> ChoiceResult<OdMatrix> {
    let gj: geojson::GeoJson = raw
        .parse()
        .map_err(|e: geojson::Error| ChoiceError::GeoJson(e.to_string()))?;
    let geojson::GeoJson::FeatureCollection(fc) = gj else {
        return Err(ChoiceError::Od("OD file must be a FeatureCollection".into()));
    };

    // First pass: names, geometry, raw flow maps.
    let mut name_to_id: FxHashMap<String, ZoneId> = FxHashMap::default();
    let mut zones: Vec<OdZone> = Vec::new();
    let mut raw_flows: Vec<FxHashMap<String, f64>> = Vec::new();
    let mut origin_activity: Option<ActivityType> = None;
    let mut destination_activity: Option<ActivityType> = None;

    for feature in fc.features {
        let props = feature
            .properties
            .ok_or_else(|| ChoiceError::Od("zone feature lacks properties".into()))?;
        let name = props
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ChoiceError::Od("zone feature lacks a name".into()))?
            .to_string();
        if name_to_id.contains_key(&name) {
            return Err(ChoiceError::Od(format!("duplicate zone name {name:?}")));
        }

        let o = parse_activity(&props, "origin_activity")?;
        let d = parse_activity(&props, "destination_activity")?;
        if o != ActivityType::Home || d != ActivityType::Work {
            return Err(ChoiceError::UnsupportedOdPair {
                origin: o.to_string(),
                destination: d.to_string(),
            });
        }
        origin_activity = Some(o);
        destination_activity = Some(d);

        let mut flows: FxHashMap<String, f64> = FxHashMap::default();
        if let Some(dest_obj) = props.get("destinations").and_then(|v| v.as_object()) {
            for (dest_name, value) in dest_obj {
                let flow = value
                    .as_f64()
                    .ok_or_else(|| ChoiceError::Od(format!("non-numeric flow in {name:?}")))?;
                if flow < 0.0 {
                    return Err(ChoiceError::Od(format!(
                        "negative flow {flow} from {name:?} to {dest_name:?}"
                    )));
                }
                flows.insert(dest_name.clone(), flow);
            }
        }

        let geometry = feature
            .geometry
            .ok_or_else(|| ChoiceError::Od(format!("zone {name:?} lacks geometry")))?;
        let geom: geo::Geometry<f64> = geometry
            .value
            .try_into()
            .map_err(|e: geojson::Error| ChoiceError::GeoJson(e.to_string()))?;
        let mp = area_build::to_multipolygon(geom)
            .ok_or_else(|| ChoiceError::Od(format!("zone {name:?} is not polygonal")))?;
        let polygon = area_build::project_multipolygon(&mp, tm);

        let centroid = polygon
            .centroid()
            .map(|c| ProjPoint::new(c.x(), c.y()))
            .ok_or_else(|| ChoiceError::Od(format!("zone {name:?} has empty geometry")))?;

        let id = ZoneId(zones.len() as u16);
        name_to_id.insert(name.clone(), id);
        zones.push(OdZone {
            id,
            name,
            overlaps_focus: polygon.intersects(focus),
            latlon: tm.to_latlon(centroid),
            centroid,
            polygon,
            flows: FxHashMap::default(),
        });
        raw_flows.push(flows);
    }

    // Second pass: resolve destination names now that every zone has an ID.
    for (zone, flows) in zones.iter_mut().zip(raw_flows) {
        for (dest_name, flow) in flows {
            let dest = *name_to_id.get(&dest_name).ok_or_else(|| {
                ChoiceError::Od(format!(
                    "zone {:?} references unknown destination {dest_name:?}",
                    zone.name
                ))
            })?;
            zone.flows.insert(dest, flow);
        }
    }

    let (Some(origin_activity), Some(destination_activity)) =
        (origin_activity, destination_activity)
    else {
        return Err(ChoiceError::Od("OD file contains no zones".into()));
    };

    Ok(OdMatrix {
        zones,
        origin_activity,
        destination_activity,
    })
}

fn parse_activity(
    props: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> ChoiceResult<ActivityType> {
    let raw = props
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ChoiceError::Od(format!("zone feature lacks {key}")))?;
    ActivityType::parse(raw)
        .ok_or_else(|| ChoiceError::Od(format!("unknown activity {raw:?} in {key}")))
}

// ── Zone stamping ─────────────────────────────────────────────────────────────

/// Stamp zone membership onto buildings and cells, and create a dummy
/// location for every zone without buildings.
///
/// Cells take the modal zone of their members.  Dummies carry the OD
/// matrix's activity pair as their transfer activities.
pub fn stamp_zones(arena: &mut LocationArena, od: &OdMatrix, index: &BuildingIndex) {
    let mut zone_counts: Vec<usize> = vec![0; od.zones.len()];

    for zone in &od.zones {
        let members = index.buildings_in(&zone.polygon);
        zone_counts[zone.id.index()] = members.len();
        for b in members {
            arena.buildings[b.index()].od_zone = Some(zone.id);
        }
    }

    // Modal member zone per cell.
    for cell in &mut arena.cells {
        let mut counts: FxHashMap<ZoneId, usize> = FxHashMap::default();
        for &b in &cell.members {
            if let Some(z) = arena.buildings[b.index()].od_zone {
                *counts.entry(z).or_default() += 1;
            }
        }
        cell.od_zone = counts
            .into_iter()
            // Tie-break on the zone id for determinism.
            .max_by_key(|&(z, n)| (n, std::cmp::Reverse(z)))
            .map(|(z, _)| z);
    }

    // A zone with no buildings still participates in flows: give it a
    // dummy location at its centroid.
    for zone in &od.zones {
        if zone_counts[zone.id.index()] == 0 {
            let id = DummyId(arena.dummies.len() as u32);
            arena.dummies.push(DummyZone {
                id,
                zone: zone.id,
                coord: zone.centroid,
                latlon: zone.latlon,
                transfer_activities: vec![od.origin_activity, od.destination_activity],
            });
            log::debug!("zone {:?} has no buildings; created dummy location", zone.name);
        }
    }
}
