//! Persistence of the assembled building list as GeoJSON.
//!
//! Re-running on the same area skips the OSM stream entirely: the cache key
//! encodes the focus bounds, the buffer radius, and the census file
//! identity, so any input change invalidates the cache naturally.

use std::path::{Path, PathBuf};

use geo::{BoundingRect, MultiPolygon};
use geojson::{Feature, FeatureCollection, GeoJson};
use serde_json::{json, Map, Value};

use dg_core::{
    ActivityType, Building, BuildingId, CellId, Landuse, LatLon, PoiCounts, ProjPoint,
    TransverseMercator,
};

use crate::{AreaError, AreaResult};

/// Directory (under the run's cache dir) holding `buildings.geojson` for
/// one (focus bounds, buffer, census) combination.
pub fn area_cache_dir(
    cache_dir: &Path,
    focus_latlon: &MultiPolygon<f64>,
    buffer_m: f64,
    census_identity: &str,
) -> PathBuf {
    let bbox = focus_latlon.bounding_rect();
    let key = match bbox {
        Some(r) => format!(
            "AreaBounds{:.5}_{:.5}_{:.5}_{:.5}-B{:.0}-C{}",
            r.min().y,
            r.min().x,
            r.max().y,
            r.max().x,
            buffer_m,
            census_identity
        ),
        None => "AreaBoundsEmpty".to_string(),
    };
    cache_dir.join(key)
}

/// Write `buildings` as a point FeatureCollection.
///
/// A cache-write failure is reported to the caller, who logs it and keeps
/// going — the cache is an optimization, never a correctness requirement.
pub fn save_buildings_geojson(path: &Path, buildings: &[Building]) -> AreaResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let features: Vec<Feature> = buildings
        .iter()
        .map(|b| {
            let mut props = Map::new();
            props.insert("area_m2".into(), json!(b.area_m2));
            props.insert("population".into(), json!(b.population));
            props.insert("landuse".into(), json!(b.landuse.as_str()));
            props.insert("shops".into(), json!(b.poi.shops));
            props.insert("offices".into(), json!(b.poi.offices));
            props.insert("education".into(), json!(b.poi.education));
            props.insert("leisure".into(), json!(b.poi.leisure));
            props.insert("in_focus".into(), json!(b.in_focus));
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![
                    b.latlon.lon,
                    b.latlon.lat,
                ]))),
                id: None,
                properties: Some(props),
                foreign_members: None,
            }
        })
        .collect();

    let fc = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    std::fs::write(path, GeoJson::from(fc).to_string())?;
    Ok(())
}

/// Load a building list written by [`save_buildings_geojson`].
///
/// Coordinates are re-projected through `tm` so the cache stays valid even
/// though only lat-lon is persisted.
pub fn load_buildings_geojson(
    path: &Path,
    tm: &TransverseMercator,
) -> AreaResult<Vec<Building>> {
    let raw = std::fs::read_to_string(path)?;
    let gj: GeoJson = raw
        .parse()
        .map_err(|e: geojson::Error| AreaError::GeoJson(e.to_string()))?;
    let GeoJson::FeatureCollection(fc) = gj else {
        return Err(AreaError::Cache("building cache is not a FeatureCollection".into()));
    };

    let get_f64 = |props: &Map<String, Value>, key: &str| -> f64 {
        props.get(key).and_then(Value::as_f64).unwrap_or_default()
    };
    let get_u32 = |props: &Map<String, Value>, key: &str| -> u32 {
        props.get(key).and_then(Value::as_u64).unwrap_or_default() as u32
    };

    let mut buildings = Vec::with_capacity(fc.features.len());
    for (i, feature) in fc.features.into_iter().enumerate() {
        let Some(geometry) = feature.geometry else {
            continue;
        };
        let geojson::Value::Point(xy) = geometry.value else {
            return Err(AreaError::Cache("building cache feature is not a Point".into()));
        };
        let latlon = LatLon::new(xy[1], xy[0]);
        let proj = tm.to_model(latlon);
        let props = feature.properties.unwrap_or_default();

        buildings.push(Building {
            id: BuildingId(i as u32),
            coord: ProjPoint::new(proj.x, proj.y),
            latlon,
            area_m2: get_f64(&props, "area_m2"),
            population: get_f64(&props, "population"),
            landuse: props
                .get("landuse")
                .and_then(Value::as_str)
                .map(Landuse::parse)
                .unwrap_or_default(),
            poi: PoiCounts {
                shops: get_u32(&props, "shops"),
                offices: get_u32(&props, "offices"),
                education: get_u32(&props, "education"),
                leisure: get_u32(&props, "leisure"),
            },
            in_focus: props
                .get("in_focus")
                .and_then(Value::as_bool)
                .unwrap_or_default(),
            od_zone: None,
            cell: CellId::INVALID,
            attraction: [0.0; ActivityType::COUNT],
        });
    }
    Ok(buildings)
}
