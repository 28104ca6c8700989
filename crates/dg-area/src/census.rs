//! Census loading and population distribution onto buildings.
//!
//! Each census feature is a polygon with a `population` count.  The count
//! is split across the residential-plausible buildings inside the polygon:
//! buildings are shuffled with a seeded RNG, each receives
//! `ceil(P / N)`, and the running remainder is clipped so the distributed
//! total is exactly `P`.

use std::path::Path;

use geo::{Geometry, MultiPolygon};

use dg_core::{Building, DemandRng, TransverseMercator};

use crate::{AreaError, AreaResult, BuildingIndex};

/// One census polygon with its population count, projected to the model CRS.
pub struct CensusEntry {
    pub geometry: MultiPolygon<f64>,
    pub population: f64,
}

/// Read census polygons from a GeoJSON file (EPSG:4326) and project them.
///
/// The population property may be named `population` or `POP`.
pub fn load_census(path: &Path, tm: &TransverseMercator) -> AreaResult<Vec<CensusEntry>> {
    let raw = std::fs::read_to_string(path)?;
    let gj: geojson::GeoJson = raw
        .parse()
        .map_err(|e: geojson::Error| AreaError::GeoJson(e.to_string()))?;

    let geojson::GeoJson::FeatureCollection(fc) = gj else {
        return Err(AreaError::GeoJson(
            "census file must be a FeatureCollection".into(),
        ));
    };

    let mut entries = Vec::with_capacity(fc.features.len());
    for feature in fc.features {
        let population = feature
            .properties
            .as_ref()
            .and_then(|p| p.get("population").or_else(|| p.get("POP")))
            .and_then(|v| v.as_f64())
            .ok_or_else(|| AreaError::Census("feature lacks a population property".into()))?;

        let Some(geometry) = feature.geometry else {
            continue;
        };
        let geom: Geometry<f64> = geometry
            .value
            .try_into()
            .map_err(|e: geojson::Error| AreaError::GeoJson(e.to_string()))?;
        let mp = crate::build::to_multipolygon(geom)
            .ok_or_else(|| AreaError::Census("census feature is not polygonal".into()))?;

        entries.push(CensusEntry {
            geometry: crate::build::project_multipolygon(&mp, tm),
            population,
        });
    }
    Ok(entries)
}

/// Distribute census population onto buildings in place.
///
/// `share` scales every polygon's population before distribution
/// (`--share_pop`).  Buildings outside every census polygon keep zero
/// population.
pub fn apply_census(
    buildings: &mut [Building],
    index: &BuildingIndex,
    census: &[CensusEntry],
    share: f64,
    rng: &mut DemandRng,
) {
    for entry in census {
        let total = (entry.population * share).round();
        if total <= 0.0 {
            continue;
        }
        let mut ids = index.buildings_in(&entry.geometry);
        if ids.is_empty() {
            continue;
        }
        rng.shuffle(&mut ids);

        let per_building = (total / ids.len() as f64).ceil();
        let mut remaining = total;
        for id in ids {
            let p = per_building.min(remaining);
            buildings[id.index()].population += p;
            remaining -= p;
            if remaining <= 0.0 {
                break;
            }
        }
    }
}
