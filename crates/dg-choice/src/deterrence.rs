//! Calibrated log-normal distance deterrence per region type and activity.
//!
//! The parameter table ships with the crate (`data/distance_distributions.
//! json`) and was fitted against household-travel-survey trip length
//! distributions, stratified by a RegioStar7-like settlement class.

use rustc_hash::FxHashMap;
use serde::Deserialize;

use dg_core::ActivityType;

use crate::{ChoiceError, ChoiceResult};

const EMBEDDED: &str = include_str!("../data/distance_distributions.json");

// ── JSON schema ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawTable {
    regions: Vec<RawRegion>,
}

#[derive(Deserialize)]
struct RawRegion {
    region_type: u8,
    activities: FxHashMap<String, RawParams>,
}

#[derive(Deserialize)]
struct RawParams {
    shape: f64,
    scale_m: f64,
}

// ── DistanceDistributions ─────────────────────────────────────────────────────

/// Log-normal parameters: `shape` is σ, `scale_m` is the median in meters.
#[derive(Copy, Clone, Debug)]
pub struct LogNormalParams {
    pub shape: f64,
    pub scale_m: f64,
}

impl LogNormalParams {
    /// Log-normal density at `x` meters.
    ///
    /// The argument is clamped to the smallest positive double so a
    /// zero-distance query (same cell twice, degenerate geometry) never
    /// evaluates `ln 0`.
    #[inline]
    pub fn density(&self, x_m: f64) -> f64 {
        let x = x_m.max(f64::MIN_POSITIVE);
        let z = (x / self.scale_m).ln() / self.shape;
        (-0.5 * z * z).exp() / (x * self.shape * (2.0 * std::f64::consts::PI).sqrt())
    }
}

/// The full (region type × activity) deterrence table.
pub struct DistanceDistributions {
    /// `params[region_type - 1][activity.index()]`.
    params: Vec<[LogNormalParams; ActivityType::COUNT]>,
}

impl DistanceDistributions {
    /// Load the table packaged with the crate.
    ///
    /// A parse failure here is a packaging defect, not a runtime
    /// condition, and aborts with context.
    pub fn embedded() -> Self {
        Self::from_json(EMBEDDED).expect("embedded distance distribution table is invalid")
    }

    /// Parse a table from JSON (used by tests and data overrides).
    pub fn from_json(raw: &str) -> ChoiceResult<Self> {
        let table: RawTable =
            serde_json::from_str(raw).map_err(|e| ChoiceError::Deterrence(e.to_string()))?;

        let mut by_region: FxHashMap<u8, [LogNormalParams; ActivityType::COUNT]> =
            FxHashMap::default();
        for region in &table.regions {
            let mut row = [LogNormalParams { shape: 1.0, scale_m: 1_000.0 }; ActivityType::COUNT];
            for t in ActivityType::ALL {
                let raw = region.activities.get(t.as_str()).ok_or_else(|| {
                    ChoiceError::Deterrence(format!(
                        "region {} lacks parameters for {t}",
                        region.region_type
                    ))
                })?;
                if raw.shape <= 0.0 || raw.scale_m <= 0.0 {
                    return Err(ChoiceError::Deterrence(format!(
                        "non-positive parameters for region {} {t}",
                        region.region_type
                    )));
                }
                row[t.index()] = LogNormalParams {
                    shape: raw.shape,
                    scale_m: raw.scale_m,
                };
            }
            by_region.insert(region.region_type, row);
        }

        let params = (1..=7u8)
            .map(|r| {
                by_region
                    .get(&r)
                    .copied()
                    .ok_or_else(|| ChoiceError::Deterrence(format!("region type {r} missing")))
            })
            .collect::<ChoiceResult<Vec<_>>>()?;

        Ok(Self { params })
    }

    /// Deterrence density for a trip of `distance_m` meters starting in a
    /// `region_type` area.
    #[inline]
    pub fn density(&self, region_type: u8, activity: ActivityType, distance_m: f64) -> f64 {
        let row = &self.params[(region_type.clamp(1, 7) - 1) as usize];
        row[activity.index()].density(distance_m)
    }

    pub fn params(&self, region_type: u8, activity: ActivityType) -> LogNormalParams {
        self.params[(region_type.clamp(1, 7) - 1) as usize][activity.index()]
    }
}
