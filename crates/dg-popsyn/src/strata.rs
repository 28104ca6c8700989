//! Population strata: loading, validation, and per-stratum sampling.

use serde::Deserialize;

use dg_core::{CumulativeDist, DemandRng, HomogeneousGroup, MobilityGroup, Sex};

use crate::{PopError, PopResult};

const EMBEDDED: &str = include_str!("../data/default_population.json");

/// Tolerance for sum-to-one checks on configured shares.
const SHARE_TOL: f64 = 1e-9;

// ── JSON schema ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawStrata {
    strata: Vec<Stratum>,
}

/// Age distribution: bin upper bounds with per-bin shares plus an
/// undefined-age share; everything sums to one.
#[derive(Clone, Deserialize)]
pub struct AgeDistribution {
    pub upper_bounds: Vec<u32>,
    pub shares: Vec<f64>,
    pub undefined_share: f64,
}

#[derive(Clone, Deserialize)]
pub struct GroupShares {
    #[serde(default)]
    pub working: f64,
    #[serde(default)]
    pub non_working: f64,
    #[serde(default)]
    pub pupil_student: f64,
    #[serde(default)]
    pub undefined: f64,
}

#[derive(Clone, Deserialize)]
pub struct MobilityShares {
    #[serde(default)]
    pub car_user: f64,
    #[serde(default)]
    pub car_mixed: f64,
    #[serde(default)]
    pub no_car: f64,
    #[serde(default)]
    pub undefined: f64,
}

#[derive(Clone, Deserialize)]
pub struct SexShares {
    #[serde(default)]
    pub male: f64,
    #[serde(default)]
    pub female: f64,
    #[serde(default)]
    pub undefined: f64,
}

/// One demographic bucket of the population.
#[derive(Clone, Deserialize)]
pub struct Stratum {
    pub name: String,
    pub share: f64,
    pub age: AgeDistribution,
    pub car_ownership: f64,
    pub homogeneous_group: GroupShares,
    pub mobility_group: MobilityShares,
    pub sex: SexShares,
}

impl Stratum {
    pub fn hom_shares(&self) -> [(HomogeneousGroup, f64); 4] {
        [
            (HomogeneousGroup::Working, self.homogeneous_group.working),
            (HomogeneousGroup::NonWorking, self.homogeneous_group.non_working),
            (HomogeneousGroup::PupilStudent, self.homogeneous_group.pupil_student),
            (HomogeneousGroup::Undefined, self.homogeneous_group.undefined),
        ]
    }

    pub fn mob_shares(&self) -> [(MobilityGroup, f64); 4] {
        [
            (MobilityGroup::CarUser, self.mobility_group.car_user),
            (MobilityGroup::CarMixed, self.mobility_group.car_mixed),
            (MobilityGroup::NoCar, self.mobility_group.no_car),
            (MobilityGroup::Undefined, self.mobility_group.undefined),
        ]
    }

    pub fn sex_shares(&self) -> [(Sex, f64); 3] {
        [
            (Sex::Male, self.sex.male),
            (Sex::Female, self.sex.female),
            (Sex::Undefined, self.sex.undefined),
        ]
    }

    /// Draw an exact age within bin `bin` (or `None` for the undefined
    /// bin).  Bin `i` covers `(upper_bounds[i-1], upper_bounds[i]]`, with
    /// bin 0 starting at 0.
    pub fn sample_age_in_bin(&self, bin: Option<usize>, rng: &mut DemandRng) -> Option<u32> {
        let bin = bin?;
        let hi = self.age.upper_bounds[bin];
        let lo = if bin == 0 {
            0
        } else {
            self.age.upper_bounds[bin - 1] + 1
        };
        Some(rng.gen_range(lo..=hi))
    }
}

// ── PopulationStrata ──────────────────────────────────────────────────────────

/// The validated strata set plus the cumulative stratum distribution.
pub struct PopulationStrata {
    pub strata: Vec<Stratum>,
    pub stratum_cum: CumulativeDist,
}

impl PopulationStrata {
    /// Load the strata packaged with the crate.
    pub fn embedded() -> PopResult<Self> {
        Self::from_json(EMBEDDED)
    }

    /// Load from a user-supplied population file.
    pub fn from_file(path: &std::path::Path) -> PopResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> PopResult<Self> {
        let parsed: RawStrata =
            serde_json::from_str(raw).map_err(|e| PopError::Json(e.to_string()))?;
        let strata = parsed.strata;
        if strata.is_empty() {
            return Err(PopError::Config("population file defines no strata".into()));
        }
        validate(&strata)?;

        let shares: Vec<f64> = strata.iter().map(|s| s.share).collect();
        let stratum_cum = CumulativeDist::new(&shares)
            .map_err(|_| PopError::Config("all stratum shares are zero".into()))?;

        Ok(Self { strata, stratum_cum })
    }
}

/// Validate every sum-to-one invariant; violations abort at startup.
fn validate(strata: &[Stratum]) -> PopResult<()> {
    let total: f64 = strata.iter().map(|s| s.share).sum();
    if (total - 1.0).abs() > SHARE_TOL {
        return Err(PopError::Config(format!(
            "stratum shares sum to {total}, expected 1"
        )));
    }

    for s in strata {
        if !(0.0..=1.0).contains(&s.car_ownership) {
            return Err(PopError::Config(format!(
                "stratum {:?}: car_ownership {} outside [0, 1]",
                s.name, s.car_ownership
            )));
        }
        if s.age.upper_bounds.len() != s.age.shares.len() {
            return Err(PopError::Config(format!(
                "stratum {:?}: {} age bounds but {} shares",
                s.name,
                s.age.upper_bounds.len(),
                s.age.shares.len()
            )));
        }
        if !s.age.upper_bounds.is_sorted() {
            return Err(PopError::Config(format!(
                "stratum {:?}: age bounds not ascending",
                s.name
            )));
        }

        let checks: [(&str, f64); 4] = [
            (
                "age",
                s.age.shares.iter().sum::<f64>() + s.age.undefined_share,
            ),
            ("homogeneous_group", s.hom_shares().iter().map(|(_, v)| v).sum()),
            ("mobility_group", s.mob_shares().iter().map(|(_, v)| v).sum()),
            ("sex", s.sex_shares().iter().map(|(_, v)| v).sum()),
        ];
        for (what, sum) in checks {
            if (sum - 1.0).abs() > SHARE_TOL {
                return Err(PopError::Config(format!(
                    "stratum {:?}: {what} distribution sums to {sum}, expected 1",
                    s.name
                )));
            }
        }
    }
    Ok(())
}
