//! The activity data store: conditional distributions of activity chains
//! and dwell times.
//!
//! # Keying and fallback
//!
//! Buckets are keyed by `(weekday, homogeneous group, mobility group, age
//! group)`.  A query falls back by progressively setting key components to
//! `Undefined` in this fixed order: **age, then mobility group, then
//! homogeneous group, then weekday**.  A bucket is also skipped when its
//! survey `sample_size` is below [`MIN_SAMPLE_SIZE`] — a thin bucket is
//! worse than a broader one.
//!
//! The all-undefined bucket is the floor of the hierarchy and must cover
//! both from-activities; its absence is a data-integrity error at load
//! time, not a runtime condition.

use rustc_hash::FxHashMap;
use serde::Deserialize;

use dg_core::{ActivityType, AgeGroup, GaussianMixture, HomogeneousGroup, MobilityGroup, Weekday};

use crate::{PopError, PopResult};

const EMBEDDED: &str = include_str!("../data/activity_groups.json");

/// Buckets with fewer underlying observations fall through to the next
/// hierarchy level.
pub const MIN_SAMPLE_SIZE: u32 = 280;

// ── Keys ──────────────────────────────────────────────────────────────────────

/// Which activity the chain starts from.  Anchored days start from HOME;
/// carried-over days from anything else collapse onto OTHER.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum FromActivity {
    Home,
    Other,
}

impl FromActivity {
    pub fn classify(t: ActivityType) -> FromActivity {
        if t == ActivityType::Home {
            FromActivity::Home
        } else {
            FromActivity::Other
        }
    }
}

/// Full bucket key.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct BucketKey {
    pub weekday: Weekday,
    pub hom_group: HomogeneousGroup,
    pub mob_group: MobilityGroup,
    pub age_group: AgeGroup,
}

impl BucketKey {
    /// The fallback sequence from `self` down to the all-undefined key.
    fn fallback_chain(self) -> [BucketKey; 5] {
        let mut k = self;
        let k0 = k;
        k.age_group = AgeGroup::Undefined;
        let k1 = k;
        k.mob_group = MobilityGroup::Undefined;
        let k2 = k;
        k.hom_group = HomogeneousGroup::Undefined;
        let k3 = k;
        k.weekday = Weekday::Undefined;
        let k4 = k;
        [k0, k1, k2, k3, k4]
    }

    pub const ALL_UNDEFINED: BucketKey = BucketKey {
        weekday: Weekday::Undefined,
        hom_group: HomogeneousGroup::Undefined,
        mob_group: MobilityGroup::Undefined,
        age_group: AgeGroup::Undefined,
    };
}

// ── Bucket contents ───────────────────────────────────────────────────────────

/// One candidate activity chain with its sampling weight and the dwell-time
/// mixture (dimension = chain length − 1; the last activity is open-ended).
pub struct ChainOption {
    pub chain: Vec<ActivityType>,
    pub weight: f64,
    pub dwell: Option<GaussianMixture>,
}

pub struct Bucket {
    pub sample_size: u32,
    pub from_home: Vec<ChainOption>,
    pub from_other: Vec<ChainOption>,
}

impl Bucket {
    fn chains(&self, from: FromActivity) -> &[ChainOption] {
        match from {
            FromActivity::Home => &self.from_home,
            FromActivity::Other => &self.from_other,
        }
    }
}

// ── JSON schema ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawStore {
    groups: Vec<RawGroup>,
}

#[derive(Deserialize)]
struct RawGroup {
    weekday: String,
    homogeneous_group: String,
    mobility_group: String,
    age_group: String,
    sample_size: u32,
    from_home: Vec<RawChain>,
    from_other: Vec<RawChain>,
}

#[derive(Deserialize)]
struct RawChain {
    chain: Vec<String>,
    weight: f64,
    dwell: Option<RawMixture>,
}

#[derive(Deserialize)]
struct RawMixture {
    weights: Vec<f64>,
    means: Vec<Vec<f64>>,
    covariances: Vec<Vec<f64>>,
}

// ── ActivityDataStore ─────────────────────────────────────────────────────────

/// Immutable store shared across worker threads.
pub struct ActivityDataStore {
    buckets: FxHashMap<BucketKey, Bucket>,
}

impl ActivityDataStore {
    /// Load the data packaged with the crate.
    pub fn embedded() -> PopResult<Self> {
        Self::from_json(EMBEDDED)
    }

    /// Load a user-supplied activity-group file.
    pub fn from_file(path: &std::path::Path) -> PopResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> PopResult<Self> {
        let parsed: RawStore =
            serde_json::from_str(raw).map_err(|e| PopError::Json(e.to_string()))?;

        let mut buckets = FxHashMap::default();
        for group in parsed.groups {
            let key = BucketKey {
                weekday: Weekday::parse(&group.weekday).ok_or_else(|| {
                    PopError::DataIntegrity(format!("unknown weekday {:?}", group.weekday))
                })?,
                hom_group: parse_hom(&group.homogeneous_group)?,
                mob_group: parse_mob(&group.mobility_group)?,
                age_group: parse_age(&group.age_group)?,
            };
            let bucket = Bucket {
                sample_size: group.sample_size,
                from_home: build_chains(group.from_home)?,
                from_other: build_chains(group.from_other)?,
            };
            if buckets.insert(key, bucket).is_some() {
                return Err(PopError::DataIntegrity(format!("duplicate bucket {key:?}")));
            }
        }

        let store = Self { buckets };
        store.validate()?;
        Ok(store)
    }

    /// The all-undefined bucket must exist, be large enough to never fall
    /// through, and cover both from-activities.
    fn validate(&self) -> PopResult<()> {
        let Some(floor) = self.buckets.get(&BucketKey::ALL_UNDEFINED) else {
            return Err(PopError::DataIntegrity(
                "activity data lacks the all-undefined bucket".into(),
            ));
        };
        if floor.sample_size < MIN_SAMPLE_SIZE {
            return Err(PopError::DataIntegrity(format!(
                "all-undefined bucket sample size {} is below {MIN_SAMPLE_SIZE}",
                floor.sample_size
            )));
        }
        if floor.from_home.is_empty() || floor.from_other.is_empty() {
            return Err(PopError::DataIntegrity(
                "all-undefined bucket must cover both from-activities".into(),
            ));
        }
        Ok(())
    }

    /// Resolve `key` through the fallback hierarchy and return the chain
    /// candidates for `from`.
    ///
    /// Guaranteed non-empty: [`validate`](Self::validate) pinned the
    /// all-undefined floor at load time.
    pub fn chains(&self, key: BucketKey, from: FromActivity) -> &[ChainOption] {
        for candidate in key.fallback_chain() {
            if let Some(bucket) = self.buckets.get(&candidate) {
                if bucket.sample_size >= MIN_SAMPLE_SIZE && !bucket.chains(from).is_empty() {
                    return bucket.chains(from);
                }
            }
        }
        // Unreachable in a validated store; kept as a hard failure rather
        // than a silent empty slice.
        panic!("activity data store: no bucket resolved for {key:?}");
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

// ── Builders & parsers ────────────────────────────────────────────────────────

fn build_chains(raw: Vec<RawChain>) -> PopResult<Vec<ChainOption>> {
    raw.into_iter()
        .map(|c| {
            let chain: Vec<ActivityType> = c
                .chain
                .iter()
                .map(|s| {
                    ActivityType::parse(s).ok_or_else(|| {
                        PopError::DataIntegrity(format!("unknown activity {s:?} in chain"))
                    })
                })
                .collect::<PopResult<_>>()?;
            if chain.is_empty() {
                return Err(PopError::DataIntegrity("empty activity chain".into()));
            }

            let dwell = match c.dwell {
                None => None,
                Some(m) => {
                    let gmm = GaussianMixture::new(&m.weights, m.means, m.covariances)
                        .map_err(PopError::Core)?;
                    if gmm.dim() != chain.len() - 1 {
                        return Err(PopError::DataIntegrity(format!(
                            "dwell mixture dimension {} does not match chain length {}",
                            gmm.dim(),
                            chain.len()
                        )));
                    }
                    Some(gmm)
                }
            };
            // A multi-activity chain needs dwell times for every activity
            // but the last.
            if dwell.is_none() && chain.len() > 1 {
                return Err(PopError::DataIntegrity(format!(
                    "chain {chain:?} lacks a dwell-time mixture"
                )));
            }
            Ok(ChainOption { chain, weight: c.weight, dwell })
        })
        .collect()
}

fn parse_hom(s: &str) -> PopResult<HomogeneousGroup> {
    match s {
        "working"       => Ok(HomogeneousGroup::Working),
        "non_working"   => Ok(HomogeneousGroup::NonWorking),
        "pupil_student" => Ok(HomogeneousGroup::PupilStudent),
        "undefined"     => Ok(HomogeneousGroup::Undefined),
        _ => Err(PopError::DataIntegrity(format!("unknown homogeneous group {s:?}"))),
    }
}

fn parse_mob(s: &str) -> PopResult<MobilityGroup> {
    match s {
        "car_user"  => Ok(MobilityGroup::CarUser),
        "car_mixed" => Ok(MobilityGroup::CarMixed),
        "no_car"    => Ok(MobilityGroup::NoCar),
        "undefined" => Ok(MobilityGroup::Undefined),
        _ => Err(PopError::DataIntegrity(format!("unknown mobility group {s:?}"))),
    }
}

fn parse_age(s: &str) -> PopResult<AgeGroup> {
    match s {
        "under_18"     => Ok(AgeGroup::Under18),
        "from_18_to_29" => Ok(AgeGroup::From18To29),
        "from_30_to_39" => Ok(AgeGroup::From30To39),
        "from_40_to_49" => Ok(AgeGroup::From40To49),
        "from_50_to_59" => Ok(AgeGroup::From50To59),
        "from_60_to_69" => Ok(AgeGroup::From60To69),
        "from_70"      => Ok(AgeGroup::From70),
        "undefined"    => Ok(AgeGroup::Undefined),
        _ => Err(PopError::DataIntegrity(format!("unknown age group {s:?}"))),
    }
}
