//! Sociodemographic feature types, synthetic agents, and their diaries.

use crate::{ActivityType, AgentId, LocRef, Mode, Weekday};

// ── Demographic categories ────────────────────────────────────────────────────

/// Occupation-based homogeneous group.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomogeneousGroup {
    Working,
    NonWorking,
    PupilStudent,
    #[default]
    Undefined,
}

/// Habitual mobility group.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobilityGroup {
    CarUser,
    CarMixed,
    NoCar,
    #[default]
    Undefined,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    #[default]
    Undefined,
}

/// Age bucket used to key the activity data store.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Under18,
    From18To29,
    From30To39,
    From40To49,
    From50To59,
    From60To69,
    From70,
    #[default]
    Undefined,
}

impl AgeGroup {
    /// Bucket an exact age; `None` maps to `Undefined`.
    pub fn from_age(age: Option<u32>) -> AgeGroup {
        match age {
            None         => AgeGroup::Undefined,
            Some(0..=17) => AgeGroup::Under18,
            Some(18..=29) => AgeGroup::From18To29,
            Some(30..=39) => AgeGroup::From30To39,
            Some(40..=49) => AgeGroup::From40To49,
            Some(50..=59) => AgeGroup::From50To59,
            Some(60..=69) => AgeGroup::From60To69,
            Some(_)      => AgeGroup::From70,
        }
    }
}

/// One draw from the population strata.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct SocioDemFeatures {
    pub hom_group: HomogeneousGroup,
    pub mob_group: MobilityGroup,
    pub age: Option<u32>,
    pub sex: Sex,
}

impl SocioDemFeatures {
    #[inline]
    pub fn age_group(&self) -> AgeGroup {
        AgeGroup::from_age(self.age)
    }
}

// ── Diary structure ───────────────────────────────────────────────────────────

/// One activity in a day plan.
#[derive(Clone, Debug, PartialEq)]
pub struct Activity {
    pub kind: ActivityType,
    /// Dwell time in minutes; `None` marks "until end of day" and is only
    /// valid on the final activity of a diary.
    pub stay_minutes: Option<f64>,
    pub location: LocRef,
}

/// One trip between consecutive activities.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Trip {
    pub mode: Mode,
    pub distance_km: Option<f64>,
    pub time_minutes: Option<f64>,
    /// Route polyline, emitted only with `return_path_coords`.
    pub path_lats: Option<Vec<f64>>,
    pub path_lons: Option<Vec<f64>>,
}

/// One simulated day: activities interleaved (in output) with trips.
///
/// `trips.len() == activities.len() - 1` after trip resolution.
#[derive(Clone, Debug, Default)]
pub struct Diary {
    /// Day index within the run, starting at 0.
    pub day: u32,
    pub day_type: Weekday,
    pub activities: Vec<Activity>,
    pub trips: Vec<Trip>,
}

impl Diary {
    pub fn new(day: u32, day_type: Weekday) -> Self {
        Self {
            day,
            day_type,
            activities: Vec::new(),
            trips: Vec::new(),
        }
    }
}

// ── Agent ─────────────────────────────────────────────────────────────────────

/// A synthetic person with fixed anchors and one diary per simulated day.
///
/// `work` and `school` are assigned for every agent — even when the
/// homogeneous group never visits them — so the simulation loop needs no
/// special cases.
#[derive(Clone, Debug)]
pub struct Agent {
    pub id: AgentId,
    pub features: SocioDemFeatures,
    pub home: LocRef,
    pub work: LocRef,
    pub school: LocRef,
    pub car_access: bool,
    pub diaries: Vec<Diary>,
}
