//! Activity type enum shared across all demand-related crates.

/// What an agent does at a location.
///
/// `Home`, `Work` and `School` are *anchor* activities: their location is
/// fixed per agent at population-synthesis time.  The remaining types are
/// *flexible* and resolved trip-by-trip through destination choice.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    Home,
    Work,
    Business,
    School,
    Shopping,
    Other,
}

impl ActivityType {
    /// Number of variants; attraction vectors are `[f64; ActivityType::COUNT]`.
    pub const COUNT: usize = 6;

    /// All variants in attraction-vector index order.
    pub const ALL: [ActivityType; Self::COUNT] = [
        ActivityType::Home,
        ActivityType::Work,
        ActivityType::Business,
        ActivityType::School,
        ActivityType::Shopping,
        ActivityType::Other,
    ];

    /// Index into per-activity arrays (`[f64; COUNT]`).
    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    /// `true` for activities whose location is fixed per agent.
    #[inline]
    pub fn is_anchor(self) -> bool {
        matches!(
            self,
            ActivityType::Home | ActivityType::Work | ActivityType::School
        )
    }

    /// Human-readable label, used in output files and config parsing.
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::Home     => "HOME",
            ActivityType::Work     => "WORK",
            ActivityType::Business => "BUSINESS",
            ActivityType::School   => "SCHOOL",
            ActivityType::Shopping => "SHOPPING",
            ActivityType::Other    => "OTHER",
        }
    }

    /// Parse the label produced by [`as_str`][Self::as_str] (case-insensitive).
    pub fn parse(s: &str) -> Option<ActivityType> {
        match s.to_ascii_uppercase().as_str() {
            "HOME"     => Some(ActivityType::Home),
            "WORK"     => Some(ActivityType::Work),
            "BUSINESS" => Some(ActivityType::Business),
            "SCHOOL"   => Some(ActivityType::School),
            "SHOPPING" => Some(ActivityType::Shopping),
            "OTHER"    => Some(ActivityType::Other),
            _          => None,
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
