//! Weekday enum and the day-succession rule used by the simulation loop.

/// Day type of a simulated day.
///
/// `Holiday` and `Undefined` are absorbing under [`next`][Weekday::next]:
/// a run started on `Holiday` continues `Undefined` forever, and a run
/// started `Undefined` stays `Undefined`.  `Undefined` selects the
/// day-agnostic activity distributions.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Weekday {
    #[default]
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
    Holiday,
    Undefined,
}

impl Weekday {
    /// The day following `self`.
    ///
    /// Mo→Tu→…→Su→Mo; `Holiday` and `Undefined` both map to `Undefined`.
    pub fn next(self) -> Weekday {
        match self {
            Weekday::Monday    => Weekday::Tuesday,
            Weekday::Tuesday   => Weekday::Wednesday,
            Weekday::Wednesday => Weekday::Thursday,
            Weekday::Thursday  => Weekday::Friday,
            Weekday::Friday    => Weekday::Saturday,
            Weekday::Saturday  => Weekday::Sunday,
            Weekday::Sunday    => Weekday::Monday,
            Weekday::Holiday | Weekday::Undefined => Weekday::Undefined,
        }
    }

    /// Short label used in config parsing and output files.
    pub fn as_str(self) -> &'static str {
        match self {
            Weekday::Monday    => "MO",
            Weekday::Tuesday   => "TU",
            Weekday::Wednesday => "WE",
            Weekday::Thursday  => "TH",
            Weekday::Friday    => "FR",
            Weekday::Saturday  => "SA",
            Weekday::Sunday    => "SU",
            Weekday::Holiday   => "HO",
            Weekday::Undefined => "UNDEFINED",
        }
    }

    /// Parse the label produced by [`as_str`][Self::as_str] (case-insensitive).
    pub fn parse(s: &str) -> Option<Weekday> {
        match s.to_ascii_uppercase().as_str() {
            "MO"        => Some(Weekday::Monday),
            "TU"        => Some(Weekday::Tuesday),
            "WE"        => Some(Weekday::Wednesday),
            "TH"        => Some(Weekday::Thursday),
            "FR"        => Some(Weekday::Friday),
            "SA"        => Some(Weekday::Saturday),
            "SU"        => Some(Weekday::Sunday),
            "HO"        => Some(Weekday::Holiday),
            "UNDEFINED" => Some(Weekday::Undefined),
            _           => None,
        }
    }
}

impl std::fmt::Display for Weekday {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
