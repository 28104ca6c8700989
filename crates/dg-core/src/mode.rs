//! Travel mode enum shared across trip resolution and output.

/// The means by which an agent covers one trip.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    CarDriver,
    CarPassenger,
    PublicTransit,
    Bicycle,
    Foot,
    /// Mode not assigned (mode choice disabled).
    #[default]
    Undefined,
}

impl Mode {
    /// All assignable modes, in logit-alternative order.
    pub const CHOICES: [Mode; 5] = [
        Mode::CarDriver,
        Mode::CarPassenger,
        Mode::PublicTransit,
        Mode::Bicycle,
        Mode::Foot,
    ];

    /// `true` for modes that require access to a car.
    #[inline]
    pub fn needs_car(self) -> bool {
        matches!(self, Mode::CarDriver)
    }

    /// Fallback speed in km/h when no route can be computed.
    pub fn fallback_speed_kmh(self) -> f64 {
        match self {
            Mode::CarDriver | Mode::CarPassenger => 75.0,
            Mode::PublicTransit                  => 22.5,
            Mode::Bicycle                        => 18.0,
            Mode::Foot                           => 5.0,
            Mode::Undefined                      => 75.0,
        }
    }

    /// Human-readable label, used in output files and config parsing.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::CarDriver     => "CAR_DRIVER",
            Mode::CarPassenger  => "CAR_PASSENGER",
            Mode::PublicTransit => "PUBLIC_TRANSIT",
            Mode::Bicycle       => "BICYCLE",
            Mode::Foot          => "FOOT",
            Mode::Undefined     => "UNDEFINED",
        }
    }

    /// Parse the label produced by [`as_str`][Self::as_str] (case-insensitive).
    pub fn parse(s: &str) -> Option<Mode> {
        match s.to_ascii_uppercase().as_str() {
            "CAR_DRIVER"     => Some(Mode::CarDriver),
            "CAR_PASSENGER"  => Some(Mode::CarPassenger),
            "PUBLIC_TRANSIT" => Some(Mode::PublicTransit),
            "BICYCLE"        => Some(Mode::Bicycle),
            "FOOT"           => Some(Mode::Foot),
            "UNDEFINED"      => Some(Mode::Undefined),
            _                => None,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
