//! Mode choice and trip filling.
//!
//! Three models, selected by `--mode_choice`:
//!
//! - `None` — trips carry mode UNDEFINED and no distance/time.
//! - `CarOnly` — every trip is CAR_DRIVER, distance/time from the car
//!   router with the Euclidean × 75 km/h fallback.
//! - `Logit` — a multinomial logit over the modes available to the agent,
//!   with an injected utility parameterization.  Transit has no network of
//!   its own here and uses its constant-speed estimate.
//!
//! Car trips pay a 5-minute parking surcharge.  `--mode_speed_up=MODE=f`
//! multiplies the **time** (never the distance) of that mode's trips by
//! `f` after everything else.

use rustc_hash::FxHashMap;

use dg_core::{Agent, DemandRng, Diary, LocRef, LocationArena, Mode, Trip};
use dg_routing::{RouteLeg, RoutePoint, Router};

/// Added to every car trip: parking search and walk to the door.
const CAR_PARKING_MIN: f64 = 5.0;

// ── Mode choice configuration ─────────────────────────────────────────────────

/// Utility coefficients for the logit model.  Deliberately injected rather
/// than embedded: the parameterization is a calibration input, not a core
/// contract.
#[derive(Clone, Debug)]
pub struct LogitParams {
    /// Alternative-specific constants, indexed by [`Mode::CHOICES`] order.
    pub asc: [f64; 5],
    /// Marginal utility per minute of travel time (negative).
    pub beta_time_min: f64,
}

impl Default for LogitParams {
    fn default() -> Self {
        Self {
            asc: [0.0, -1.6, -0.6, -1.2, -0.4],
            beta_time_min: -0.035,
        }
    }
}

/// The configured mode-choice model.
#[derive(Clone, Debug)]
pub enum ModeChoice {
    None,
    CarOnly,
    Logit(LogitParams),
}

impl ModeChoice {
    pub fn parse(s: &str) -> Option<ModeChoice> {
        match s.to_ascii_uppercase().as_str() {
            "NONE"     => Some(ModeChoice::None),
            "CAR_ONLY" => Some(ModeChoice::CarOnly),
            "GTFS" | "LOGIT" => Some(ModeChoice::Logit(LogitParams::default())),
            _ => None,
        }
    }
}

// ── Trip resolution ───────────────────────────────────────────────────────────

/// Fill `diary.trips` (one per consecutive activity pair).
///
/// `speed_up` maps modes to time multipliers; `with_paths` requests route
/// polylines from the router.
#[allow(clippy::too_many_arguments)]
pub fn resolve_trips(
    diary: &mut Diary,
    agent: &Agent,
    arena: &LocationArena,
    router: &dyn Router,
    choice: &ModeChoice,
    speed_up: &FxHashMap<Mode, f64>,
    with_paths: bool,
    rng: &mut DemandRng,
) {
    diary.trips.clear();
    if diary.activities.len() < 2 {
        return;
    }

    for pair in 0..diary.activities.len() - 1 {
        let from = diary.activities[pair].location;
        let to = diary.activities[pair + 1].location;

        let trip = match choice {
            ModeChoice::None => Trip::default(),
            ModeChoice::CarOnly => {
                build_trip(Mode::CarDriver, from, to, arena, router, with_paths)
            }
            ModeChoice::Logit(params) => {
                let mode = choose_mode(params, agent, from, to, arena, router, rng);
                build_trip(mode, from, to, arena, router, with_paths)
            }
        };

        let trip = apply_speed_up(trip, speed_up);
        diary.trips.push(trip);
    }
}

/// Route one trip with the chosen mode, falling back to Euclidean at the
/// mode's constant speed when routing fails or an endpoint is not real.
fn build_trip(
    mode: Mode,
    from: LocRef,
    to: LocRef,
    arena: &LocationArena,
    router: &dyn Router,
    with_paths: bool,
) -> Trip {
    let leg = route_or_fallback(mode, from, to, arena, router, with_paths);

    let mut time_min = leg.time_s / 60.0;
    if matches!(mode, Mode::CarDriver | Mode::CarPassenger) {
        time_min += CAR_PARKING_MIN;
    }

    let (path_lats, path_lons) = match leg.path {
        Some(path) if with_paths => (
            Some(path.iter().map(|p| p.lat).collect()),
            Some(path.iter().map(|p| p.lon).collect()),
        ),
        _ => (None, None),
    };

    Trip {
        mode,
        distance_km: Some(leg.distance_m / 1_000.0),
        time_minutes: Some(time_min),
        path_lats,
        path_lons,
    }
}

fn route_or_fallback(
    mode: Mode,
    from: LocRef,
    to: LocRef,
    arena: &LocationArena,
    router: &dyn Router,
    with_paths: bool,
) -> RouteLeg {
    let from_pt = route_point(arena, from);
    let to_pt = route_point(arena, to);

    // Only real locations exist on the network; transit always estimates.
    let use_router = from.is_real() && to.is_real() && mode != Mode::PublicTransit;
    if use_router {
        match router.route(from_pt, to_pt, mode, with_paths) {
            Ok(leg) => return leg,
            Err(e) => log::debug!("routing failed ({e}); using fallback speed"),
        }
    }

    let distance_m = from_pt.proj.distance_m(to_pt.proj);
    RouteLeg {
        distance_m,
        time_s: distance_m / (mode.fallback_speed_kmh() / 3.6),
        path: with_paths.then(|| vec![from_pt.latlon, to_pt.latlon]),
    }
}

/// Multinomial logit over the modes available to the agent.
fn choose_mode(
    params: &LogitParams,
    agent: &Agent,
    from: LocRef,
    to: LocRef,
    arena: &LocationArena,
    router: &dyn Router,
    rng: &mut DemandRng,
) -> Mode {
    let mut utilities: Vec<(Mode, f64)> = Vec::with_capacity(Mode::CHOICES.len());

    for (i, &mode) in Mode::CHOICES.iter().enumerate() {
        if mode.needs_car() && !agent.car_access {
            continue;
        }
        let leg = route_or_fallback(mode, from, to, arena, router, false);
        let mut time_min = leg.time_s / 60.0;
        if matches!(mode, Mode::CarDriver | Mode::CarPassenger) {
            time_min += CAR_PARKING_MIN;
        }
        utilities.push((mode, params.asc[i] + params.beta_time_min * time_min));
    }

    // Softmax sampling, shifted by the max utility for numerical safety.
    let max_u = utilities
        .iter()
        .map(|(_, u)| *u)
        .fold(f64::NEG_INFINITY, f64::max);
    let expd: Vec<f64> = utilities.iter().map(|(_, u)| (u - max_u).exp()).collect();
    let total: f64 = expd.iter().sum();

    let mut draw = rng.u01() * total;
    for ((mode, _), e) in utilities.iter().zip(&expd) {
        draw -= e;
        if draw <= 0.0 {
            return *mode;
        }
    }
    utilities.last().map(|(m, _)| *m).unwrap_or(Mode::Foot)
}

fn apply_speed_up(mut trip: Trip, speed_up: &FxHashMap<Mode, f64>) -> Trip {
    if let (Some(t), Some(&f)) = (trip.time_minutes, speed_up.get(&trip.mode)) {
        trip.time_minutes = Some(t * f);
    }
    trip
}

fn route_point(arena: &LocationArena, r: LocRef) -> RoutePoint {
    RoutePoint {
        proj: arena.coord(r),
        latlon: arena.latlon(r),
    }
}
