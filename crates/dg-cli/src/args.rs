//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

use dg_core::{Mode, Weekday};

/// Synthesize daily mobility demand for an OpenStreetMap region.
#[derive(Parser, Debug, Clone, Serialize)]
#[command(name = "demandgen", version, about)]
pub struct Args {
    /// Focus-area polygon (GeoJSON, EPSG:4326).
    pub area_geojson: PathBuf,

    /// OSM extract covering the buffered area (.osm.pbf).
    pub osm_pbf: PathBuf,

    /// Focus-area agent count.
    #[arg(long, default_value_t = 1_000)]
    pub n_agents: usize,

    /// Fraction of the census population to simulate.
    #[arg(long, default_value_t = 1.0)]
    pub share_pop: f64,

    /// Days per agent.
    #[arg(long, default_value_t = 1)]
    pub n_days: u32,

    /// First weekday (MO…SU, HO, UNDEFINED).  UNDEFINED makes every day
    /// day-type-agnostic.
    #[arg(long, default_value = "MO", value_parser = parse_weekday)]
    pub start_wd: Weekday,

    /// Output file; the extension selects the format
    /// (.json, .csv, .db, .xml → MATSim).
    #[arg(long, default_value = "output.json")]
    pub out: PathBuf,

    /// NETWORK routes over the OSM road graph; BEELINE uses straight-line
    /// distances.
    #[arg(long, default_value = "network", value_parser = parse_routing_mode)]
    pub routing_mode: RoutingMode,

    /// OD calibration GeoJSON (HOME→WORK flow table).
    #[arg(long)]
    pub od: Option<PathBuf>,

    /// Census GeoJSON (polygons with a population property).
    #[arg(long)]
    pub census: Option<PathBuf>,

    /// Routing-grid cell edge length in meters.
    #[arg(long, default_value_t = 150.0)]
    pub grid_precision: f64,

    /// Buffer ring around the focus area, meters.
    #[arg(long, default_value_t = 0.0)]
    pub buffer: f64,

    /// Master RNG seed; identical seeds reproduce identical output.
    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// Cache directory (building GeoJSON, routing matrices).
    #[arg(long, default_value = "cache")]
    pub cache_dir: PathBuf,

    /// Also synthesize buffer-area residents (y/n).
    #[arg(long, default_value = "n", value_parser = parse_yn)]
    pub populate_buffer_area: bool,

    /// Rank of the pre-warmed distance matrix and bound of the cache tiers.
    #[arg(long, default_value_t = 5_000)]
    pub distance_matrix_cache_size: usize,

    /// NONE, CAR_ONLY, or GTFS (logit over all modes).
    #[arg(long, default_value = "NONE", value_parser = parse_mode_choice)]
    #[serde(skip)]
    pub mode_choice: dg_sim::ModeChoice,

    /// Emit path coordinates on trips (y/n).
    #[arg(long, default_value = "n", value_parser = parse_yn)]
    pub return_path_coords: bool,

    /// Population strata JSON (defaults to the embedded strata).
    #[arg(long)]
    pub population_file: Option<PathBuf>,

    /// Activity-group JSON (defaults to the embedded survey data).
    #[arg(long)]
    pub activity_group_file: Option<PathBuf>,

    /// GTFS feed (reserved for an external transit router).
    #[arg(long)]
    pub gtfs_file: Option<PathBuf>,

    /// Coordinate system of MATSim output: EPSG:4326 or MODEL.
    #[arg(long, default_value = "EPSG:4326")]
    pub matsim_output_crs: String,

    /// Random with-replacement feature draws instead of deterministic
    /// assignment (y/n).
    #[arg(long, default_value = "n", value_parser = parse_yn)]
    pub random_features: bool,

    /// Worker threads (default: all cores).
    #[arg(long)]
    pub n_worker: Option<usize>,

    /// Multiply the travel time of one mode by a factor, e.g.
    /// `--mode_speed_up CAR_DRIVER=0.9`.  Repeatable.
    #[arg(long, value_parser = parse_speed_up)]
    #[serde(skip)]
    pub mode_speed_up: Vec<(Mode, f64)>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum RoutingMode {
    Network,
    Beeline,
}

// ── Value parsers ─────────────────────────────────────────────────────────────

fn parse_weekday(s: &str) -> Result<Weekday, String> {
    Weekday::parse(s).ok_or_else(|| format!("unknown weekday {s:?}"))
}

fn parse_routing_mode(s: &str) -> Result<RoutingMode, String> {
    match s.to_ascii_uppercase().as_str() {
        "NETWORK" | "GRAPHHOPPER" => Ok(RoutingMode::Network),
        "BEELINE" => Ok(RoutingMode::Beeline),
        _ => Err(format!("unknown routing mode {s:?}")),
    }
}

fn parse_mode_choice(s: &str) -> Result<dg_sim::ModeChoice, String> {
    dg_sim::ModeChoice::parse(s).ok_or_else(|| format!("unknown mode choice {s:?}"))
}

fn parse_yn(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "1" => Ok(true),
        "n" | "no" | "false" | "0" => Ok(false),
        _ => Err(format!("expected y or n, got {s:?}")),
    }
}

fn parse_speed_up(s: &str) -> Result<(Mode, f64), String> {
    let (mode, factor) = s
        .split_once('=')
        .ok_or_else(|| format!("expected MODE=factor, got {s:?}"))?;
    let mode = Mode::parse(mode).ok_or_else(|| format!("unknown mode {mode:?}"))?;
    let factor: f64 = factor
        .parse()
        .map_err(|_| format!("invalid factor {factor:?}"))?;
    if factor <= 0.0 {
        return Err(format!("speed-up factor must be positive, got {factor}"));
    }
    Ok((mode, factor))
}

impl Args {
    /// Startup validation of cross-field constraints (§ configuration
    /// errors: abort before any work happens).
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.share_pop) {
            anyhow::bail!("--share_pop must be in [0, 1], got {}", self.share_pop);
        }
        if self.n_agents == 0 {
            anyhow::bail!("--n_agents must be positive");
        }
        if self.n_days == 0 {
            anyhow::bail!("--n_days must be positive");
        }
        if self.grid_precision <= 0.0 {
            anyhow::bail!("--grid_precision must be positive");
        }
        if self.buffer < 0.0 {
            anyhow::bail!("--buffer must be non-negative");
        }
        if self.matsim_output_crs != "EPSG:4326" && self.matsim_output_crs != "MODEL" {
            anyhow::bail!(
                "--matsim_output_crs must be EPSG:4326 or MODEL, got {:?}",
                self.matsim_output_crs
            );
        }
        Ok(())
    }
}
