//! The end-to-end run: area → grid → routing → choice → agents → diaries
//! → output.

use std::sync::atomic::AtomicBool;

use anyhow::Context;
use log::{info, warn};
use rustc_hash::FxHashMap;

use dg_area::{build as area_build, cache as area_cache, census, grid, osm};
use dg_area::{AreaBuilder, BuildingIndex};
use dg_choice::{calibrate_k_factors, compute_attractions, od, DestinationChooser,
                DistanceDistributions};
use dg_core::LocationArena;
use dg_output::{write_output, OutputContext};
use dg_popsyn::{ActivityDataStore, AgentFactory, AgentFactoryConfig, PopulationStrata};
use dg_routing::{
    BeelineRouter, DistanceCache, DistanceCacheConfig, NetworkRouter, RoadNetwork, RoutePoint,
    Router,
};
use dg_sim::{SimConfig, Simulator};

use crate::args::{Args, RoutingMode};

pub fn run(args: &Args) -> anyhow::Result<()> {
    args.validate()?;

    if let Some(n) = args.n_worker {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("configuring the worker pool")?;
    }
    if args.gtfs_file.is_some() {
        warn!("--gtfs_file is reserved for an external transit router; transit trips use the constant-speed estimate");
    }

    // ── Model area ────────────────────────────────────────────────────────
    let focus_latlon = area_build::load_area_geojson(&args.area_geojson)
        .context("reading the focus-area GeoJSON")?;

    let census_identity = match &args.census {
        None => "none".to_string(),
        Some(p) => format!(
            "{}-{}",
            p.file_name().and_then(|n| n.to_str()).unwrap_or("census"),
            std::fs::metadata(p).map(|m| m.len()).unwrap_or(0)
        ),
    };

    let builder = AreaBuilder::new(focus_latlon.clone(), args.buffer, args.seed);
    let tm = builder.projection();
    let focus = area_build::project_multipolygon(&focus_latlon, &tm);
    let focus_area_m2 = {
        use geo::Area;
        focus.unsigned_area()
    };

    let cache_path = area_cache::area_cache_dir(
        &args.cache_dir,
        &focus_latlon,
        args.buffer,
        &census_identity,
    )
    .join("buildings.geojson");

    // `roads` is `None` when the building cache hit: road polylines are
    // not part of the cache and are re-scanned only if the network router
    // actually needs them.
    let (buildings, mut roads) = match area_cache::load_buildings_geojson(&cache_path, &tm) {
        Ok(cached) => {
            info!("loaded {} buildings from {}", cached.len(), cache_path.display());
            (cached, None)
        }
        Err(_) => {
            let census_entries = match &args.census {
                Some(path) => census::load_census(path, &tm).context("reading the census file")?,
                None => Vec::new(),
            };
            let area = builder
                .census(census_entries, args.share_pop)
                .build(&args.osm_pbf)
                .context("building the model area from OSM")?;
            if let Err(e) = area_cache::save_buildings_geojson(&cache_path, &area.buildings) {
                // Cache writes are an optimization; the run continues.
                warn!("could not persist the building cache: {e}");
            }
            (area.buildings, Some(area.roads))
        }
    };

    // ── Grid clustering ───────────────────────────────────────────────────
    let mut arena = LocationArena::default();
    arena.buildings = buildings;
    let grid_cfg = grid::GridConfig {
        precision_m: args.grid_precision,
        seed: args.seed,
    };
    arena.cells = grid::cluster_grid(&mut arena.buildings, &focus, focus_area_m2, &grid_cfg, &tm);
    info!("clustered {} buildings into {} cells", arena.buildings.len(), arena.cells.len());

    // ── Routing backend ───────────────────────────────────────────────────
    let router: Box<dyn Router> = match args.routing_mode {
        RoutingMode::Beeline => Box::new(BeelineRouter),
        RoutingMode::Network => {
            let segments = match roads.take() {
                Some(segments) => segments,
                None => osm::extract_roads(&args.osm_pbf, &focus_latlon, args.buffer, &tm)
                    .context("extracting road polylines")?,
            };
            let network = RoadNetwork::from_segments(&segments);
            info!(
                "road network: {} nodes, {} edges from {} segments",
                network.node_count(),
                network.edge_count(),
                segments.len()
            );
            Box::new(NetworkRouter::new(network))
        }
    };

    // ── OD zones ──────────────────────────────────────────────────────────
    let od_matrix = match &args.od {
        None => None,
        Some(path) => {
            let matrix =
                od::load_od_matrix(path, &tm, &focus).context("reading the OD matrix")?;
            let index = BuildingIndex::new(&arena.buildings);
            od::stamp_zones(&mut arena, &matrix, &index);
            info!("stamped {} OD zones ({} dummies)", matrix.zones.len(), arena.dummies.len());
            Some(matrix)
        }
    };

    // ── Attractions & region types ────────────────────────────────────────
    compute_attractions(&mut arena);
    grid::assign_region_types(&mut arena.cells);

    // ── Distance cache ────────────────────────────────────────────────────
    let mut cache = DistanceCache::new(DistanceCacheConfig {
        size_outer: args.distance_matrix_cache_size,
        size_inner: args.distance_matrix_cache_size,
    });
    {
        let locations: Vec<(u32, RoutePoint)> = arena
            .routable_refs()
            .iter()
            .map(|&r| {
                (
                    arena.route_key(r).expect("routable refs always carry a key"),
                    RoutePoint { proj: arena.coord(r), latlon: arena.latlon(r) },
                )
            })
            .collect();
        let priorities: Vec<f64> = arena
            .routable_refs()
            .iter()
            .map(|&r| {
                dg_core::ActivityType::ALL
                    .iter()
                    .map(|&t| arena.attraction(r, t))
                    .sum()
            })
            .collect();
        cache.load(&locations, &priorities, &args.cache_dir, router.as_ref());
    }

    // ── Behavioral data ───────────────────────────────────────────────────
    let deterrence = DistanceDistributions::embedded();
    let strata = match &args.population_file {
        Some(path) => PopulationStrata::from_file(path).context("reading the population file")?,
        None => PopulationStrata::embedded()?,
    };
    let store = match &args.activity_group_file {
        Some(path) => {
            ActivityDataStore::from_file(path).context("reading the activity-group file")?
        }
        None => ActivityDataStore::embedded()?,
    };

    // ── Agents & simulation ───────────────────────────────────────────────
    let agents = {
        let mut chooser = DestinationChooser::new(&arena, &deterrence, &cache, router.as_ref());
        if let Some(matrix) = &od_matrix {
            let table = calibrate_k_factors(&chooser, matrix);
            chooser.set_k_factors(table);
        }

        let mut factory = AgentFactory::new(
            &strata,
            &chooser,
            AgentFactoryConfig {
                n_agents: args.n_agents,
                populate_buffer: args.populate_buffer_area,
                random_features: args.random_features,
                seed: args.seed,
            },
        );
        let mut agents = factory.create_agents()?;

        let sim = Simulator::new(
            &chooser,
            &store,
            router.as_ref(),
            SimConfig {
                n_days: args.n_days,
                start_weekday: args.start_wd,
                seed: args.seed,
                mode_choice: args.mode_choice.clone(),
                return_path_coords: args.return_path_coords,
                mode_speed_up: args.mode_speed_up.iter().copied().collect::<FxHashMap<_, _>>(),
            },
        );
        let cancel = AtomicBool::new(false);
        let stats = sim.run(&mut agents, &cancel)?;

        info!(
            "simulated {} agents, {} diaries, {} trips, {:.1} km total ({} failed)",
            stats.agents, stats.diaries, stats.trips, stats.total_distance_km, stats.failed
        );
        let mut modes: Vec<_> = stats.mode_counts.iter().collect();
        modes.sort_by_key(|(m, _)| m.as_str());
        for (mode, count) in modes {
            info!("  {mode}: {count} trips");
        }
        agents
    };

    if let Err(e) = cache.flush() {
        warn!("could not persist the routing matrix: {e}");
    }

    // ── Output ────────────────────────────────────────────────────────────
    let ctx = OutputContext {
        arena: &arena,
        run_parameters: serde_json::to_value(args)?,
        matsim_crs: args.matsim_output_crs.clone(),
    };
    write_output(&args.out, &agents, &ctx).context("writing the output file")?;
    info!("wrote {} agents to {}", agents.len(), args.out.display());

    Ok(())
}
