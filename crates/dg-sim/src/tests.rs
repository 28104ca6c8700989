//! Unit tests for dg-sim.

#[cfg(test)]
mod helpers {
    use dg_choice::{compute_attractions, DestinationChooser, DistanceDistributions};
    use dg_core::{
        ActivityType, Agent, AgentId, Building, BuildingId, Cell, CellId, Landuse, LatLon,
        LocRef, LocationArena, PoiCounts, ProjPoint, SocioDemFeatures,
    };

    pub fn arena() -> LocationArena {
        let mut arena = LocationArena::default();
        let spots = [
            (0.0, 0.0, CellId(0)),
            (150.0, 0.0, CellId(0)),
            (2_500.0, 0.0, CellId(1)),
            (2_650.0, 0.0, CellId(1)),
        ];
        for (i, &(x, y, cell)) in spots.iter().enumerate() {
            arena.buildings.push(Building {
                id: BuildingId(i as u32),
                coord: ProjPoint::new(x, y),
                latlon: LatLon::new(48.0, 11.0 + x / 111_000.0),
                area_m2: 160.0,
                population: 20.0,
                landuse: Landuse::Residential,
                poi: PoiCounts { shops: 1, offices: 1, education: 1, leisure: 1 },
                in_focus: true,
                od_zone: None,
                cell,
                attraction: [0.0; ActivityType::COUNT],
            });
        }
        for (c, members, cx) in [(0u32, vec![0u32, 1], 75.0), (1, vec![2, 3], 2_575.0)] {
            arena.cells.push(Cell {
                id: CellId(c),
                centroid: ProjPoint::new(cx, 0.0),
                latlon: LatLon::new(48.0, 11.0 + cx / 111_000.0),
                members: members.into_iter().map(BuildingId).collect(),
                attraction: [0.0; ActivityType::COUNT],
                population: 0.0,
                in_focus: true,
                od_zone: None,
                avg_distance_to_self: 75.0,
                region_type: 3,
            });
        }
        compute_attractions(&mut arena);
        arena
    }

    pub fn agent(id: u32, car_access: bool) -> Agent {
        Agent {
            id: AgentId(id),
            features: SocioDemFeatures::default(),
            home: LocRef::Building(BuildingId(0)),
            work: LocRef::Building(BuildingId(2)),
            school: LocRef::Building(BuildingId(3)),
            car_access,
            diaries: Vec::new(),
        }
    }

    /// Convenience bundle holding everything a `Simulator` borrows.
    pub struct Fixture {
        pub arena: LocationArena,
        pub deterrence: DistanceDistributions,
        pub cache: dg_routing::DistanceCache,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self {
                arena: arena(),
                deterrence: DistanceDistributions::embedded(),
                cache: dg_routing::DistanceCache::new(dg_routing::DistanceCacheConfig::default()),
            }
        }

        pub fn chooser(&self) -> DestinationChooser<'_> {
            DestinationChooser::new(
                &self.arena,
                &self.deterrence,
                &self.cache,
                &dg_routing::BeelineRouter,
            )
        }
    }
}

#[cfg(test)]
mod loop_invariants {
    use std::sync::atomic::AtomicBool;

    use dg_popsyn::ActivityDataStore;
    use dg_routing::BeelineRouter;
    use rustc_hash::FxHashMap;

    use super::helpers::{agent, Fixture};
    use crate::{ModeChoice, SimConfig, Simulator};
    use dg_core::Weekday;

    fn config(n_days: u32, mode_choice: ModeChoice) -> SimConfig {
        SimConfig {
            n_days,
            start_weekday: Weekday::Monday,
            seed: 42,
            mode_choice,
            return_path_coords: false,
            mode_speed_up: FxHashMap::default(),
        }
    }

    #[test]
    fn diary_continuity_across_days() {
        let fixture = Fixture::new();
        let chooser = fixture.chooser();
        let store = ActivityDataStore::embedded().unwrap();
        let sim = Simulator::new(&chooser, &store, &BeelineRouter, config(5, ModeChoice::None));

        let mut agents = vec![agent(0, true), agent(1, false)];
        sim.run(&mut agents, &AtomicBool::new(false)).unwrap();

        for a in &agents {
            assert_eq!(a.diaries.len(), 5);
            for w in a.diaries.windows(2) {
                let last = w[0].activities.last().unwrap();
                let first = w[1].activities.first().unwrap();
                assert_eq!(last.kind, first.kind);
                assert_eq!(last.location, first.location);
            }
            // Day 0 starts at home.
            assert_eq!(a.diaries[0].activities[0].location, a.home);
        }
    }

    #[test]
    fn trip_count_and_open_end() {
        let fixture = Fixture::new();
        let chooser = fixture.chooser();
        let store = ActivityDataStore::embedded().unwrap();
        let sim = Simulator::new(&chooser, &store, &BeelineRouter, config(3, ModeChoice::CarOnly));

        let mut agents = vec![agent(0, true)];
        sim.run(&mut agents, &AtomicBool::new(false)).unwrap();

        for diary in &agents[0].diaries {
            assert_eq!(diary.trips.len(), diary.activities.len() - 1);
            assert!(diary.activities.last().unwrap().stay_minutes.is_none());
            for activity in &diary.activities[..diary.activities.len() - 1] {
                assert!(activity.stay_minutes.is_some());
            }
        }
    }

    #[test]
    fn weekday_succession_over_ten_days() {
        let fixture = Fixture::new();
        let chooser = fixture.chooser();
        let store = ActivityDataStore::embedded().unwrap();
        let sim = Simulator::new(&chooser, &store, &BeelineRouter, config(10, ModeChoice::None));

        let mut agents = vec![agent(0, true)];
        sim.run(&mut agents, &AtomicBool::new(false)).unwrap();

        let days: Vec<Weekday> = agents[0].diaries.iter().map(|d| d.day_type).collect();
        use Weekday::*;
        assert_eq!(
            days,
            vec![
                Monday, Tuesday, Wednesday, Thursday, Friday, Saturday, Sunday, Monday,
                Tuesday, Wednesday
            ]
        );
    }

    #[test]
    fn parallel_run_is_deterministic() {
        let store = ActivityDataStore::embedded().unwrap();

        let run = || {
            let fixture = Fixture::new();
            let chooser = fixture.chooser();
            let sim =
                Simulator::new(&chooser, &store, &BeelineRouter, config(4, ModeChoice::CarOnly));
            let mut agents: Vec<_> = (0..30).map(|i| agent(i, i % 2 == 0)).collect();
            sim.run(&mut agents, &AtomicBool::new(false)).unwrap();
            agents
        };

        let a = run();
        let b = run();
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.diaries.len(), y.diaries.len());
            for (dx, dy) in x.diaries.iter().zip(&y.diaries) {
                assert_eq!(dx.activities, dy.activities);
                assert_eq!(dx.trips, dy.trips);
            }
        }
    }

    #[test]
    fn cancel_flag_aborts() {
        let fixture = Fixture::new();
        let chooser = fixture.chooser();
        let store = ActivityDataStore::embedded().unwrap();
        let sim = Simulator::new(&chooser, &store, &BeelineRouter, config(2, ModeChoice::None));

        let mut agents = vec![agent(0, true)];
        let cancelled = AtomicBool::new(true);
        assert!(sim.run(&mut agents, &cancelled).is_err());
    }
}

#[cfg(test)]
mod failure_policy {
    use std::sync::atomic::AtomicBool;

    use dg_popsyn::ActivityDataStore;
    use dg_routing::BeelineRouter;
    use rustc_hash::FxHashMap;

    use super::helpers::{agent, Fixture};
    use crate::{ModeChoice, SimConfig, SimError, Simulator};
    use dg_core::{Agent, AgentId, BuildingId, LocRef, Weekday};

    /// An agent whose anchors reference a building outside the arena —
    /// the kind of corruption the catch-and-discard policy exists for.
    fn corrupt_agent(id: u32) -> Agent {
        let mut a = agent(id, true);
        let bogus = LocRef::Building(BuildingId(999));
        a.home = bogus;
        a.work = bogus;
        a.school = bogus;
        a
    }

    fn config() -> SimConfig {
        SimConfig {
            // Several days so even a one-activity opening day is followed
            // by diaries that touch the arena (and panic for the corrupt
            // agent).
            n_days: 6,
            start_weekday: Weekday::Monday,
            seed: 42,
            mode_choice: ModeChoice::CarOnly,
            return_path_coords: false,
            mode_speed_up: FxHashMap::default(),
        }
    }

    #[test]
    fn corrupt_agent_is_discarded_within_tolerance() {
        let fixture = Fixture::new();
        let chooser = fixture.chooser();
        let store = ActivityDataStore::embedded().unwrap();
        let sim = Simulator::new(&chooser, &store, &BeelineRouter, config());

        // 1 of 200 corrupt: 0.5% — under the 1% abort threshold.
        let mut agents: Vec<Agent> = (0..200).map(|i| agent(i, true)).collect();
        agents[57] = corrupt_agent(57);

        let stats = sim.run(&mut agents, &AtomicBool::new(false)).unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.agents, 199);
        assert_eq!(agents.len(), 199);
        assert!(agents.iter().all(|a| a.id != AgentId(57)));
        // Survivors are intact and still in id order.
        assert!(agents.windows(2).all(|w| w[0].id < w[1].id));
        assert!(agents.iter().all(|a| a.diaries.len() == 6));
    }

    #[test]
    fn failure_rate_above_tolerance_aborts() {
        let fixture = Fixture::new();
        let chooser = fixture.chooser();
        let store = ActivityDataStore::embedded().unwrap();
        let sim = Simulator::new(&chooser, &store, &BeelineRouter, config());

        let mut agents: Vec<Agent> = (0..10).map(corrupt_agent).collect();
        let result = sim.run(&mut agents, &AtomicBool::new(false));
        assert!(matches!(
            result,
            Err(SimError::FailureRateExceeded { failed, total: 10 }) if failed > 0
        ));
    }
}

#[cfg(test)]
mod modes {
    use std::sync::atomic::AtomicBool;

    use dg_popsyn::ActivityDataStore;
    use dg_routing::BeelineRouter;
    use rustc_hash::FxHashMap;

    use super::helpers::{agent, Fixture};
    use crate::{LogitParams, ModeChoice, SimConfig, Simulator};
    use dg_core::{Mode, Weekday};

    fn config(mode_choice: ModeChoice) -> SimConfig {
        SimConfig {
            n_days: 4,
            start_weekday: Weekday::Monday,
            seed: 99,
            mode_choice,
            return_path_coords: false,
            mode_speed_up: FxHashMap::default(),
        }
    }

    #[test]
    fn mode_none_leaves_trips_unresolved() {
        let fixture = Fixture::new();
        let chooser = fixture.chooser();
        let store = ActivityDataStore::embedded().unwrap();
        let sim = Simulator::new(&chooser, &store, &BeelineRouter, config(ModeChoice::None));

        let mut agents = vec![agent(0, true)];
        sim.run(&mut agents, &AtomicBool::new(false)).unwrap();
        for diary in &agents[0].diaries {
            for trip in &diary.trips {
                assert_eq!(trip.mode, Mode::Undefined);
                assert!(trip.distance_km.is_none());
                assert!(trip.time_minutes.is_none());
            }
        }
    }

    #[test]
    fn car_only_assigns_car_and_surcharge() {
        let fixture = Fixture::new();
        let chooser = fixture.chooser();
        let store = ActivityDataStore::embedded().unwrap();
        let sim = Simulator::new(&chooser, &store, &BeelineRouter, config(ModeChoice::CarOnly));

        let mut agents: Vec<_> = (0..5).map(|i| agent(i, true)).collect();
        sim.run(&mut agents, &AtomicBool::new(false)).unwrap();

        let mut seen_trip = false;
        for a in &agents {
            for diary in &a.diaries {
                for trip in &diary.trips {
                    seen_trip = true;
                    assert_eq!(trip.mode, Mode::CarDriver);
                    let d = trip.distance_km.unwrap();
                    let t = trip.time_minutes.unwrap();
                    // Beeline car: d / 75 km/h plus the 5-minute parking term.
                    assert!(t >= d / 75.0 * 60.0 + 5.0 - 1e-9, "t={t} d={d}");
                }
            }
        }
        assert!(seen_trip);
    }

    #[test]
    fn logit_without_car_access_never_drives() {
        let fixture = Fixture::new();
        let chooser = fixture.chooser();
        let store = ActivityDataStore::embedded().unwrap();
        let sim = Simulator::new(
            &chooser,
            &store,
            &BeelineRouter,
            config(ModeChoice::Logit(LogitParams::default())),
        );

        let mut agents: Vec<_> = (0..10).map(|i| agent(i, false)).collect();
        sim.run(&mut agents, &AtomicBool::new(false)).unwrap();
        for a in &agents {
            for diary in &a.diaries {
                for trip in &diary.trips {
                    assert_ne!(trip.mode, Mode::CarDriver);
                }
            }
        }
    }

    #[test]
    fn speed_up_scales_time_only() {
        let store = ActivityDataStore::embedded().unwrap();

        let run = |factor: Option<f64>| {
            let fixture = Fixture::new();
            let chooser = fixture.chooser();
            let mut cfg = config(ModeChoice::CarOnly);
            if let Some(f) = factor {
                cfg.mode_speed_up.insert(Mode::CarDriver, f);
            }
            let sim = Simulator::new(&chooser, &store, &BeelineRouter, cfg);
            let mut agents = vec![agent(0, true)];
            sim.run(&mut agents, &AtomicBool::new(false)).unwrap();
            agents
        };

        let base = run(None);
        let scaled = run(Some(0.5));
        for (db, ds) in base[0].diaries.iter().zip(&scaled[0].diaries) {
            for (tb, ts) in db.trips.iter().zip(&ds.trips) {
                assert_eq!(tb.distance_km, ts.distance_km);
                let expected = tb.time_minutes.unwrap() * 0.5;
                assert!((ts.time_minutes.unwrap() - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn path_coords_emitted_on_request() {
        let fixture = Fixture::new();
        let chooser = fixture.chooser();
        let store = ActivityDataStore::embedded().unwrap();
        let mut cfg = config(ModeChoice::CarOnly);
        cfg.return_path_coords = true;
        let sim = Simulator::new(&chooser, &store, &BeelineRouter, cfg);

        let mut agents = vec![agent(0, true)];
        sim.run(&mut agents, &AtomicBool::new(false)).unwrap();
        for diary in &agents[0].diaries {
            for trip in &diary.trips {
                let lats = trip.path_lats.as_ref().unwrap();
                let lons = trip.path_lons.as_ref().unwrap();
                assert_eq!(lats.len(), lons.len());
                assert!(lats.len() >= 2);
            }
        }
    }
}

#[cfg(test)]
mod clock {
    use crate::clock::{format_hhmm, leg_start_minutes};
    use dg_core::{Activity, ActivityType, BuildingId, Diary, LocRef, Mode, Trip, Weekday};

    #[test]
    fn starts_accumulate_stays_and_travel() {
        let loc = LocRef::Building(BuildingId(0));
        let mut diary = Diary::new(0, Weekday::Monday);
        diary.activities = vec![
            Activity { kind: ActivityType::Home, stay_minutes: Some(480.0), location: loc },
            Activity { kind: ActivityType::Work, stay_minutes: Some(510.0), location: loc },
            Activity { kind: ActivityType::Home, stay_minutes: None, location: loc },
        ];
        diary.trips = vec![
            Trip { mode: Mode::CarDriver, distance_km: Some(10.0), time_minutes: Some(20.0), ..Trip::default() },
            Trip { mode: Mode::CarDriver, distance_km: Some(10.0), time_minutes: Some(25.0), ..Trip::default() },
        ];

        let (acts, trips) = leg_start_minutes(&diary);
        assert_eq!(acts, vec![0.0, 500.0, 1_035.0]);
        assert_eq!(trips, vec![480.0, 1_010.0]);
    }

    #[test]
    fn hhmm_wraps_past_midnight() {
        assert_eq!(format_hhmm(0.0), "00:00");
        assert_eq!(format_hhmm(505.0), "08:25");
        assert_eq!(format_hhmm(1_500.0), "01:00"); // 25:00 → next day 01:00
    }
}
