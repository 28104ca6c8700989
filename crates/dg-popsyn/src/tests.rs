//! Unit tests for dg-popsyn.

#[cfg(test)]
mod strata {
    use crate::{PopError, PopulationStrata};

    #[test]
    fn embedded_strata_validate() {
        let strata = PopulationStrata::embedded().unwrap();
        assert!(!strata.strata.is_empty());
        let total: f64 = strata.strata.iter().map(|s| s.share).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn share_sum_violation_rejected() {
        let raw = r#"{"strata":[{"name":"a","share":0.7,
            "age":{"upper_bounds":[120],"shares":[1.0],"undefined_share":0.0},
            "car_ownership":0.5,
            "homogeneous_group":{"working":1.0},
            "mobility_group":{"car_user":1.0},
            "sex":{"male":0.5,"female":0.5}}]}"#;
        let res = PopulationStrata::from_json(raw);
        assert!(matches!(res, Err(PopError::Config(_))));
    }

    #[test]
    fn inner_distribution_violation_rejected() {
        let raw = r#"{"strata":[{"name":"a","share":1.0,
            "age":{"upper_bounds":[120],"shares":[1.0],"undefined_share":0.0},
            "car_ownership":0.5,
            "homogeneous_group":{"working":0.8},
            "mobility_group":{"car_user":1.0},
            "sex":{"male":0.5,"female":0.5}}]}"#;
        assert!(PopulationStrata::from_json(raw).is_err());
    }

    #[test]
    fn age_sampling_respects_bins() {
        use dg_core::{RunSeed, SeedDomain};
        let strata = PopulationStrata::embedded().unwrap();
        let s = &strata.strata[0];
        let mut rng = RunSeed::new(3).domain(SeedDomain::Features);
        for _ in 0..200 {
            // Bin 1 covers 18..=29.
            let age = s.sample_age_in_bin(Some(1), &mut rng).unwrap();
            assert!((18..=29).contains(&age));
        }
    }
}

#[cfg(test)]
mod features {
    use crate::features::{assign_deterministic, enumerate_tuples};
    use crate::PopulationStrata;

    #[test]
    fn joint_probabilities_sum_to_one() {
        let strata = PopulationStrata::embedded().unwrap();
        let tuples = enumerate_tuples(&strata);
        let total: f64 = tuples.iter().map(|t| t.probability).sum();
        assert!((total - 1.0).abs() < 1e-9, "got {total}");
    }

    #[test]
    fn deterministic_counts_match_expectation() {
        let strata = PopulationStrata::embedded().unwrap();
        let tuples = enumerate_tuples(&strata);
        let n = 10_000;
        let assignment = assign_deterministic(&tuples, n).unwrap();

        let mut counts = vec![0usize; tuples.len()];
        for &i in &assignment {
            counts[i] += 1;
        }
        for (tuple, &count) in tuples.iter().zip(&counts) {
            let expected = (n as f64 * tuple.probability).round();
            assert!(
                (count as f64 - expected).abs() <= 1.0,
                "tuple expected {expected}, got {count}"
            );
        }
    }

    #[test]
    fn deterministic_is_reproducible() {
        let strata = PopulationStrata::embedded().unwrap();
        let tuples = enumerate_tuples(&strata);
        let a = assign_deterministic(&tuples, 500).unwrap();
        let b = assign_deterministic(&tuples, 500).unwrap();
        assert_eq!(a, b);
    }
}

#[cfg(test)]
mod activity_store {
    use crate::activity_store::{ActivityDataStore, BucketKey, FromActivity, MIN_SAMPLE_SIZE};
    use dg_core::{
        ActivityType, AgeGroup, HomogeneousGroup, MobilityGroup, Weekday,
    };

    #[test]
    fn embedded_store_loads() {
        let store = ActivityDataStore::embedded().unwrap();
        assert!(store.bucket_count() > 10);
    }

    #[test]
    fn exotic_key_falls_back_to_floor() {
        let store = ActivityDataStore::embedded().unwrap();
        let key = BucketKey {
            weekday: Weekday::Holiday,
            hom_group: HomogeneousGroup::PupilStudent,
            mob_group: MobilityGroup::NoCar,
            age_group: AgeGroup::From70,
        };
        // HO bucket exists in the embedded data; chains must be non-empty
        // either way.
        let chains = store.chains(key, FromActivity::Home);
        assert!(!chains.is_empty());
    }

    #[test]
    fn working_weekday_bucket_prefers_work_chains() {
        let store = ActivityDataStore::embedded().unwrap();
        let key = BucketKey {
            weekday: Weekday::Monday,
            hom_group: HomogeneousGroup::Working,
            mob_group: MobilityGroup::Undefined,
            age_group: AgeGroup::Undefined,
        };
        let chains = store.chains(key, FromActivity::Home);
        let work_weight: f64 = chains
            .iter()
            .filter(|c| c.chain.contains(&ActivityType::Work))
            .map(|c| c.weight)
            .sum();
        assert!(work_weight > 0.5, "working bucket should be work-heavy");
    }

    #[test]
    fn chains_start_from_their_bucket_activity() {
        let store = ActivityDataStore::embedded().unwrap();
        let floor = store.chains(BucketKey::ALL_UNDEFINED, FromActivity::Home);
        assert!(floor.iter().all(|c| c.chain[0] == ActivityType::Home));
    }

    #[test]
    fn missing_all_undefined_bucket_rejected() {
        let raw = r#"{"groups":[{"weekday":"MO","homogeneous_group":"undefined",
            "mobility_group":"undefined","age_group":"undefined","sample_size":5000,
            "from_home":[{"chain":["HOME"],"weight":1.0}],
            "from_other":[{"chain":["OTHER","HOME"],"weight":1.0,
                "dwell":{"weights":[1.0],"means":[[60.0]],"covariances":[[900.0]]}}]}]}"#;
        assert!(ActivityDataStore::from_json(raw).is_err());
    }

    #[test]
    fn thin_floor_bucket_rejected() {
        let raw = format!(
            r#"{{"groups":[{{"weekday":"UNDEFINED","homogeneous_group":"undefined",
            "mobility_group":"undefined","age_group":"undefined","sample_size":{},
            "from_home":[{{"chain":["HOME"],"weight":1.0}}],
            "from_other":[{{"chain":["OTHER"],"weight":1.0}}]}}]}}"#,
            MIN_SAMPLE_SIZE - 1
        );
        assert!(ActivityDataStore::from_json(&raw).is_err());
    }
}

#[cfg(test)]
mod factory {
    use dg_choice::{compute_attractions, DestinationChooser, DistanceDistributions};
    use dg_core::{
        ActivityType, Building, BuildingId, Cell, CellId, Landuse, LatLon, LocRef,
        LocationArena, PoiCounts, ProjPoint,
    };
    use dg_routing::{BeelineRouter, DistanceCache, DistanceCacheConfig};

    use crate::{AgentFactory, AgentFactoryConfig, PopulationStrata};

    fn arena() -> LocationArena {
        let mut arena = LocationArena::default();
        let spots = [
            (0.0, 0.0, true, CellId(0)),
            (120.0, 0.0, true, CellId(0)),
            (3_000.0, 0.0, false, CellId(1)),
            (3_150.0, 0.0, false, CellId(1)),
        ];
        for (i, &(x, y, in_focus, cell)) in spots.iter().enumerate() {
            arena.buildings.push(Building {
                id: BuildingId(i as u32),
                coord: ProjPoint::new(x, y),
                latlon: LatLon::new(48.0, 11.0 + x / 111_000.0),
                area_m2: 140.0,
                population: 25.0,
                landuse: Landuse::Residential,
                poi: PoiCounts { shops: 1, offices: 1, education: 1, leisure: 1 },
                in_focus,
                od_zone: None,
                cell,
                attraction: [0.0; ActivityType::COUNT],
            });
        }
        for (c, members, in_focus) in [(0u32, vec![0u32, 1], true), (1, vec![2, 3], false)] {
            arena.cells.push(Cell {
                id: CellId(c),
                centroid: ProjPoint::new(if c == 0 { 60.0 } else { 3_075.0 }, 0.0),
                latlon: LatLon::new(48.0, 11.0),
                members: members.into_iter().map(BuildingId).collect(),
                attraction: [0.0; ActivityType::COUNT],
                population: 0.0,
                in_focus,
                od_zone: None,
                avg_distance_to_self: 60.0,
                region_type: 3,
            });
        }
        compute_attractions(&mut arena);
        arena
    }

    #[test]
    fn zero_car_ownership_yields_no_car_access() {
        let raw = r#"{"strata":[{"name":"carless","share":1.0,
            "age":{"upper_bounds":[59],"shares":[1.0],"undefined_share":0.0},
            "car_ownership":0.0,
            "homogeneous_group":{"working":1.0},
            "mobility_group":{"no_car":1.0},
            "sex":{"male":0.5,"female":0.5}}]}"#;
        let strata = PopulationStrata::from_json(raw).unwrap();

        let arena = arena();
        let det = DistanceDistributions::embedded();
        let cache = DistanceCache::new(DistanceCacheConfig::default());
        let chooser = DestinationChooser::new(&arena, &det, &cache, &BeelineRouter);

        let mut factory = AgentFactory::new(
            &strata,
            &chooser,
            AgentFactoryConfig {
                n_agents: 2,
                populate_buffer: false,
                random_features: false,
                seed: 42,
            },
        );
        let agents = factory.create_agents().unwrap();
        assert_eq!(agents.len(), 2);
        assert!(agents.iter().all(|a| !a.car_access));
    }

    #[test]
    fn focus_agents_live_in_focus() {
        let strata = PopulationStrata::embedded().unwrap();
        let arena = arena();
        let det = DistanceDistributions::embedded();
        let cache = DistanceCache::new(DistanceCacheConfig::default());
        let chooser = DestinationChooser::new(&arena, &det, &cache, &BeelineRouter);

        let mut factory = AgentFactory::new(
            &strata,
            &chooser,
            AgentFactoryConfig {
                n_agents: 20,
                populate_buffer: false,
                random_features: false,
                seed: 7,
            },
        );
        let agents = factory.create_agents().unwrap();
        assert_eq!(agents.len(), 20);
        for agent in &agents {
            assert!(chooser.arena().in_focus(agent.home));
        }
    }

    #[test]
    fn buffer_population_follows_census_split() {
        let strata = PopulationStrata::embedded().unwrap();
        let arena = arena(); // focus pop 50, buffer pop 50
        let det = DistanceDistributions::embedded();
        let cache = DistanceCache::new(DistanceCacheConfig::default());
        let chooser = DestinationChooser::new(&arena, &det, &cache, &BeelineRouter);

        let mut factory = AgentFactory::new(
            &strata,
            &chooser,
            AgentFactoryConfig {
                n_agents: 10,
                populate_buffer: true,
                random_features: false,
                seed: 7,
            },
        );
        let agents = factory.create_agents().unwrap();
        // Equal census mass on both sides → 10 focus + 10 buffer.
        assert_eq!(agents.len(), 20);
        for agent in &agents[..10] {
            assert!(chooser.arena().in_focus(agent.home));
        }
        for agent in &agents[10..] {
            assert!(!chooser.arena().in_focus(agent.home));
        }
    }

    #[test]
    fn anchors_always_assigned() {
        let strata = PopulationStrata::embedded().unwrap();
        let arena = arena();
        let det = DistanceDistributions::embedded();
        let cache = DistanceCache::new(DistanceCacheConfig::default());
        let chooser = DestinationChooser::new(&arena, &det, &cache, &BeelineRouter);

        let mut factory = AgentFactory::new(
            &strata,
            &chooser,
            AgentFactoryConfig {
                n_agents: 8,
                populate_buffer: false,
                random_features: true,
                seed: 11,
            },
        );
        let agents = factory.create_agents().unwrap();
        for agent in &agents {
            // Anchors exist regardless of homogeneous group.
            assert!(matches!(agent.home, LocRef::Building(_)));
            assert!(matches!(agent.work, LocRef::Building(_)));
            assert!(matches!(agent.school, LocRef::Building(_)));
        }
    }
}
