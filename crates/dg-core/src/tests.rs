//! Unit tests for dg-core primitives.

#[cfg(test)]
mod ids {
    use crate::{AgentId, BuildingId, CellId};

    #[test]
    fn index_roundtrip() {
        let id = BuildingId(42);
        assert_eq!(id.index(), 42);
        assert_eq!(BuildingId::try_from(42usize).unwrap(), id);
    }

    #[test]
    fn invalid_sentinels_are_max() {
        assert_eq!(AgentId::INVALID.0, u32::MAX);
        assert_eq!(CellId::INVALID.0, u32::MAX);
    }

    #[test]
    fn display() {
        assert_eq!(AgentId(7).to_string(), "AgentId(7)");
    }
}

#[cfg(test)]
mod weekday {
    use crate::Weekday;

    #[test]
    fn succession_wraps() {
        assert_eq!(Weekday::Monday.next(), Weekday::Tuesday);
        assert_eq!(Weekday::Sunday.next(), Weekday::Monday);
    }

    #[test]
    fn holiday_and_undefined_absorb() {
        assert_eq!(Weekday::Holiday.next(), Weekday::Undefined);
        assert_eq!(Weekday::Undefined.next(), Weekday::Undefined);
    }

    #[test]
    fn ten_days_from_monday() {
        // Simulating 10 days starting MO yields MO..WE of the second week.
        let mut day = Weekday::Monday;
        let mut seen = vec![day];
        for _ in 1..10 {
            day = day.next();
            seen.push(day);
        }
        assert_eq!(seen[6], Weekday::Sunday);
        assert_eq!(seen[7], Weekday::Monday);
        assert_eq!(seen[9], Weekday::Wednesday);
    }

    #[test]
    fn parse_roundtrip() {
        for wd in [Weekday::Monday, Weekday::Holiday, Weekday::Undefined] {
            assert_eq!(Weekday::parse(wd.as_str()), Some(wd));
        }
    }
}

#[cfg(test)]
mod geo {
    use crate::{LatLon, ProjPoint, TransverseMercator};

    #[test]
    fn projection_roundtrip() {
        let tm = TransverseMercator::new(11.5);
        for &(lat, lon) in &[(48.14, 11.58), (48.40, 10.90), (47.90, 12.30)] {
            let p = tm.to_model(LatLon::new(lat, lon));
            let back = tm.to_latlon(p);
            assert!((back.lat - lat).abs() < 1e-6, "lat {lat} → {}", back.lat);
            assert!((back.lon - lon).abs() < 1e-6, "lon {lon} → {}", back.lon);
        }
    }

    #[test]
    fn one_degree_latitude_is_about_111_km() {
        let tm = TransverseMercator::new(11.5);
        let a = tm.to_model(LatLon::new(48.0, 11.5));
        let b = tm.to_model(LatLon::new(49.0, 11.5));
        let d = a.distance_m(b);
        assert!((d - 111_200.0).abs() < 300.0, "got {d}");
    }

    #[test]
    fn euclidean_distance() {
        let a = ProjPoint::new(0.0, 0.0);
        let b = ProjPoint::new(3.0, 4.0);
        assert_eq!(a.distance_m(b), 5.0);
    }
}

#[cfg(test)]
mod sample {
    use crate::{CoreError, CumulativeDist};

    #[test]
    fn all_zero_weights_surface() {
        let res = CumulativeDist::new(&[0.0, 0.0, 0.0]);
        assert!(matches!(res, Err(CoreError::DegenerateWeights)));
    }

    #[test]
    fn cumulative_prefix() {
        let cum = CumulativeDist::new(&[1.0, 1.0, 2.0]).unwrap();
        assert_eq!(cum.sample(0.0), 0);
        assert_eq!(cum.sample(0.3), 1);
        assert_eq!(cum.sample(0.6), 2);
        assert_eq!(cum.sample(1.0), 2);
    }

    #[test]
    fn empirical_frequencies_follow_weights() {
        use crate::{RunSeed, SeedDomain};

        let weights = [0.2, 0.5, 0.3];
        let cum = CumulativeDist::new(&weights).unwrap();
        let mut rng = RunSeed::new(7).domain(SeedDomain::Features);

        let n = 1_000_000usize;
        let mut counts = [0usize; 3];
        for _ in 0..n {
            counts[cum.sample(rng.u01())] += 1;
        }
        for (c, w) in counts.iter().zip(weights.iter()) {
            let freq = *c as f64 / n as f64;
            // 3× standard error of a Bernoulli proportion.
            let tol = 3.0 * (w * (1.0 - w) / n as f64).sqrt();
            assert!((freq - w).abs() < tol, "freq {freq} vs weight {w}");
        }
    }

    #[test]
    fn uniform_covers_all_indices() {
        let cum = CumulativeDist::uniform(4);
        assert_eq!(cum.sample(0.1), 0);
        assert_eq!(cum.sample(0.9), 3);
    }
}

#[cfg(test)]
mod mixture {
    use crate::{AgentId, GaussianMixture, RunSeed, SeedDomain};

    #[test]
    fn one_component_mean_recovered() {
        let gmm = GaussianMixture::new(
            &[1.0],
            vec![vec![120.0, 45.0]],
            vec![vec![100.0, 10.0, 10.0, 50.0]],
        )
        .unwrap();
        let mut rng = RunSeed::new(99).agent(SeedDomain::Diaries, AgentId(0));

        let n = 20_000;
        let mut sum = [0.0f64; 2];
        for _ in 0..n {
            let s = gmm.sample(rng.inner());
            sum[0] += s[0];
            sum[1] += s[1];
        }
        assert!((sum[0] / n as f64 - 120.0).abs() < 1.0);
        assert!((sum[1] / n as f64 - 45.0).abs() < 1.0);
    }

    #[test]
    fn asymmetric_within_tolerance_accepted() {
        // Off-diagonal entries differ by a few percent, as survey-derived
        // matrices do.
        let gmm = GaussianMixture::new(
            &[1.0],
            vec![vec![10.0, 10.0]],
            vec![vec![4.0, 1.02, 0.98, 4.0]],
        );
        assert!(gmm.is_ok());
    }

    #[test]
    fn grossly_asymmetric_rejected() {
        let gmm = GaussianMixture::new(
            &[1.0],
            vec![vec![10.0, 10.0]],
            vec![vec![4.0, 3.0, -3.0, 4.0]],
        );
        assert!(gmm.is_err());
    }

    #[test]
    fn non_psd_falls_back_to_diagonal() {
        // Negative-definite matrix: Cholesky fails, regularization fails,
        // diagonal fallback keeps sampling alive.
        let gmm = GaussianMixture::new(
            &[1.0],
            vec![vec![5.0, 5.0]],
            vec![vec![1.0, 4.0, 4.0, 1.0]],
        )
        .unwrap();
        let mut rng = RunSeed::new(1).agent(SeedDomain::Diaries, AgentId(3));
        let s = gmm.sample(rng.inner());
        assert_eq!(s.len(), 2);
        assert!(s.iter().all(|v| v.is_finite()));
    }
}

#[cfg(test)]
mod rng {
    use crate::{AgentId, RunSeed, SeedDomain};

    #[test]
    fn same_derivation_replays() {
        let mut r1 = RunSeed::new(12345).agent(SeedDomain::Diaries, AgentId(0));
        let mut r2 = RunSeed::new(12345).agent(SeedDomain::Diaries, AgentId(0));
        for _ in 0..100 {
            assert_eq!(r1.u01(), r2.u01());
        }
    }

    #[test]
    fn adjacent_agents_diverge() {
        let seed = RunSeed::new(1);
        let mut r0 = seed.agent(SeedDomain::Anchors, AgentId(0));
        let mut r1 = seed.agent(SeedDomain::Anchors, AgentId(1));
        assert_ne!(r0.u01(), r1.u01(), "adjacent agent streams should diverge");
    }

    #[test]
    fn domains_are_independent_streams() {
        // The same agent's anchor and diary streams must not correlate;
        // neither must two run-level phase streams.
        let seed = RunSeed::new(42);
        let mut anchors = seed.agent(SeedDomain::Anchors, AgentId(7));
        let mut diaries = seed.agent(SeedDomain::Diaries, AgentId(7));
        assert_ne!(anchors.u01(), diaries.u01());

        let mut census = seed.domain(SeedDomain::Census);
        let mut clustering = seed.domain(SeedDomain::Clustering);
        assert_ne!(census.u01(), clustering.u01());
    }

    #[test]
    fn gen_bool_extremes() {
        let mut rng = RunSeed::new(0).domain(SeedDomain::Census);
        assert!(!rng.gen_bool(0.0));
        assert!(rng.gen_bool(1.0));
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = RunSeed::new(3).domain(SeedDomain::Census);
        let mut v: Vec<u32> = (0..50).collect();
        rng.shuffle(&mut v);
        let mut sorted = v.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }
}

#[cfg(test)]
mod arena {
    use crate::location::{Building, Cell, DummyZone, PoiCounts};
    use crate::{
        ActivityType, BuildingId, CellId, DummyId, Landuse, LatLon, LocRef, LocationArena,
        ProjPoint,
    };

    fn small_arena() -> LocationArena {
        let mut arena = LocationArena::default();
        for i in 0..3u32 {
            arena.buildings.push(Building {
                id: BuildingId(i),
                coord: ProjPoint::new(i as f64 * 100.0, 0.0),
                latlon: LatLon::new(48.0, 11.0),
                area_m2: 120.0,
                population: i as f64,
                landuse: Landuse::Residential,
                poi: PoiCounts::default(),
                in_focus: i < 2,
                od_zone: None,
                cell: CellId(0),
                attraction: [1.0, 2.0, 0.0, 0.0, 3.0, 1.0],
            });
        }
        arena.cells.push(Cell {
            id: CellId(0),
            centroid: ProjPoint::new(100.0, 0.0),
            latlon: LatLon::new(48.0, 11.0),
            members: vec![BuildingId(0), BuildingId(1), BuildingId(2)],
            attraction: [0.0; ActivityType::COUNT],
            population: 0.0,
            in_focus: false,
            od_zone: None,
            avg_distance_to_self: 66.0,
            region_type: 3,
        });
        arena.dummies.push(DummyZone {
            id: DummyId(0),
            zone: crate::ZoneId(0),
            coord: ProjPoint::new(9_000.0, 9_000.0),
            latlon: LatLon::new(48.5, 11.5),
            transfer_activities: vec![ActivityType::Work],
        });
        arena
    }

    #[test]
    fn cell_aggregates_are_member_sums() {
        let mut arena = small_arena();
        arena.rebuild_cell_aggregates();
        let cell = arena.cell(CellId(0));
        for t in ActivityType::ALL {
            let member_sum: f64 = cell
                .members
                .iter()
                .map(|&b| arena.building(b).attraction[t.index()])
                .sum();
            assert_eq!(cell.attraction[t.index()], member_sum);
        }
        assert_eq!(cell.population, 3.0);
        assert!(cell.in_focus);
    }

    #[test]
    fn dummy_attraction_is_indicator() {
        let arena = small_arena();
        let d = LocRef::Dummy(DummyId(0));
        assert_eq!(arena.attraction(d, ActivityType::Work), 1.0);
        assert_eq!(arena.attraction(d, ActivityType::Shopping), 0.0);
        assert!(!d.is_real());
    }

    #[test]
    fn route_keys_partition_cells_then_buildings() {
        let arena = small_arena();
        assert_eq!(arena.route_key(LocRef::Cell(CellId(0))), Some(0));
        assert_eq!(arena.route_key(LocRef::Building(BuildingId(0))), Some(1));
        assert_eq!(arena.route_key(LocRef::Dummy(DummyId(0))), None);
    }

    #[test]
    fn dummy_self_distance_sentinel() {
        let arena = small_arena();
        assert_eq!(arena.avg_distance_to_self(LocRef::Dummy(DummyId(0))), 1.0);
        assert_eq!(arena.avg_distance_to_self(LocRef::Cell(CellId(0))), 66.0);
    }
}
