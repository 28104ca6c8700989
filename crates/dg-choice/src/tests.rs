//! Unit tests for dg-choice.

#[cfg(test)]
mod helpers {
    use dg_core::{
        ActivityType, Building, BuildingId, Cell, CellId, DummyId, DummyZone, Landuse, LatLon,
        LocationArena, PoiCounts, ProjPoint, ZoneId,
    };

    /// Two cells 20 km apart with two buildings each, plus one dummy zone
    /// far east that transfers WORK.
    pub fn arena() -> LocationArena {
        let mut arena = LocationArena::default();

        let spots = [
            (0.0, 0.0, CellId(0)),
            (100.0, 0.0, CellId(0)),
            (20_000.0, 0.0, CellId(1)),
            (20_100.0, 0.0, CellId(1)),
        ];
        for (i, &(x, y, cell)) in spots.iter().enumerate() {
            arena.buildings.push(Building {
                id: BuildingId(i as u32),
                coord: ProjPoint::new(x, y),
                latlon: LatLon::new(48.0 + y / 111_000.0, 11.0 + x / 111_000.0),
                area_m2: 150.0,
                population: 10.0,
                landuse: Landuse::Residential,
                poi: PoiCounts { shops: 1, offices: 1, education: 0, leisure: 1 },
                in_focus: true,
                od_zone: None,
                cell,
                attraction: [1.0; ActivityType::COUNT],
            });
        }
        for (c, members) in [(0u32, vec![0u32, 1]), (1, vec![2, 3])] {
            let first = arena.buildings[members[0] as usize].coord;
            arena.cells.push(Cell {
                id: CellId(c),
                centroid: ProjPoint::new(first.x + 50.0, 0.0),
                latlon: LatLon::new(48.0, 11.0),
                members: members.into_iter().map(BuildingId).collect(),
                attraction: [2.0; ActivityType::COUNT],
                population: 20.0,
                in_focus: true,
                od_zone: None,
                avg_distance_to_self: 50.0,
                region_type: 3,
            });
        }
        arena.dummies.push(DummyZone {
            id: DummyId(0),
            zone: ZoneId(0),
            coord: ProjPoint::new(50_000.0, 0.0),
            latlon: LatLon::new(48.0, 11.7),
            transfer_activities: vec![ActivityType::Home, ActivityType::Work],
        });
        arena
    }
}

#[cfg(test)]
mod deterrence {
    use crate::DistanceDistributions;
    use dg_core::ActivityType;

    #[test]
    fn embedded_table_loads_all_regions() {
        let table = DistanceDistributions::embedded();
        for r in 1..=7u8 {
            for t in ActivityType::ALL {
                assert!(table.params(r, t).scale_m > 0.0);
            }
        }
    }

    #[test]
    fn zero_distance_is_clamped_not_nan() {
        let table = DistanceDistributions::embedded();
        let v = table.density(3, ActivityType::Shopping, 0.0);
        assert!(v.is_finite());
    }

    #[test]
    fn density_decays_beyond_the_scale() {
        let table = DistanceDistributions::embedded();
        let p = table.params(1, ActivityType::Work);
        let near = table.density(1, ActivityType::Work, p.scale_m);
        let far = table.density(1, ActivityType::Work, p.scale_m * 10.0);
        assert!(near > far);
    }

    #[test]
    fn rural_trips_are_longer() {
        // Rural scale exceeds urban scale for every activity.
        let table = DistanceDistributions::embedded();
        for t in dg_core::ActivityType::ALL {
            assert!(table.params(7, t).scale_m > table.params(1, t).scale_m);
        }
    }
}

#[cfg(test)]
mod attraction {
    use super::helpers::arena;
    use crate::compute_attractions;
    use dg_core::ActivityType;

    #[test]
    fn pois_drive_their_activity() {
        let mut arena = arena();
        arena.buildings[0].poi.shops = 5;
        arena.buildings[1].poi.shops = 0;
        compute_attractions(&mut arena);
        assert!(
            arena.buildings[0].attraction[ActivityType::Shopping.index()]
                > arena.buildings[1].attraction[ActivityType::Shopping.index()]
        );
    }

    #[test]
    fn population_drives_home() {
        let mut arena = arena();
        arena.buildings[0].population = 50.0;
        arena.buildings[1].population = 5.0;
        compute_attractions(&mut arena);
        assert_eq!(
            arena.buildings[0].attraction[ActivityType::Home.index()],
            50.0
        );
    }

    #[test]
    fn cell_sums_rebuilt() {
        let mut arena = arena();
        compute_attractions(&mut arena);
        for cell in &arena.cells {
            for t in ActivityType::ALL {
                let sum: f64 = cell
                    .members
                    .iter()
                    .map(|&b| arena.buildings[b.index()].attraction[t.index()])
                    .sum();
                assert_eq!(cell.attraction[t.index()], sum);
            }
        }
    }

    #[test]
    fn attractions_never_negative() {
        let mut arena = arena();
        compute_attractions(&mut arena);
        for b in &arena.buildings {
            assert!(b.attraction.iter().all(|&a| a >= 0.0));
        }
    }
}

#[cfg(test)]
mod engine {
    use super::helpers::arena;
    use crate::{DestinationChooser, DistanceDistributions};
    use dg_core::{ActivityType, AgentId, CellId, DummyId, LocRef, RunSeed, SeedDomain};
    use dg_routing::{BeelineRouter, DistanceCache, DistanceCacheConfig};

    #[test]
    fn nearer_cell_preferred_at_equal_attraction() {
        let arena = arena();
        let det = DistanceDistributions::embedded();
        let cache = DistanceCache::new(DistanceCacheConfig::default());
        let chooser = DestinationChooser::new(&arena, &det, &cache, &BeelineRouter);

        let origin = LocRef::Building(dg_core::BuildingId(0));
        let w = chooser.weights(
            Some(origin),
            &[LocRef::Cell(CellId(0)), LocRef::Cell(CellId(1))],
            ActivityType::Shopping,
        );
        assert!(w[0] > w[1], "same attraction, shorter distance must win: {w:?}");
    }

    #[test]
    fn originless_weights_are_attraction_only() {
        let mut arena = arena();
        arena.cells[1].attraction = [4.0; ActivityType::COUNT];
        let det = DistanceDistributions::embedded();
        let cache = DistanceCache::new(DistanceCacheConfig::default());
        let chooser = DestinationChooser::new(&arena, &det, &cache, &BeelineRouter);

        let w = chooser.weights(
            None,
            &[LocRef::Cell(CellId(0)), LocRef::Cell(CellId(1))],
            ActivityType::Home,
        );
        assert_eq!(w[1] / w[0], 2.0);
    }

    #[test]
    fn two_stage_select_returns_member_building() {
        let arena = arena();
        let det = DistanceDistributions::embedded();
        let cache = DistanceCache::new(DistanceCacheConfig::default());
        let chooser = DestinationChooser::new(&arena, &det, &cache, &BeelineRouter);
        let mut rng = RunSeed::new(42).agent(SeedDomain::Anchors, AgentId(0));

        for _ in 0..50 {
            let picked = chooser.select(
                LocRef::Building(dg_core::BuildingId(0)),
                ActivityType::Shopping,
                &mut rng,
            );
            let LocRef::Building(b) = picked else {
                panic!("expected a building, got {picked:?}");
            };
            let cell = arena.buildings[b.index()].cell;
            assert!(arena.cells[cell.index()].members.contains(&b));
        }
    }

    #[test]
    fn dummy_without_transfer_self_loops() {
        let arena = arena(); // dummy transfers HOME/WORK only
        let det = DistanceDistributions::embedded();
        let cache = DistanceCache::new(DistanceCacheConfig::default());
        let chooser = DestinationChooser::new(&arena, &det, &cache, &BeelineRouter);
        let mut rng = RunSeed::new(1).agent(SeedDomain::Anchors, AgentId(0));

        let origin = LocRef::Dummy(DummyId(0));
        let picked = chooser.select(origin, ActivityType::Shopping, &mut rng);
        assert_eq!(picked, origin);
    }

    #[test]
    fn zero_weights_fall_back_to_uniform() {
        let mut arena = arena();
        for b in &mut arena.buildings {
            b.attraction = [0.0; ActivityType::COUNT];
        }
        for c in &mut arena.cells {
            c.attraction = [0.0; ActivityType::COUNT];
        }
        let det = DistanceDistributions::embedded();
        let cache = DistanceCache::new(DistanceCacheConfig::default());
        let chooser = DestinationChooser::new(&arena, &det, &cache, &BeelineRouter);
        let mut rng = RunSeed::new(9).agent(SeedDomain::Anchors, AgentId(0));

        // Must not panic; any location is acceptable.
        let picked = chooser.select(
            LocRef::Building(dg_core::BuildingId(0)),
            ActivityType::Other,
            &mut rng,
        );
        let _ = picked;
    }
}

#[cfg(test)]
mod od {
    use geo::polygon;
    use geo::MultiPolygon;

    use crate::od::parse_od_matrix;
    use crate::ChoiceError;
    use dg_core::TransverseMercator;

    /// Covers the projected band of lat ≈ 48° (TM northing ≈ 5.3e6 m).
    fn focus() -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: -200_000.0, y: 5_100_000.0),
            (x: 200_000.0, y: 5_100_000.0),
            (x: 200_000.0, y: 5_500_000.0),
            (x: -200_000.0, y: 5_500_000.0),
            (x: -200_000.0, y: 5_100_000.0),
        ]])
    }

    fn zone_feature(name: &str, origin: &str, dest: &str, lon: f64, flows: &str) -> String {
        format!(
            r#"{{"type":"Feature","properties":{{"name":"{name}","origin_activity":"{origin}","destination_activity":"{dest}","destinations":{flows}}},"geometry":{{"type":"Polygon","coordinates":[[[{a},47.9],[{b},47.9],[{b},48.1],[{a},48.1],[{a},47.9]]]}}}}"#,
            a = lon,
            b = lon + 0.1,
        )
    }

    #[test]
    fn parses_zones_and_flows() {
        let raw = format!(
            r#"{{"type":"FeatureCollection","features":[{},{}]}}"#,
            zone_feature("A", "HOME", "WORK", 11.0, r#"{"B": 100.0}"#),
            zone_feature("B", "HOME", "WORK", 11.2, r#"{"A": 25.0}"#),
        );
        let tm = TransverseMercator::new(11.1);
        let od = parse_od_matrix(&raw, &tm, &focus()).unwrap();

        assert_eq!(od.zones.len(), 2);
        let a = &od.zones[0];
        assert_eq!(a.name, "A");
        assert_eq!(a.flows.get(&od.zones[1].id), Some(&100.0));
        assert!(a.overlaps_focus);
    }

    #[test]
    fn rejects_unsupported_activity_pair() {
        let raw = format!(
            r#"{{"type":"FeatureCollection","features":[{}]}}"#,
            zone_feature("A", "HOME", "SHOPPING", 11.0, "{}"),
        );
        let tm = TransverseMercator::new(11.0);
        let res = parse_od_matrix(&raw, &tm, &focus());
        assert!(matches!(res, Err(ChoiceError::UnsupportedOdPair { .. })));
    }

    #[test]
    fn rejects_negative_flow() {
        let raw = format!(
            r#"{{"type":"FeatureCollection","features":[{},{}]}}"#,
            zone_feature("A", "HOME", "WORK", 11.0, r#"{"B": -5.0}"#),
            zone_feature("B", "HOME", "WORK", 11.2, "{}"),
        );
        let tm = TransverseMercator::new(11.1);
        assert!(parse_od_matrix(&raw, &tm, &focus()).is_err());
    }
}

#[cfg(test)]
mod kfactor {
    use super::helpers::arena;
    use crate::kfactor::calibrate_k_factors;
    use crate::od::parse_od_matrix;
    use crate::{DestinationChooser, DistanceDistributions};
    use dg_core::{ActivityType, TransverseMercator, ZoneId};
    use dg_routing::{BeelineRouter, DistanceCache, DistanceCacheConfig};
    use geo::{polygon, MultiPolygon};

    /// Covers the projected band of lat ≈ 48° (TM northing ≈ 5.3e6 m).
    fn focus() -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: -1e6, y: 4_500_000.0),
            (x: 1e6, y: 4_500_000.0),
            (x: 1e6, y: 6_000_000.0),
            (x: -1e6, y: 6_000_000.0),
            (x: -1e6, y: 4_500_000.0),
        ]])
    }

    #[test]
    fn lopsided_flow_raises_the_pair_factor() {
        // Zone A covers cell 0, zone B covers cell 1 (the fixture arena's
        // buildings sit near lon 11.0 / 11.05 at lat 48).
        let raw = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"name":"A","origin_activity":"HOME","destination_activity":"WORK","destinations":{"B":100.0}},
             "geometry":{"type":"Polygon","coordinates":[[[10.99,47.99],[11.02,47.99],[11.02,48.01],[10.99,48.01],[10.99,47.99]]]}},
            {"type":"Feature","properties":{"name":"B","origin_activity":"HOME","destination_activity":"WORK","destinations":{}},
             "geometry":{"type":"Polygon","coordinates":[[[11.03,47.99],[11.08,47.99],[11.08,48.01],[11.03,48.01],[11.03,47.99]]]}}
        ]}"#;
        let tm = TransverseMercator::new(11.0);
        let od = parse_od_matrix(raw, &tm, &focus()).unwrap();

        let mut arena = arena();
        // Stamp zones by hand: cell 0 → A, cell 1 → B.
        arena.cells[0].od_zone = Some(ZoneId(0));
        arena.cells[1].od_zone = Some(ZoneId(1));
        for i in 0..2 {
            arena.buildings[i].od_zone = Some(ZoneId(0));
        }
        for i in 2..4 {
            arena.buildings[i].od_zone = Some(ZoneId(1));
        }

        let det = DistanceDistributions::embedded();
        let cache = DistanceCache::new(DistanceCacheConfig::default());
        let chooser = DestinationChooser::new(&arena, &det, &cache, &BeelineRouter);
        let table = calibrate_k_factors(&chooser, &od);

        // All observed flow goes A→B, so the A→B transition factor must
        // exceed the A→A one.
        let ab = table.factor(ActivityType::Work, Some(ZoneId(0)), Some(ZoneId(1)));
        let aa = table.factor(ActivityType::Work, Some(ZoneId(0)), Some(ZoneId(0)));
        assert!(ab > aa, "A→B {ab} should exceed A→A {aa}");
    }

    #[test]
    fn missing_entries_default_to_one() {
        let table = crate::kfactor::KFactorTable::default();
        assert_eq!(
            table.factor(ActivityType::Work, Some(ZoneId(0)), Some(ZoneId(9))),
            1.0
        );
        assert_eq!(table.factor(ActivityType::Shopping, None, None), 1.0);
    }
}
