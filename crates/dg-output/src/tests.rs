//! Unit tests for dg-output.

#[cfg(test)]
mod helpers {
    use dg_core::{
        Activity, ActivityType, Agent, AgentId, Building, BuildingId, Cell, CellId, Diary,
        Landuse, LatLon, LocRef, LocationArena, Mode, PoiCounts, ProjPoint, SocioDemFeatures,
        Trip, Weekday,
    };

    pub fn arena() -> LocationArena {
        let mut arena = LocationArena::default();
        for i in 0..2u32 {
            arena.buildings.push(Building {
                id: BuildingId(i),
                coord: ProjPoint::new(i as f64 * 1_000.0, 0.0),
                latlon: LatLon::new(48.0, 11.0 + i as f64 * 0.01),
                area_m2: 100.0,
                population: 10.0,
                landuse: Landuse::Residential,
                poi: PoiCounts::default(),
                in_focus: true,
                od_zone: None,
                cell: CellId(0),
                attraction: [1.0; ActivityType::COUNT],
            });
        }
        arena.cells.push(Cell {
            id: CellId(0),
            centroid: ProjPoint::new(500.0, 0.0),
            latlon: LatLon::new(48.0, 11.005),
            members: vec![BuildingId(0), BuildingId(1)],
            attraction: [2.0; ActivityType::COUNT],
            population: 20.0,
            in_focus: true,
            od_zone: None,
            avg_distance_to_self: 500.0,
            region_type: 3,
        });
        arena
    }

    pub fn agent_with_diary() -> Agent {
        let home = LocRef::Building(BuildingId(0));
        let work = LocRef::Building(BuildingId(1));
        let mut diary = Diary::new(0, Weekday::Monday);
        diary.activities = vec![
            Activity { kind: ActivityType::Home, stay_minutes: Some(480.0), location: home },
            Activity { kind: ActivityType::Work, stay_minutes: Some(500.0), location: work },
            Activity { kind: ActivityType::Home, stay_minutes: None, location: home },
        ];
        diary.trips = vec![
            Trip {
                mode: Mode::CarDriver,
                distance_km: Some(1.0),
                time_minutes: Some(6.0),
                ..Trip::default()
            },
            Trip {
                mode: Mode::CarDriver,
                distance_km: Some(1.0),
                time_minutes: Some(6.0),
                ..Trip::default()
            },
        ];
        Agent {
            id: AgentId(0),
            features: SocioDemFeatures::default(),
            home,
            work,
            school: work,
            car_access: true,
            diaries: vec![diary],
        }
    }

    pub fn context(arena: &LocationArena) -> crate::OutputContext<'_> {
        crate::OutputContext {
            arena,
            run_parameters: serde_json::json!({"seed": 42, "n_agents": 1}),
            matsim_crs: "EPSG:4326".to_string(),
        }
    }
}

#[cfg(test)]
mod json {
    use super::helpers::{agent_with_diary, arena, context};
    use crate::writer::DiaryWriter;
    use crate::JsonWriter;

    #[test]
    fn legs_alternate_and_header_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let arena = arena();
        let ctx = context(&arena);
        let agents = vec![agent_with_diary()];

        JsonWriter::new(&path).write(&agents, &ctx).unwrap();
        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert!(doc.get("runParameters").is_some());
        let plan = &doc["agents"][0]["mobilityDemand"][0]["plan"];
        let legs = plan.as_array().unwrap();
        assert_eq!(legs.len(), 5); // A T A T A
        for (i, leg) in legs.iter().enumerate() {
            let expected = if i % 2 == 0 { "Activity" } else { "Trip" };
            assert_eq!(leg["type"], expected);
            assert_eq!(leg["legID"], i as u64);
        }
        // The final activity is open-ended.
        assert!(legs[4].get("stayTimeMinute").is_none());
        assert_eq!(legs[0]["startTime"], "00:00");
        assert_eq!(legs[1]["startTime"], "08:00");
    }

    #[test]
    fn output_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let arena = arena();
        let ctx = context(&arena);
        let agents = vec![agent_with_diary()];

        let p1 = dir.path().join("a.json");
        let p2 = dir.path().join("b.json");
        JsonWriter::new(&p1).write(&agents, &ctx).unwrap();
        JsonWriter::new(&p2).write(&agents, &ctx).unwrap();
        assert_eq!(
            std::fs::read(&p1).unwrap(),
            std::fs::read(&p2).unwrap(),
            "same inputs must produce byte-identical JSON"
        );
    }
}

#[cfg(test)]
mod csv {
    use super::helpers::{agent_with_diary, arena, context};
    use crate::writer::DiaryWriter;
    use crate::CsvWriter;

    #[test]
    fn one_row_per_leg_plus_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let arena = arena();
        let ctx = context(&arena);
        let agents = vec![agent_with_diary()];

        CsvWriter::new(&path).unwrap().write(&agents, &ctx).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 6); // header + 5 legs
    }
}

#[cfg(test)]
mod sqlite {
    use super::helpers::{agent_with_diary, arena, context};
    use crate::writer::DiaryWriter;
    use crate::SqliteWriter;

    #[test]
    fn tables_filled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.db");
        let arena = arena();
        let ctx = context(&arena);
        let agents = vec![agent_with_diary()];

        SqliteWriter::new(&path).unwrap().write(&agents, &ctx).unwrap();

        let conn = rusqlite::Connection::open(&path).unwrap();
        let agents_n: i64 = conn
            .query_row("SELECT COUNT(*) FROM agents", [], |r| r.get(0))
            .unwrap();
        let acts_n: i64 = conn
            .query_row("SELECT COUNT(*) FROM activities", [], |r| r.get(0))
            .unwrap();
        let trips_n: i64 = conn
            .query_row("SELECT COUNT(*) FROM trips", [], |r| r.get(0))
            .unwrap();
        assert_eq!((agents_n, acts_n, trips_n), (1, 3, 2));
    }
}

#[cfg(test)]
mod matsim {
    use super::helpers::{agent_with_diary, arena, context};
    use crate::writer::DiaryWriter;
    use crate::MatsimWriter;

    #[test]
    fn population_structure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xml");
        let arena = arena();
        let ctx = context(&arena);
        let agents = vec![agent_with_diary()];

        MatsimWriter::new(&path).write(&agents, &ctx).unwrap();
        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.contains("<population"));
        assert!(xml.contains("<person id=\"0\">"));
        assert!(xml.contains("<plan selected=\"yes\">"));
        assert_eq!(xml.matches("<act ").count(), 3);
        assert_eq!(xml.matches("<leg ").count(), 2);
    }
}

#[cfg(test)]
mod dispatch {
    use super::helpers::{agent_with_diary, arena, context};
    use crate::{write_output, OutputError};

    #[test]
    fn unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let arena = arena();
        let ctx = context(&arena);
        let agents = vec![agent_with_diary()];
        let res = write_output(&dir.path().join("out.parquet"), &agents, &ctx);
        assert!(matches!(res, Err(OutputError::UnsupportedFormat(_))));
    }

    #[test]
    fn extension_selects_backend() {
        let dir = tempfile::tempdir().unwrap();
        let arena = arena();
        let ctx = context(&arena);
        let agents = vec![agent_with_diary()];
        for name in ["o.json", "o.csv", "o.db", "o.xml"] {
            write_output(&dir.path().join(name), &agents, &ctx).unwrap();
            assert!(dir.path().join(name).exists());
        }
    }
}
