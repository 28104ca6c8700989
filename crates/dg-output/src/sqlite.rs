//! SQLite output backend.
//!
//! Creates one database with three tables (`agents`, `activities`,
//! `trips`) and batch-inserts through prepared statements inside a single
//! transaction per table group.

use std::path::Path;

use rusqlite::Connection;

use dg_core::Agent;
use dg_sim::clock;

use crate::writer::{DiaryWriter, OutputContext};
use crate::OutputResult;

pub struct SqliteWriter {
    conn: Connection,
}

impl SqliteWriter {
    /// Open (or create) the database and initialise the schema.
    pub fn new(path: &Path) -> OutputResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             CREATE TABLE IF NOT EXISTS agents (
                 id            INTEGER PRIMARY KEY,
                 hom_group     TEXT NOT NULL,
                 mob_group     TEXT NOT NULL,
                 age           INTEGER,
                 sex           TEXT NOT NULL,
                 car_access    INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS activities (
                 agent_id      INTEGER NOT NULL,
                 day           INTEGER NOT NULL,
                 day_type      TEXT NOT NULL,
                 leg_id        INTEGER NOT NULL,
                 activity_type TEXT NOT NULL,
                 start_minutes REAL NOT NULL,
                 stay_minutes  REAL,
                 lat           REAL NOT NULL,
                 lon           REAL NOT NULL,
                 dummy_loc     INTEGER NOT NULL,
                 in_focus      INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS trips (
                 agent_id      INTEGER NOT NULL,
                 day           INTEGER NOT NULL,
                 leg_id        INTEGER NOT NULL,
                 mode          TEXT NOT NULL,
                 start_minutes REAL NOT NULL,
                 distance_km   REAL,
                 time_minutes  REAL
             );",
        )?;

        Ok(Self { conn })
    }
}

impl DiaryWriter for SqliteWriter {
    fn write(&mut self, agents: &[Agent], ctx: &OutputContext<'_>) -> OutputResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut agent_stmt = tx.prepare_cached(
                "INSERT INTO agents (id, hom_group, mob_group, age, sex, car_access) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            let mut act_stmt = tx.prepare_cached(
                "INSERT INTO activities \
                 (agent_id, day, day_type, leg_id, activity_type, start_minutes, \
                  stay_minutes, lat, lon, dummy_loc, in_focus) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            let mut trip_stmt = tx.prepare_cached(
                "INSERT INTO trips \
                 (agent_id, day, leg_id, mode, start_minutes, distance_km, time_minutes) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for agent in agents {
                agent_stmt.execute(rusqlite::params![
                    agent.id.0,
                    format!("{:?}", agent.features.hom_group),
                    format!("{:?}", agent.features.mob_group),
                    agent.features.age,
                    format!("{:?}", agent.features.sex),
                    agent.car_access as i64,
                ])?;

                for diary in &agent.diaries {
                    let (act_starts, trip_starts) = clock::leg_start_minutes(diary);
                    let mut leg_id = 0u32;
                    for (i, activity) in diary.activities.iter().enumerate() {
                        let latlon = ctx.arena.latlon(activity.location);
                        act_stmt.execute(rusqlite::params![
                            agent.id.0,
                            diary.day,
                            diary.day_type.as_str(),
                            leg_id,
                            activity.kind.as_str(),
                            act_starts[i],
                            activity.stay_minutes,
                            latlon.lat,
                            latlon.lon,
                            matches!(activity.location, dg_core::LocRef::Dummy(_)) as i64,
                            ctx.arena.in_focus(activity.location) as i64,
                        ])?;
                        leg_id += 1;

                        if let Some(trip) = diary.trips.get(i) {
                            trip_stmt.execute(rusqlite::params![
                                agent.id.0,
                                diary.day,
                                leg_id,
                                trip.mode.as_str(),
                                trip_starts[i],
                                trip.distance_km,
                                trip.time_minutes,
                            ])?;
                            leg_id += 1;
                        }
                    }
                }
            }
        }
        tx.commit()?;
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}
