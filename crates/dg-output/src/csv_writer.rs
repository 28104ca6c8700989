//! CSV output backend: one flat row per leg.

use std::fs::File;
use std::path::Path;

use csv::Writer;

use dg_core::Agent;
use dg_sim::clock;

use crate::writer::{DiaryWriter, OutputContext};
use crate::OutputResult;

pub struct CsvWriter {
    inner: Writer<File>,
}

impl CsvWriter {
    pub fn new(path: &Path) -> OutputResult<Self> {
        let mut inner = Writer::from_path(path)?;
        inner.write_record([
            "agent_id",
            "day",
            "day_type",
            "leg_id",
            "leg_type",
            "activity_type",
            "mode",
            "start_time",
            "stay_minutes",
            "distance_km",
            "time_minutes",
            "lat",
            "lon",
            "in_focus",
        ])?;
        Ok(Self { inner })
    }
}

impl DiaryWriter for CsvWriter {
    fn write(&mut self, agents: &[Agent], ctx: &OutputContext<'_>) -> OutputResult<()> {
        let fmt_opt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();

        for agent in agents {
            for diary in &agent.diaries {
                let (act_starts, trip_starts) = clock::leg_start_minutes(diary);
                let mut leg_id = 0u32;

                for (i, activity) in diary.activities.iter().enumerate() {
                    let latlon = ctx.arena.latlon(activity.location);
                    self.inner.write_record([
                        agent.id.0.to_string(),
                        diary.day.to_string(),
                        diary.day_type.as_str().to_string(),
                        leg_id.to_string(),
                        "activity".to_string(),
                        activity.kind.as_str().to_string(),
                        String::new(),
                        clock::format_hhmm(act_starts[i]),
                        fmt_opt(activity.stay_minutes),
                        String::new(),
                        String::new(),
                        latlon.lat.to_string(),
                        latlon.lon.to_string(),
                        ctx.arena.in_focus(activity.location).to_string(),
                    ])?;
                    leg_id += 1;

                    if let Some(trip) = diary.trips.get(i) {
                        // Trips have no location of their own; the geometry
                        // columns stay empty.
                        self.inner.write_record([
                            agent.id.0.to_string(),
                            diary.day.to_string(),
                            diary.day_type.as_str().to_string(),
                            leg_id.to_string(),
                            "trip".to_string(),
                            String::new(),
                            trip.mode.as_str().to_string(),
                            clock::format_hhmm(trip_starts[i]),
                            String::new(),
                            fmt_opt(trip.distance_km),
                            fmt_opt(trip.time_minutes),
                            String::new(),
                            String::new(),
                            String::new(),
                        ])?;
                        leg_id += 1;
                    }
                }
            }
        }
        self.inner.flush()?;
        Ok(())
    }
}
