//! JSON output backend.
//!
//! Emits one top-level object:
//!
//! ```json
//! {"runParameters": {...}, "agents": [...]}
//! ```
//!
//! Each agent's `mobilityDemand` holds one diary per day whose `plan`
//! alternates Activity and Trip legs.  Map keys are emitted in sorted
//! order, so identical runs produce byte-identical files.

use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

use dg_core::{Agent, Diary, LocRef, Sex};
use dg_sim::clock;

use crate::writer::{DiaryWriter, OutputContext};
use crate::OutputResult;

pub struct JsonWriter {
    path: PathBuf,
}

impl JsonWriter {
    pub fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf() }
    }

    fn diary_value(diary: &Diary, ctx: &OutputContext<'_>) -> Value {
        let (act_starts, trip_starts) = clock::leg_start_minutes(diary);

        let mut plan: Vec<Value> = Vec::with_capacity(diary.activities.len() * 2);
        let mut leg_id = 0u32;
        for (i, activity) in diary.activities.iter().enumerate() {
            let latlon = ctx.arena.latlon(activity.location);
            let mut leg = Map::new();
            leg.insert("type".into(), json!("Activity"));
            leg.insert("legID".into(), json!(leg_id));
            leg.insert("activityType".into(), json!(activity.kind.as_str()));
            leg.insert(
                "startTime".into(),
                json!(clock::format_hhmm(act_starts[i])),
            );
            if let Some(stay) = activity.stay_minutes {
                leg.insert("stayTimeMinute".into(), json!(stay));
            }
            leg.insert("lat".into(), json!(latlon.lat));
            leg.insert("lon".into(), json!(latlon.lon));
            leg.insert(
                "dummyLoc".into(),
                json!(matches!(activity.location, LocRef::Dummy(_))),
            );
            leg.insert(
                "inFocusArea".into(),
                json!(ctx.arena.in_focus(activity.location)),
            );
            plan.push(Value::Object(leg));
            leg_id += 1;

            if let Some(trip) = diary.trips.get(i) {
                let mut t = Map::new();
                t.insert("type".into(), json!("Trip"));
                t.insert("legID".into(), json!(leg_id));
                t.insert("mode".into(), json!(trip.mode.as_str()));
                t.insert(
                    "startTime".into(),
                    json!(clock::format_hhmm(trip_starts[i])),
                );
                if let Some(d) = trip.distance_km {
                    t.insert("distanceKilometer".into(), json!(d));
                }
                if let Some(m) = trip.time_minutes {
                    t.insert("timeMinute".into(), json!(m));
                }
                if let Some(lats) = &trip.path_lats {
                    t.insert("lats".into(), json!(lats));
                }
                if let Some(lons) = &trip.path_lons {
                    t.insert("lons".into(), json!(lons));
                }
                plan.push(Value::Object(t));
                leg_id += 1;
            }
        }

        json!({
            "day": diary.day,
            "dayType": diary.day_type.as_str(),
            "plan": plan,
        })
    }

    fn agent_value(agent: &Agent, ctx: &OutputContext<'_>) -> Value {
        json!({
            "id": agent.id.0,
            "homogenousGroup": agent.features.hom_group,
            "mobilityGroup": agent.features.mob_group,
            "age": agent.features.age,
            "sex": match agent.features.sex {
                Sex::Male => "male",
                Sex::Female => "female",
                Sex::Undefined => "undefined",
            },
            "carAccess": agent.car_access,
            "mobilityDemand": agent
                .diaries
                .iter()
                .map(|d| Self::diary_value(d, ctx))
                .collect::<Vec<_>>(),
        })
    }
}

impl DiaryWriter for JsonWriter {
    fn write(&mut self, agents: &[Agent], ctx: &OutputContext<'_>) -> OutputResult<()> {
        let doc = json!({
            "runParameters": ctx.run_parameters,
            "agents": agents
                .iter()
                .map(|a| Self::agent_value(a, ctx))
                .collect::<Vec<_>>(),
        });
        std::fs::write(&self.path, serde_json::to_string_pretty(&doc)?)?;
        Ok(())
    }
}
