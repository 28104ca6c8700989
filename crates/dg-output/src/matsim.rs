//! MATSim population XML backend.
//!
//! Writes a `population_v6`-style plans file: one `<person>` per agent,
//! one selected `<plan>` per simulated day is not expressible in MATSim,
//! so the first day's diary becomes the selected plan and further days are
//! appended as unselected plans.
//!
//! Coordinates are emitted in `--matsim_output_crs`: `EPSG:4326` (default)
//! or the run's model CRS.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use dg_core::{Agent, Diary};
use dg_sim::clock;

use crate::writer::{DiaryWriter, OutputContext};
use crate::OutputResult;

pub struct MatsimWriter {
    path: PathBuf,
}

impl MatsimWriter {
    pub fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf() }
    }

    fn plan_xml(
        out: &mut String,
        diary: &Diary,
        selected: bool,
        ctx: &OutputContext<'_>,
    ) {
        let (act_starts, _) = clock::leg_start_minutes(diary);
        let selected_attr = if selected { "yes" } else { "no" };
        let _ = writeln!(out, "    <plan selected=\"{selected_attr}\">");

        for (i, activity) in diary.activities.iter().enumerate() {
            let latlon = ctx.arena.latlon(activity.location);
            let (x, y) = if ctx.matsim_crs == "EPSG:4326" {
                (latlon.lon, latlon.lat)
            } else {
                let p = ctx.arena.coord(activity.location);
                (p.x, p.y)
            };

            let end = activity
                .stay_minutes
                .map(|stay| format!(" end_time=\"{}:00\"", clock::format_hhmm(act_starts[i] + stay)));
            let _ = writeln!(
                out,
                "      <act type=\"{}\" x=\"{x:.6}\" y=\"{y:.6}\"{}/>",
                xml_escape(activity.kind.as_str()),
                end.unwrap_or_default(),
            );

            if let Some(trip) = diary.trips.get(i) {
                let _ = writeln!(
                    out,
                    "      <leg mode=\"{}\"/>",
                    xml_escape(trip.mode.as_str())
                );
            }
        }
        let _ = writeln!(out, "    </plan>");
    }
}

impl DiaryWriter for MatsimWriter {
    fn write(&mut self, agents: &[Agent], ctx: &OutputContext<'_>) -> OutputResult<()> {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        out.push_str(
            "<!DOCTYPE population SYSTEM \"http://www.matsim.org/files/dtd/population_v6.dtd\">\n",
        );
        let _ = writeln!(
            out,
            "<population desc=\"synthetic mobility demand ({})\">",
            xml_escape(&ctx.matsim_crs)
        );

        for agent in agents {
            let _ = writeln!(out, "  <person id=\"{}\">", agent.id.0);
            for (i, diary) in agent.diaries.iter().enumerate() {
                Self::plan_xml(&mut out, diary, i == 0, ctx);
            }
            out.push_str("  </person>\n");
        }
        out.push_str("</population>\n");

        std::fs::write(&self.path, out)?;
        Ok(())
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
