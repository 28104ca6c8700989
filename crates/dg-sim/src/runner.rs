//! The parallel simulation runner.
//!
//! Agents are independent: each draws from its own deterministically
//! derived stream, so parallel execution produces the same diaries as
//! sequential.  The output order equals the input order (`par_iter_mut`
//! over the slice), which is ascending agent ID by construction.
//!
//! # Per-agent failure policy
//!
//! Inside one agent's simulation every *modeled* failure resolves inline:
//! routing errors fall back to Euclidean distances, degenerate weight
//! vectors fall back to uniform draws.  What remains is the unmodeled
//! class — a panic from corrupt inputs, such as an agent whose anchors
//! point outside the location arena or user data that slipped past
//! validation.  The runner catches those per agent, logs, discards the
//! agent, and aborts the run when more than [`MAX_FAILURE_RATE`] of the
//! population was lost: a systematic input problem must not masquerade as
//! a handful of bad agents.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use dg_choice::DestinationChooser;
use dg_core::{Agent, Mode, RunSeed, SeedDomain, Weekday};
use dg_popsyn::ActivityDataStore;
use dg_routing::Router;

use crate::day::simulate_day;
use crate::modes::{resolve_trips, ModeChoice};
use crate::{SimError, SimResult};

/// Share of agents allowed to be discarded before the run aborts.
const MAX_FAILURE_RATE: f64 = 0.01;

// ── Configuration & stats ─────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct SimConfig {
    pub n_days: u32,
    pub start_weekday: Weekday,
    pub seed: u64,
    pub mode_choice: ModeChoice,
    pub return_path_coords: bool,
    /// Per-mode trip-time multipliers (`--mode_speed_up`).
    pub mode_speed_up: FxHashMap<Mode, f64>,
}

/// Aggregate counters reported after the run.
#[derive(Debug, Default)]
pub struct RunStats {
    pub agents: usize,
    pub failed: usize,
    pub diaries: usize,
    pub trips: usize,
    pub total_distance_km: f64,
    pub mode_counts: FxHashMap<Mode, usize>,
}

// ── Simulator ─────────────────────────────────────────────────────────────────

/// Drives the per-agent per-day loop.
pub struct Simulator<'a> {
    chooser: &'a DestinationChooser<'a>,
    store: &'a ActivityDataStore,
    router: &'a dyn Router,
    config: SimConfig,
}

impl<'a> Simulator<'a> {
    pub fn new(
        chooser: &'a DestinationChooser<'a>,
        store: &'a ActivityDataStore,
        router: &'a dyn Router,
        config: SimConfig,
    ) -> Self {
        Self { chooser, store, router, config }
    }

    /// Simulate every agent's diaries in place.
    ///
    /// Discarded agents are removed from `agents` (after logging); a
    /// failure rate above 1% aborts.  The cooperative `cancel` flag is
    /// checked between agents.
    pub fn run(&self, agents: &mut Vec<Agent>, cancel: &AtomicBool) -> SimResult<RunStats> {
        let total = agents.len();
        let failures = AtomicUsize::new(0);
        let completed = AtomicUsize::new(0);

        agents.par_iter_mut().for_each(|agent| {
            if cancel.load(Ordering::Relaxed) {
                return;
            }
            // The agent's state is discarded wholesale on unwind, so the
            // mutable borrow crossing the catch boundary is sound.
            let outcome = catch_unwind(AssertUnwindSafe(|| self.simulate_agent(agent)));
            match outcome {
                Ok(()) => {
                    completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(payload) => {
                    log::warn!(
                        "agent {} discarded: {}",
                        agent.id,
                        panic_message(payload.as_ref())
                    );
                    agent.diaries.clear();
                    failures.fetch_add(1, Ordering::Relaxed);
                }
            }
        });

        if cancel.load(Ordering::Relaxed) {
            return Err(SimError::Cancelled {
                completed: completed.load(Ordering::Relaxed),
            });
        }

        let failed = failures.load(Ordering::Relaxed);
        if failed > 0 {
            // Discarded agents are the ones with cleared diaries; every
            // surviving agent has n_days ≥ 1 of them.
            agents.retain(|a| !a.diaries.is_empty());
        }
        if failed as f64 > MAX_FAILURE_RATE * total as f64 {
            return Err(SimError::FailureRateExceeded { failed, total });
        }

        Ok(self.collect_stats(agents, failed))
    }

    /// Simulate all days for one agent.
    ///
    /// Total by construction — the fallbacks live in the callees; see the
    /// module docs for how residual panics are handled.
    fn simulate_agent(&self, agent: &mut Agent) {
        let mut rng = RunSeed::new(self.config.seed).agent(SeedDomain::Diaries, agent.id);
        let mut day_type = self.config.start_weekday;
        let mut carry = None;

        agent.diaries = Vec::with_capacity(self.config.n_days as usize);
        for day in 0..self.config.n_days {
            let mut diary = simulate_day(
                agent,
                day,
                day_type,
                carry.as_ref(),
                self.store,
                self.chooser,
                &mut rng,
            );
            resolve_trips(
                &mut diary,
                agent,
                self.chooser.arena(),
                self.router,
                &self.config.mode_choice,
                &self.config.mode_speed_up,
                self.config.return_path_coords,
                &mut rng,
            );

            carry = diary.activities.last().cloned();
            agent.diaries.push(diary);
            day_type = day_type.next();
        }
    }

    fn collect_stats(&self, agents: &[Agent], failed: usize) -> RunStats {
        let mut stats = RunStats {
            agents: agents.len(),
            failed,
            ..RunStats::default()
        };
        for agent in agents {
            stats.diaries += agent.diaries.len();
            for diary in &agent.diaries {
                stats.trips += diary.trips.len();
                for trip in &diary.trips {
                    *stats.mode_counts.entry(trip.mode).or_default() += 1;
                    stats.total_distance_km += trip.distance_km.unwrap_or(0.0);
                }
            }
        }
        stats
    }
}

/// Best-effort text of a caught panic payload.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
