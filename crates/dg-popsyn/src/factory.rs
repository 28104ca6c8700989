//! The agent factory: feature sampling plus anchor-location resolution.

use rustc_hash::FxHashMap;

use dg_choice::DestinationChooser;
use dg_core::{
    ActivityType, Agent, AgentId, CellId, CumulativeDist, DemandRng, LocRef, RunSeed,
    SeedDomain, SocioDemFeatures,
};

use crate::features::{assign_deterministic, assign_random, enumerate_tuples};
use crate::strata::PopulationStrata;
use crate::{PopError, PopResult};

#[derive(Clone, Debug)]
pub struct AgentFactoryConfig {
    /// Focus-area agent count.
    pub n_agents: usize,
    /// Also synthesize buffer-area residents so the focus/buffer split
    /// matches the census.
    pub populate_buffer: bool,
    /// Random with-replacement feature draws instead of the deterministic
    /// assignment.
    pub random_features: bool,
    pub seed: u64,
}

/// Builds the agent population.
///
/// Work and school anchors are resolved for **every** agent — even when
/// the homogeneous group never uses them — so the simulation loop carries
/// no special cases.
pub struct AgentFactory<'a> {
    strata: &'a PopulationStrata,
    chooser: &'a DestinationChooser<'a>,
    config: AgentFactoryConfig,
    /// Per-(home-cell, activity) cumulative stage-1 distribution.  Anchor
    /// choice from every home in the same cell shares one table, which is
    /// what makes anchor resolution affordable.
    zone_cum: FxHashMap<(CellId, ActivityType), CumulativeDist>,
}

impl<'a> AgentFactory<'a> {
    pub fn new(
        strata: &'a PopulationStrata,
        chooser: &'a DestinationChooser<'a>,
        config: AgentFactoryConfig,
    ) -> Self {
        Self {
            strata,
            chooser,
            config,
            zone_cum: FxHashMap::default(),
        }
    }

    /// Produce the population.
    ///
    /// The first `n_agents` entries are guaranteed to live in the focus
    /// area; buffer residents (when enabled) follow after them.
    pub fn create_agents(&mut self) -> PopResult<Vec<Agent>> {
        let arena = self.chooser.arena();

        // ── Partition stage-1 candidates by focus membership ──────────────
        let focus_candidates: Vec<LocRef> = self
            .chooser
            .stage1_candidates()
            .iter()
            .copied()
            .filter(|&r| arena.in_focus(r))
            .collect();
        if focus_candidates.is_empty() {
            return Err(PopError::Config(
                "no home candidates inside the focus area".into(),
            ));
        }
        let buffer_candidates: Vec<LocRef> = self
            .chooser
            .stage1_candidates()
            .iter()
            .copied()
            .filter(|&r| !arena.in_focus(r))
            .collect();

        // ── Buffer population from the census split ───────────────────────
        let n_focus = self.config.n_agents;
        let n_buffer = if self.config.populate_buffer && !buffer_candidates.is_empty() {
            let focus_pop: f64 = arena
                .buildings
                .iter()
                .filter(|b| b.in_focus)
                .map(|b| b.population)
                .sum();
            let buffer_pop: f64 = arena
                .buildings
                .iter()
                .filter(|b| !b.in_focus)
                .map(|b| b.population)
                .sum();
            if focus_pop > 0.0 {
                (n_focus as f64 * buffer_pop / focus_pop).round() as usize
            } else {
                0
            }
        } else {
            0
        };
        let total = n_focus + n_buffer;

        // ── Feature assignment ────────────────────────────────────────────
        let tuples = enumerate_tuples(self.strata);
        let assignment = if self.config.random_features {
            let mut rng = RunSeed::new(self.config.seed).domain(SeedDomain::Features);
            assign_random(&tuples, total, &mut rng)?
        } else {
            assign_deterministic(&tuples, total)?
        };

        log::info!(
            "creating {total} agents ({n_focus} focus, {n_buffer} buffer) from {} feature tuples",
            tuples.len()
        );

        // ── Per-agent synthesis ───────────────────────────────────────────
        let mut agents = Vec::with_capacity(total);
        for i in 0..total {
            let id = AgentId(i as u32);
            let mut rng = RunSeed::new(self.config.seed).agent(SeedDomain::Anchors, id);
            let tuple = &tuples[assignment[i]];
            let stratum = &self.strata.strata[tuple.stratum];

            let features = SocioDemFeatures {
                hom_group: tuple.hom_group,
                mob_group: tuple.mob_group,
                age: stratum.sample_age_in_bin(tuple.age_bin, &mut rng),
                sex: tuple.sex,
            };
            let car_access = rng.gen_bool(stratum.car_ownership);

            let home_pool = if i < n_focus {
                &focus_candidates
            } else {
                &buffer_candidates
            };
            let home = self.sample_home(home_pool, &mut rng);
            let work = self.sample_anchor(home, ActivityType::Work, &mut rng);
            let school = self.sample_anchor(home, ActivityType::School, &mut rng);

            agents.push(Agent {
                id,
                features,
                home,
                work,
                school,
                car_access,
                diaries: Vec::new(),
            });
        }
        Ok(agents)
    }

    // ── Anchor resolution ─────────────────────────────────────────────────

    /// Home: originless HOME weights over the pool, then a building within
    /// the chosen cell (dummy zones are kept as-is).
    fn sample_home(&self, pool: &[LocRef], rng: &mut DemandRng) -> LocRef {
        let weights = self.chooser.weights(None, pool, ActivityType::Home);
        let choice = pool[DestinationChooser::sample_index(&weights, rng)];
        match choice {
            LocRef::Cell(cell) => {
                self.chooser
                    .select_building_in_cell(cell, None, ActivityType::Home, rng)
            }
            other => other,
        }
    }

    /// Work/school: full gravity from the home location, with the stage-1
    /// cumulative distribution cached per home cell.
    fn sample_anchor(
        &mut self,
        home: LocRef,
        activity: ActivityType,
        rng: &mut DemandRng,
    ) -> LocRef {
        let chooser = self.chooser;
        let home_cell = match home {
            LocRef::Building(b) => chooser.arena().building(b).cell,
            LocRef::Cell(c) => c,
            // Dummy homes run the gravity straight from the zone centroid;
            // nothing to cache per cell.
            LocRef::Dummy(_) => {
                let weights = chooser.stage1_weights(Some(home), activity);
                let choice =
                    chooser.stage1_candidates()[DestinationChooser::sample_index(&weights, rng)];
                return match choice {
                    LocRef::Cell(cell) => {
                        chooser.select_building_in_cell(cell, Some(home), activity, rng)
                    }
                    other => other,
                };
            }
        };

        let cum = self
            .zone_cum
            .entry((home_cell, activity))
            .or_insert_with(|| {
                let origin = LocRef::Cell(home_cell);
                let weights = chooser.stage1_weights(Some(origin), activity);
                CumulativeDist::new(&weights).unwrap_or_else(|_| {
                    log::warn!(
                        "all {activity} weights are zero from cell {home_cell}; using uniform"
                    );
                    CumulativeDist::uniform(weights.len())
                })
            });

        let choice = chooser.stage1_candidates()[cum.sample(rng.u01())];
        match choice {
            LocRef::Cell(cell) => chooser.select_building_in_cell(cell, Some(home), activity, rng),
            other => other,
        }
    }
}
