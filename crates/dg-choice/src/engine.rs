//! The destination chooser: gravity weights and two-stage sampling.

use dg_core::{ActivityType, CumulativeDist, DemandRng, LocRef, LocationArena, ZoneId};
use dg_routing::{CacheEndpoint, DistanceCache, RoutePoint, Router};

use crate::deterrence::DistanceDistributions;
use crate::kfactor::KFactorTable;

/// Destination-choice engine shared (immutably) by the agent factory and
/// the simulation loop.
///
/// # Two-stage sampling
///
/// Destinations are sampled aggregate-then-refine: first a cell (or dummy
/// zone) with probability ∝ gravity weight, then a building inside the
/// chosen cell.  Sampling at the building level directly would cost
/// O(buildings) router queries per trip; the two-stage approach is
/// approximately exact because the deterrence function is nearly flat
/// across distances within one cell.
pub struct DestinationChooser<'a> {
    arena: &'a LocationArena,
    deterrence: &'a DistanceDistributions,
    cache: &'a DistanceCache,
    router: &'a dyn Router,
    k_factors: Option<KFactorTable>,
    /// Stage-1 candidates: every cell, then every dummy zone.
    stage1: Vec<LocRef>,
}

impl<'a> DestinationChooser<'a> {
    pub fn new(
        arena: &'a LocationArena,
        deterrence: &'a DistanceDistributions,
        cache: &'a DistanceCache,
        router: &'a dyn Router,
    ) -> Self {
        let mut stage1 = arena.cell_refs();
        stage1.extend(
            (0..arena.dummies.len()).map(|i| LocRef::Dummy(dg_core::DummyId(i as u32))),
        );
        Self {
            arena,
            deterrence,
            cache,
            router,
            k_factors: None,
            stage1,
        }
    }

    /// Attach the calibrated k-factor table (after C7 runs).
    pub fn set_k_factors(&mut self, table: KFactorTable) {
        self.k_factors = Some(table);
    }

    pub fn arena(&self) -> &LocationArena {
        self.arena
    }

    pub fn stage1_candidates(&self) -> &[LocRef] {
        &self.stage1
    }

    // ── Weights ───────────────────────────────────────────────────────────

    /// Gravity weights of `dests` for activity `t` seen from `origin`.
    ///
    /// With `origin = None` (home-zone selection, origin calibration) the
    /// distance term is dropped and only `k × A_t` remains.
    pub fn weights(&self, origin: Option<LocRef>, dests: &[LocRef], t: ActivityType) -> Vec<f64> {
        let origin_zone = origin.and_then(|o| self.arena.od_zone(o));

        let distances = origin.map(|o| {
            let endpoints: Vec<CacheEndpoint> =
                dests.iter().map(|&d| self.endpoint(d)).collect();
            self.cache
                .distances_from_to(self.endpoint(o), &endpoints, self.router)
        });
        let region = origin.map(|o| self.arena.region_type(o));

        dests
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                let attraction = self.arena.attraction(d, t);
                if attraction <= 0.0 {
                    return 0.0;
                }
                let k = self.k_factor(t, origin_zone, self.arena.od_zone(d));

                match (&distances, origin) {
                    (Some(dist), Some(o)) => {
                        let meters = if o == d {
                            self.arena.avg_distance_to_self(o)
                        } else {
                            dist[i]
                        };
                        k * attraction * self.deterrence.density(region.unwrap(), t, meters)
                    }
                    _ => k * attraction,
                }
            })
            .collect()
    }

    /// Stage-1 weights over all cells and dummy zones.
    pub fn stage1_weights(&self, origin: Option<LocRef>, t: ActivityType) -> Vec<f64> {
        self.weights(origin, &self.stage1, t)
    }

    // ── Sampling ──────────────────────────────────────────────────────────

    /// Sample an index from `weights`, substituting a uniform draw over the
    /// candidate set when every weight is zero (logged once per call site
    /// by the `warn!` here).
    pub fn sample_index(weights: &[f64], rng: &mut DemandRng) -> usize {
        match CumulativeDist::new(weights) {
            Ok(cum) => cum.sample(rng.u01()),
            Err(_) => {
                log::warn!("all destination weights are zero; sampling uniformly");
                CumulativeDist::uniform(weights.len()).sample(rng.u01())
            }
        }
    }

    /// Two-stage destination selection for a flexible activity.
    ///
    /// Honors the dummy self-loop invariant: a SHOPPING/OTHER query from a
    /// dummy zone that does not transfer the activity resolves to the
    /// origin itself.
    pub fn select(&self, origin: LocRef, t: ActivityType, rng: &mut DemandRng) -> LocRef {
        if let LocRef::Dummy(id) = origin {
            if !self.arena.dummy(id).transfers(t) {
                return origin;
            }
        }

        let weights = self.stage1_weights(Some(origin), t);
        let choice = self.stage1[Self::sample_index(&weights, rng)];

        match choice {
            LocRef::Cell(cell) => self.select_building_in_cell(cell, Some(origin), t, rng),
            other => other,
        }
    }

    /// Stage 2: pick a member building of `cell` by gravity weight.
    pub fn select_building_in_cell(
        &self,
        cell: dg_core::CellId,
        origin: Option<LocRef>,
        t: ActivityType,
        rng: &mut DemandRng,
    ) -> LocRef {
        let members: Vec<LocRef> = self
            .arena
            .cell(cell)
            .members
            .iter()
            .map(|&b| LocRef::Building(b))
            .collect();
        debug_assert!(!members.is_empty(), "cells always have members");

        let weights = self.weights(origin, &members, t);
        members[Self::sample_index(&weights, rng)]
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn endpoint(&self, r: LocRef) -> CacheEndpoint {
        CacheEndpoint {
            key: self.arena.route_key(r),
            point: RoutePoint {
                proj: self.arena.coord(r),
                latlon: self.arena.latlon(r),
            },
        }
    }

    fn k_factor(
        &self,
        t: ActivityType,
        origin_zone: Option<ZoneId>,
        dest_zone: Option<ZoneId>,
    ) -> f64 {
        match &self.k_factors {
            Some(table) => table.factor(t, origin_zone, dest_zone),
            None => 1.0,
        }
    }
}
