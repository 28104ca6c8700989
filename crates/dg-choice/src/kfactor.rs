//! K-factor calibration against an observed OD matrix.
//!
//! Two tables are produced:
//!
//! - **Origin factors** (`HOME`, keyed by destination zone): corrects the
//!   model's share of home locations per zone toward the OD-implied share
//!   of outgoing flow.
//! - **Transition factors** (`WORK`, keyed by zone pair): corrects the
//!   model's home→work transition probability per zone pair toward the OD
//!   share, aggregated over each zone's locations.
//!
//! Only HOME→WORK tables are supported; the parser already rejects any
//! other activity pair.  Absent entries default to 1.

use rustc_hash::FxHashMap;

use dg_core::{ActivityType, LocRef, ZoneId};

use crate::engine::DestinationChooser;
use crate::od::OdMatrix;

// ── KFactorTable ──────────────────────────────────────────────────────────────

/// Multiplicative gravity-weight corrections per zone (HOME) and zone pair
/// (WORK).
#[derive(Default, Debug)]
pub struct KFactorTable {
    home: FxHashMap<ZoneId, f64>,
    work: FxHashMap<(ZoneId, ZoneId), f64>,
}

impl KFactorTable {
    /// The factor for one weight evaluation; 1.0 wherever no calibration
    /// entry exists.
    pub fn factor(
        &self,
        t: ActivityType,
        origin_zone: Option<ZoneId>,
        dest_zone: Option<ZoneId>,
    ) -> f64 {
        match t {
            ActivityType::Home => dest_zone
                .and_then(|z| self.home.get(&z).copied())
                .unwrap_or(1.0),
            ActivityType::Work => match (origin_zone, dest_zone) {
                (Some(o), Some(d)) => self.work.get(&(o, d)).copied().unwrap_or(1.0),
                _ => 1.0,
            },
            _ => 1.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.home.is_empty() && self.work.is_empty()
    }
}

// ── Calibration ───────────────────────────────────────────────────────────────

/// Build the k-factor tables by comparing model and OD shares.
///
/// `chooser` must not yet carry k-factors (the comparison is against the
/// uncorrected model).
pub fn calibrate_k_factors(chooser: &DestinationChooser<'_>, od: &OdMatrix) -> KFactorTable {
    let arena = chooser.arena();

    // Locations per zone: stage-1 candidates grouped by their zone stamp.
    let mut zone_locations: Vec<Vec<LocRef>> = vec![Vec::new(); od.zones.len()];
    for &r in chooser.stage1_candidates() {
        if let Some(z) = arena.od_zone(r) {
            zone_locations[z.index()].push(r);
        }
    }

    // ── Origin calibration (HOME) ─────────────────────────────────────────
    //
    // OD share: outgoing flow into focus-overlapping zones.
    // Model share: originless HOME weight mass per zone.
    let od_out: Vec<f64> = od
        .zones
        .iter()
        .map(|z| {
            z.flows
                .iter()
                .filter(|(dest, _)| od.zone(**dest).overlaps_focus)
                .map(|(_, flow)| *flow)
                .sum()
        })
        .collect();
    let od_total: f64 = od_out.iter().sum();

    let model_home: Vec<f64> = zone_locations
        .iter()
        .map(|locs| {
            chooser
                .weights(None, locs, ActivityType::Home)
                .iter()
                .sum()
        })
        .collect();
    let model_total: f64 = model_home.iter().sum();

    let mut table = KFactorTable::default();
    for zone in &od.zones {
        let i = zone.id.index();
        let od_share = share(od_out[i], od_total);
        let model_share = share(model_home[i], model_total);
        // 1/1 fallback: no information, no correction.
        let k = match (od_share, model_share) {
            (Some(o), Some(m)) => o / m,
            _ => 1.0,
        };
        table.home.insert(zone.id, k);
    }

    // ── Transition calibration (WORK) ─────────────────────────────────────
    //
    // Model transition weight for (o, d): Σ over origin locations s of
    // homeWeight(s) × Σ over destination locations of workWeight(s, ·),
    // normalized across destinations per origin zone.
    for origin_zone in &od.zones {
        if !origin_zone.overlaps_focus {
            continue;
        }
        let o = origin_zone.id;
        let origin_locs = &zone_locations[o.index()];

        // Model weight per destination zone.
        let mut model_trans: Vec<f64> = vec![0.0; od.zones.len()];
        for &s in origin_locs {
            let home_w: f64 = chooser
                .weights(None, &[s], ActivityType::Home)
                .iter()
                .sum();
            if home_w <= 0.0 {
                continue;
            }
            for dest_zone in &od.zones {
                if !dest_zone.overlaps_focus {
                    continue;
                }
                let work_w: f64 = chooser
                    .weights(Some(s), &zone_locations[dest_zone.id.index()], ActivityType::Work)
                    .iter()
                    .sum();
                model_trans[dest_zone.id.index()] += home_w * work_w;
            }
        }
        let model_row_total: f64 = model_trans.iter().sum();

        let od_row_total: f64 = origin_zone
            .flows
            .iter()
            .filter(|(dest, _)| od.zone(**dest).overlaps_focus)
            .map(|(_, flow)| *flow)
            .sum();

        for dest_zone in &od.zones {
            if !dest_zone.overlaps_focus {
                continue;
            }
            let d = dest_zone.id;
            let od_share = share(
                origin_zone.flows.get(&d).copied().unwrap_or(0.0),
                od_row_total,
            );
            let model_share = share(model_trans[d.index()], model_row_total);
            let k = match (od_share, model_share) {
                (Some(os), Some(ms)) => os / ms,
                _ => 1.0,
            };
            table.work.insert((o, d), k);
        }
    }

    log::info!(
        "OD calibration complete: {} origin factors, {} transition factors",
        table.home.len(),
        table.work.len()
    );
    table
}

/// `Some(value / total)` when both sides are positive.
#[inline]
fn share(value: f64, total: f64) -> Option<f64> {
    if value > 0.0 && total > 0.0 {
        Some(value / total)
    } else {
        None
    }
}
