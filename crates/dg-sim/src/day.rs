//! Single-day diary construction: chain sampling, dwell times, and
//! flexible-location resolution.

use dg_choice::DestinationChooser;
use dg_core::{
    Activity, ActivityType, Agent, CumulativeDist, DemandRng, Diary, LocRef, Weekday,
};
use dg_popsyn::{ActivityDataStore, BucketKey, FromActivity};

/// Build one day's activities for `agent`.
///
/// `carry` is the final activity of the previous day (`None` on day 0,
/// which starts at home).  The first activity of the produced diary
/// repeats the carried type and location, so diaries are continuous
/// across midnight.
pub fn simulate_day(
    agent: &Agent,
    day: u32,
    day_type: Weekday,
    carry: Option<&Activity>,
    store: &ActivityDataStore,
    chooser: &DestinationChooser<'_>,
    rng: &mut DemandRng,
) -> Diary {
    let (from_type, from_loc) = match carry {
        None => (ActivityType::Home, agent.home),
        Some(last) => (last.kind, last.location),
    };

    // ── Chain sampling ────────────────────────────────────────────────────
    let key = BucketKey {
        weekday: day_type,
        hom_group: agent.features.hom_group,
        mob_group: agent.features.mob_group,
        age_group: agent.features.age_group(),
    };
    let chains = store.chains(key, FromActivity::classify(from_type));

    let weights: Vec<f64> = chains.iter().map(|c| c.weight).collect();
    let idx = match CumulativeDist::new(&weights) {
        Ok(cum) => cum.sample(rng.u01()),
        Err(_) => {
            log::warn!("all chain weights zero for {key:?}; sampling uniformly");
            CumulativeDist::uniform(chains.len()).sample(rng.u01())
        }
    };
    let option = &chains[idx];

    // ── Dwell times ───────────────────────────────────────────────────────
    //
    // One value per activity except the open-ended last one.  Negative
    // mixture samples clip to zero here, not in the kernel.
    let stays: Vec<f64> = match &option.dwell {
        Some(gmm) => gmm.sample(rng.inner()).into_iter().map(|v| v.max(0.0)).collect(),
        None => Vec::new(),
    };

    // ── Location resolution ───────────────────────────────────────────────
    let mut diary = Diary::new(day, day_type);
    let mut prev_loc = from_loc;
    let n = option.chain.len();

    for (i, &chain_kind) in option.chain.iter().enumerate() {
        // The first entry carries over the actual previous activity: a day
        // that ended at WORK resumes at WORK even though the bucket chain
        // is keyed generically.
        let kind = if i == 0 { from_type } else { chain_kind };

        let location = if i == 0 {
            from_loc
        } else {
            resolve_location(agent, kind, prev_loc, chooser, rng)
        };

        let stay_minutes = if i + 1 == n {
            None
        } else {
            Some(stays.get(i).copied().unwrap_or(0.0))
        };

        diary.activities.push(Activity { kind, stay_minutes, location });
        prev_loc = location;
    }

    diary
}

/// Anchors resolve to the agent's fixed locations; everything else goes
/// through two-stage destination choice from the previous location.
fn resolve_location(
    agent: &Agent,
    kind: ActivityType,
    prev: LocRef,
    chooser: &DestinationChooser<'_>,
    rng: &mut DemandRng,
) -> LocRef {
    match kind {
        ActivityType::Home => agent.home,
        ActivityType::Work => agent.work,
        ActivityType::School => agent.school,
        _ => chooser.select(prev, kind, rng),
    }
}
