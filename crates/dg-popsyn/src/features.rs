//! Joint feature tuples and the two assignment strategies.
//!
//! The product of every stratum's internal categorical distributions forms
//! a finite tuple space with known joint probabilities.  Agents draw from
//! it either randomly (with replacement) or **deterministically**: the
//! deterministic sampler repeatedly assigns the tuple with the greatest
//! remaining expected count, which pins every marginal count to
//! `round(N × p)` within ±1.

use dg_core::{CumulativeDist, DemandRng, HomogeneousGroup, MobilityGroup, Sex};

use crate::strata::PopulationStrata;
use crate::{PopError, PopResult};

/// One cell of the joint feature space.
///
/// `age_bin` indexes the stratum's age bins; the exact age is drawn per
/// agent inside the bin.  `None` is the undefined-age bin.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureTuple {
    pub stratum: usize,
    pub hom_group: HomogeneousGroup,
    pub mob_group: MobilityGroup,
    pub age_bin: Option<usize>,
    pub sex: Sex,
    pub probability: f64,
}

/// Enumerate every tuple with positive joint probability.
pub fn enumerate_tuples(strata: &PopulationStrata) -> Vec<FeatureTuple> {
    let mut tuples = Vec::new();
    for (si, s) in strata.strata.iter().enumerate() {
        // Age bins plus the undefined bin.
        let mut age_options: Vec<(Option<usize>, f64)> = s
            .age
            .shares
            .iter()
            .enumerate()
            .map(|(i, &p)| (Some(i), p))
            .collect();
        age_options.push((None, s.age.undefined_share));

        for (hom, p_hom) in s.hom_shares() {
            for (mob, p_mob) in s.mob_shares() {
                for &(age_bin, p_age) in &age_options {
                    for (sex, p_sex) in s.sex_shares() {
                        let p = s.share * p_hom * p_mob * p_age * p_sex;
                        if p > 0.0 {
                            tuples.push(FeatureTuple {
                                stratum: si,
                                hom_group: hom,
                                mob_group: mob,
                                age_bin,
                                sex,
                                probability: p,
                            });
                        }
                    }
                }
            }
        }
    }
    tuples
}

/// Deterministic assignment: `n` tuple indices such that every tuple is
/// used `round(n × p)` times within ±1.
///
/// Each step picks the tuple with the greatest remaining expected count
/// (`n × p − assigned`), ties broken by index for reproducibility.
pub fn assign_deterministic(tuples: &[FeatureTuple], n: usize) -> PopResult<Vec<usize>> {
    if tuples.is_empty() {
        return Err(PopError::Config("no feature tuples to assign".into()));
    }
    let expected: Vec<f64> = tuples.iter().map(|t| t.probability * n as f64).collect();
    let mut assigned = vec![0.0f64; tuples.len()];
    let mut out = Vec::with_capacity(n);

    for _ in 0..n {
        let mut best = 0;
        let mut best_remaining = f64::NEG_INFINITY;
        for (i, (&e, &a)) in expected.iter().zip(assigned.iter()).enumerate() {
            let remaining = e - a;
            if remaining > best_remaining {
                best_remaining = remaining;
                best = i;
            }
        }
        assigned[best] += 1.0;
        out.push(best);
    }
    Ok(out)
}

/// Random with-replacement assignment over the joint distribution.
pub fn assign_random(
    tuples: &[FeatureTuple],
    n: usize,
    rng: &mut DemandRng,
) -> PopResult<Vec<usize>> {
    let probs: Vec<f64> = tuples.iter().map(|t| t.probability).collect();
    let cum = CumulativeDist::new(&probs)
        .map_err(|_| PopError::Config("all feature-tuple probabilities are zero".into()))?;
    Ok((0..n).map(|_| cum.sample(rng.u01())).collect())
}
