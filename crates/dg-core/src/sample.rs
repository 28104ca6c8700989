//! Stochastic kernel: cumulative-distribution sampling and N-D Gaussian
//! mixture sampling via Cholesky decomposition.
//!
//! The kernel is stateless; all randomness comes in through the caller's
//! RNG (a `u01` draw for discrete sampling, a `SmallRng` for mixtures), so
//! per-agent determinism is preserved no matter where sampling happens.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand::rngs::SmallRng;
use rand_distr::StandardNormal;

use crate::{CoreError, CoreResult};

// ── CumulativeDist ────────────────────────────────────────────────────────────

/// A normalized cumulative distribution over `n` discrete outcomes.
///
/// Construction fails with [`CoreError::DegenerateWeights`] when every
/// weight is zero; callers substitute a uniform distribution over the same
/// candidate set and log the event (the all-zero case is always a modeling
/// fallback, never silently absorbed).
#[derive(Clone, Debug)]
pub struct CumulativeDist {
    cum: Vec<f64>,
}

impl CumulativeDist {
    /// Prefix-sum `weights` and divide by the total.
    ///
    /// Negative weights are a caller bug and panic in debug builds.
    pub fn new(weights: &[f64]) -> CoreResult<Self> {
        debug_assert!(weights.iter().all(|w| *w >= 0.0), "negative weight");

        let total: f64 = weights.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return Err(CoreError::DegenerateWeights);
        }

        let mut cum = Vec::with_capacity(weights.len());
        let mut running = 0.0;
        for w in weights {
            running += w;
            cum.push(running / total);
        }
        // Guard against float drift so sampling u=1.0-eps never falls off.
        if let Some(last) = cum.last_mut() {
            *last = 1.0;
        }
        Ok(Self { cum })
    }

    /// Uniform distribution over `n` outcomes.
    pub fn uniform(n: usize) -> Self {
        let cum = (1..=n).map(|i| i as f64 / n as f64).collect();
        Self { cum }
    }

    pub fn len(&self) -> usize {
        self.cum.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cum.is_empty()
    }

    /// The smallest index `i` with `cum[i] >= u`.
    ///
    /// Linear threshold scan: candidate sets are small (cells in a zone,
    /// chains in a bucket), so the scan beats binary search in practice.
    pub fn sample(&self, u01: f64) -> usize {
        for (i, c) in self.cum.iter().enumerate() {
            if *c >= u01 {
                return i;
            }
        }
        self.cum.len() - 1
    }
}

// ── Gaussian mixture ──────────────────────────────────────────────────────────

/// One mixture component with its covariance pre-factored at load time, so
/// the per-sample cost in the hot loop is a triangular multiply.
#[derive(Clone, Debug)]
pub struct MixtureComponent {
    pub mean: DVector<f64>,
    /// Lower-triangular Cholesky factor of the (possibly regularized)
    /// covariance.
    pub chol_l: DMatrix<f64>,
}

/// An N-dimensional Gaussian mixture used for dwell-time sampling.
///
/// Negative samples are *not* clipped here — dwell-time callers clip to
/// zero, other callers may want the raw value.
#[derive(Clone, Debug)]
pub struct GaussianMixture {
    components: Vec<MixtureComponent>,
    weights: CumulativeDist,
    dim: usize,
}

/// Relative symmetry tolerance accepted before a covariance is rejected.
/// Upstream matrices come from survey estimation pipelines and are only
/// symmetric to a few significant digits.
const SYM_REL_TOL: f64 = 0.1;
const SYM_ABS_TOL: f64 = 1e-10;

impl GaussianMixture {
    /// Build a mixture from per-component weights, means, and covariance
    /// matrices (row-major `dim × dim`).
    ///
    /// Covariances are symmetrized and factored once; see
    /// [`factor_covariance`] for the fallback ladder.
    pub fn new(
        weights: &[f64],
        means: Vec<Vec<f64>>,
        covariances: Vec<Vec<f64>>,
    ) -> CoreResult<Self> {
        if weights.len() != means.len() || weights.len() != covariances.len() {
            return Err(CoreError::DimensionMismatch {
                expected: weights.len(),
                got: means.len().max(covariances.len()),
            });
        }
        let dim = means.first().map_or(0, |m| m.len());

        let mut components = Vec::with_capacity(weights.len());
        for (mean, cov) in means.into_iter().zip(covariances) {
            if mean.len() != dim || cov.len() != dim * dim {
                return Err(CoreError::DimensionMismatch {
                    expected: dim,
                    got: mean.len(),
                });
            }
            let cov = DMatrix::from_row_slice(dim, dim, &cov);
            let chol_l = factor_covariance(cov)?;
            components.push(MixtureComponent {
                mean: DVector::from_vec(mean),
                chol_l,
            });
        }

        Ok(Self {
            components,
            weights: CumulativeDist::new(weights)?,
            dim,
        })
    }

    /// Dimensionality of each sample.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Draw one sample: pick a component, then `mean + L·z` with iid
    /// standard-normal `z`.
    pub fn sample(&self, rng: &mut SmallRng) -> Vec<f64> {
        let idx = self.weights.sample(rng.r#gen::<f64>());
        let comp = &self.components[idx];

        let z = DVector::from_fn(self.dim, |_, _| rng.sample::<f64, _>(StandardNormal));
        let x = &comp.mean + &comp.chol_l * z;
        x.as_slice().to_vec()
    }
}

/// Factor a covariance matrix into its lower Cholesky triangle.
///
/// Ladder:
/// 1. Check symmetry within tolerance, then symmetrize `(A + Aᵀ)/2`.
/// 2. Plain Cholesky.
/// 3. Retry with a slightly regularized diagonal (ridge proportional to the
///    mean diagonal entry).
/// 4. Fall back to independent per-dimension Gaussians: a diagonal factor
///    from the (clamped) diagonal variances.
fn factor_covariance(cov: DMatrix<f64>) -> CoreResult<DMatrix<f64>> {
    let n = cov.nrows();

    for i in 0..n {
        for j in (i + 1)..n {
            let a = cov[(i, j)];
            let b = cov[(j, i)];
            let scale = a.abs().max(b.abs());
            if (a - b).abs() > SYM_ABS_TOL + SYM_REL_TOL * scale {
                return Err(CoreError::Covariance(format!(
                    "covariance not symmetric at ({i},{j}): {a} vs {b}"
                )));
            }
        }
    }
    let sym = (&cov + cov.transpose()) * 0.5;

    if let Some(chol) = nalgebra::Cholesky::new(sym.clone()) {
        return Ok(chol.l());
    }

    // Regularized retry.
    let mean_diag = sym.diagonal().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
    let ridge = (mean_diag * 1e-8).max(1e-12);
    let mut reg = sym.clone();
    for i in 0..n {
        reg[(i, i)] += ridge;
    }
    if let Some(chol) = nalgebra::Cholesky::new(reg) {
        return Ok(chol.l());
    }

    // Diagonal fallback.
    let mut diag = DMatrix::zeros(n, n);
    for i in 0..n {
        diag[(i, i)] = sym[(i, i)].max(0.0).sqrt();
    }
    Ok(diag)
}
