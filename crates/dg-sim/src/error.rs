//! Simulation error type.
//!
//! Per-agent failures are not represented here: every modeled failure
//! inside one agent's simulation (routing, degenerate weights) resolves
//! inline via the documented fallbacks, and the residual class — panics
//! from corrupt inputs — is caught and counted by the runner.  These
//! variants are the run-level outcomes of that policy.

use thiserror::Error;

/// Errors produced by `dg-sim`.
#[derive(Debug, Error)]
pub enum SimError {
    /// More than the tolerated share of agents was discarded.
    #[error("{failed} of {total} agents failed to simulate (tolerance 1%)")]
    FailureRateExceeded { failed: usize, total: usize },

    /// The cooperative cancel flag was raised; the run is incomplete.
    #[error("simulation cancelled after {completed} agents")]
    Cancelled { completed: usize },
}

pub type SimResult<T> = Result<T, SimError>;
