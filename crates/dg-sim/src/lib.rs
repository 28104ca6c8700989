//! `dg-sim` — the agent simulation loop.
//!
//! For each agent and each day: sample an activity chain and dwell times
//! from the activity data store (conditional on weekday, demographic
//! features and the carried-over last activity), resolve flexible
//! locations through the destination-choice engine, then assign modes and
//! fill trip distance/time from the router.
//!
//! # Crate layout
//!
//! | Module     | Contents                                                 |
//! |------------|----------------------------------------------------------|
//! | [`runner`] | `Simulator`: parallel per-agent loop, error policy       |
//! | [`day`]    | Single-day chain/dwell/location resolution               |
//! | [`modes`]  | Mode choice (none / car-only / logit), trip filling      |
//! | [`clock`]  | Wall-clock reconstruction for leg start times            |
//! | [`error`]  | `SimError`, `SimResult<T>`                               |

pub mod clock;
pub mod day;
pub mod error;
pub mod modes;
pub mod runner;

#[cfg(test)]
mod tests;

pub use clock::leg_start_minutes;
pub use error::{SimError, SimResult};
pub use modes::{LogitParams, ModeChoice};
pub use runner::{RunStats, SimConfig, Simulator};
