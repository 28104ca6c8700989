//! `dg-choice` — the destination-choice engine.
//!
//! Implements the gravity model: for activity `t` the weight of destination
//! `d` seen from origin `o` is
//!
//! ```text
//! w(d) = k(t, zone(o), zone(d)) × A_t(d) × f_t(dist(o, d), region(o))
//! ```
//!
//! with per-activity attraction `A_t`, a calibrated log-normal distance
//! deterrence `f_t` per region type, and optional OD-derived k-factors.
//!
//! # Crate layout
//!
//! | Module         | Contents                                              |
//! |----------------|-------------------------------------------------------|
//! | [`deterrence`] | `DistanceDistributions` (embedded log-normal table)   |
//! | [`attraction`] | Per-building attraction computation                   |
//! | [`engine`]     | `DestinationChooser`: weights + two-stage sampling    |
//! | [`od`]         | OD GeoJSON parsing, zone stamping, dummy creation     |
//! | [`kfactor`]    | `KFactorTable` calibration                            |
//! | [`error`]      | `ChoiceError`, `ChoiceResult<T>`                      |

pub mod attraction;
pub mod deterrence;
pub mod engine;
pub mod error;
pub mod kfactor;
pub mod od;

#[cfg(test)]
mod tests;

pub use attraction::compute_attractions;
pub use deterrence::DistanceDistributions;
pub use engine::DestinationChooser;
pub use error::{ChoiceError, ChoiceResult};
pub use kfactor::{calibrate_k_factors, KFactorTable};
pub use od::{stamp_zones, OdMatrix, OdZone};
