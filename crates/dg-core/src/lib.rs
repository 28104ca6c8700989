//! `dg-core` — foundational types for the `demandgen` mobility-demand
//! synthesizer.
//!
//! This crate is a dependency of every other `dg-*` crate.  It intentionally
//! has no `dg-*` dependencies and a small external surface (`rand`,
//! `nalgebra`, `thiserror`, `serde`).
//!
//! # What lives here
//!
//! | Module       | Contents                                                 |
//! |--------------|----------------------------------------------------------|
//! | [`ids`]      | `BuildingId`, `CellId`, `DummyId`, `ZoneId`, `AgentId`   |
//! | [`activity`] | `ActivityType`                                           |
//! | [`weekday`]  | `Weekday` and its succession rule                        |
//! | [`mode`]     | `Mode` (travel modes)                                    |
//! | [`geo`]      | `LatLon`, `ProjPoint`, projection, `RoadSegment`         |
//! | [`rng`]      | `RunSeed`, `SeedDomain`, `DemandRng` streams             |
//! | [`sample`]   | Cumulative sampler, Gaussian-mixture sampler (Cholesky)  |
//! | [`location`] | `Building`/`Cell`/`DummyZone` arena and `LocRef`         |
//! | [`agent`]    | Sociodemographic features, `Agent`, diaries and trips    |
//! | [`error`]    | `CoreError`, `CoreResult`                                |

pub mod activity;
pub mod agent;
pub mod error;
pub mod geo;
pub mod ids;
pub mod location;
pub mod mode;
pub mod rng;
pub mod sample;
pub mod weekday;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use activity::ActivityType;
pub use agent::{Activity, Agent, Diary, SocioDemFeatures, Trip};
pub use agent::{AgeGroup, HomogeneousGroup, MobilityGroup, Sex};
pub use error::{CoreError, CoreResult};
pub use geo::{LatLon, ProjPoint, RoadSegment, RoadVertex, TransverseMercator};
pub use ids::{AgentId, BuildingId, CellId, DummyId, ZoneId};
pub use location::{Building, Cell, DummyZone, Landuse, LocRef, LocationArena, PoiCounts};
pub use mode::Mode;
pub use rng::{DemandRng, RunSeed, SeedDomain};
pub use sample::{CumulativeDist, GaussianMixture, MixtureComponent};
pub use weekday::Weekday;
