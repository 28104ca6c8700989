//! `dg-popsyn` — population synthesis.
//!
//! Samples sociodemographic features from configured strata, resolves each
//! agent's anchor locations (home, work, school) through the
//! destination-choice engine, and owns the survey-derived activity-chain
//! data store consumed by the simulation loop.
//!
//! # Crate layout
//!
//! | Module            | Contents                                           |
//! |-------------------|----------------------------------------------------|
//! | [`strata`]        | `PopulationStrata` loading and validation          |
//! | [`features`]      | Joint feature tuples, deterministic/random sampling|
//! | [`activity_store`]| `(weekday × group)`-keyed chain & dwell data       |
//! | [`factory`]       | `AgentFactory` producing anchored agents           |
//! | [`error`]         | `PopError`, `PopResult<T>`                         |

pub mod activity_store;
pub mod error;
pub mod factory;
pub mod features;
pub mod strata;

#[cfg(test)]
mod tests;

pub use activity_store::{ActivityDataStore, BucketKey, ChainOption, FromActivity};
pub use error::{PopError, PopResult};
pub use factory::{AgentFactory, AgentFactoryConfig};
pub use features::{enumerate_tuples, assign_deterministic, assign_random, FeatureTuple};
pub use strata::{PopulationStrata, Stratum};
