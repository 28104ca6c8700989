//! `dg-routing` — pairwise distances for destination choice and trips.
//!
//! Road geometry arrives as [`dg_core::RoadSegment`] polylines from the
//! area extractor; this crate owns everything from graph construction
//! onward.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                  |
//! |-------------|-----------------------------------------------------------|
//! | [`network`] | `RoadNetwork::from_segments` (CSR + snap R-tree)          |
//! | [`router`]  | `Router` trait, `BeelineRouter`, `NetworkRouter`          |
//! | [`cache`]   | Two-tier bounded LRU distance cache + hot submatrix       |
//! | [`matrix`]  | Persisted binary distance matrix                          |
//! | [`error`]   | `RoutingError`, `RoutingResult<T>`                        |

pub mod cache;
pub mod error;
pub mod matrix;
pub mod network;
pub mod router;


pub use cache::{CacheEndpoint, DistanceCache, DistanceCacheConfig};
pub use error::{RoutingError, RoutingResult};
pub use matrix::DistanceMatrix;
pub use network::{NodeIdx, RoadNetwork};
pub use router::{BeelineRouter, NetworkRouter, RouteLeg, RoutePoint, Router};
