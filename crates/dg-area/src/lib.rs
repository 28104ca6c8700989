//! `dg-area` — model-area construction from OpenStreetMap.
//!
//! Streams an OSM PBF extract, keeps every building, point of interest and
//! land-use area inside the buffered focus area, enriches buildings with
//! POI counts, land-use labels, census population, and focus-area
//! membership, and finally bundles them into a routing grid of cells.
//!
//! # Crate layout
//!
//! | Module     | Contents                                                   |
//! |------------|------------------------------------------------------------|
//! | [`osm`]    | PBF streaming, tag classification, geometry assembly      |
//! | [`cover`]  | `fast_covers` recursive tile test, membership stamping    |
//! | [`census`] | Census GeoJSON loading and population distribution        |
//! | [`build`]  | The `AreaBuilder` pipeline producing enriched buildings   |
//! | [`grid`]   | K-means grid clusterer producing aggregation cells        |
//! | [`index`]  | R-tree over building centroids for polygon queries        |
//! | [`cache`]  | `buildings.geojson` persistence                           |
//! | [`error`]  | `AreaError`, `AreaResult`                                 |

pub mod build;
pub mod cache;
pub mod census;
pub mod cover;
pub mod error;
pub mod grid;
pub mod index;
pub mod osm;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use build::{AreaBuilder, ModelArea};
pub use cache::{load_buildings_geojson, save_buildings_geojson};
pub use census::CensusEntry;
pub use cover::{fast_covers, stamp_membership, CoverEvent};
pub use error::{AreaError, AreaResult};
pub use grid::{cluster_grid, GridConfig};
pub use index::BuildingIndex;
pub use osm::{extract_roads, GeoBounds, OsmExtract, PoiKind, RawBuilding, RawLanduse, RawPoi};
