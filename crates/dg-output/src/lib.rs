//! `dg-output` — diary serialization.
//!
//! Four backends, selected by the output file's extension:
//!
//! | Extension | Backend | Shape                                           |
//! |-----------|---------|--------------------------------------------------|
//! | `.json`   | JSON    | `{"runParameters": …, "agents": […]}`           |
//! | `.csv`    | CSV     | One flat row per leg                            |
//! | `.db`     | SQLite  | `agents`, `activities`, `trips` tables          |
//! | `.xml`    | MATSim  | population file with `<act>`/`<leg>` plans      |
//!
//! All backends implement [`DiaryWriter`] and receive the full agent list
//! after simulation, ordered by agent ID.

pub mod csv_writer;
pub mod error;
pub mod json;
pub mod matsim;
pub mod sqlite;
pub mod writer;

#[cfg(test)]
mod tests;

pub use csv_writer::CsvWriter;
pub use error::{OutputError, OutputResult};
pub use json::JsonWriter;
pub use matsim::MatsimWriter;
pub use sqlite::SqliteWriter;
pub use writer::{write_output, DiaryWriter, OutputContext};
