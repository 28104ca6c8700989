//! The `DiaryWriter` trait and extension-based dispatch.

use std::path::Path;

use dg_core::{Agent, LocationArena};

use crate::{CsvWriter, JsonWriter, MatsimWriter, OutputError, OutputResult, SqliteWriter};

/// Everything a backend needs besides the agents themselves.
pub struct OutputContext<'a> {
    pub arena: &'a LocationArena,
    /// The run configuration, serialized for the output header.
    pub run_parameters: serde_json::Value,
    /// CRS label for MATSim coordinates (`EPSG:4326` or the model CRS).
    pub matsim_crs: String,
}

/// A diary serialization backend.
pub trait DiaryWriter {
    fn write(&mut self, agents: &[Agent], ctx: &OutputContext<'_>) -> OutputResult<()>;
}

/// Write `agents` to `path`, picking the backend from the extension.
pub fn write_output(
    path: &Path,
    agents: &[Agent],
    ctx: &OutputContext<'_>,
) -> OutputResult<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match ext.as_str() {
        "json" => JsonWriter::new(path).write(agents, ctx),
        "csv"  => CsvWriter::new(path)?.write(agents, ctx),
        "db"   => SqliteWriter::new(path)?.write(agents, ctx),
        "xml"  => MatsimWriter::new(path).write(agents, ctx),
        other  => Err(OutputError::UnsupportedFormat(other.to_string())),
    }
}
