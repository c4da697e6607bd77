//! Debug dumps for offline inspection of a finished layout.
//!
//! Four JSON files: the layout itself, the track occupancy snapshot, the
//! bridge corridor uses and the routing failures accumulated across retry
//! attempts.

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

use super::router::BridgeUse;
use super::tracks::TrackSystem;
use super::types::Layout;

pub const LAYOUT_DUMP: &str = "layout_dump.json";
pub const OCCUPANCY_DUMP: &str = "occupancy_dump.json";
pub const BRIDGE_DUMP: &str = "bridge_dump.json";
pub const ROUTING_FAILURES_DUMP: &str = "routing_failures.json";

/// One failed routing attempt, kept for the failure dump.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingFailure {
    pub edge_id: String,
    pub reason: String,
    pub attempt: u32,
}

/// Write all four dumps into `dir`, creating it if needed.
pub fn write_debug_dumps(
    dir: &Path,
    layout: &Layout,
    tracks: &TrackSystem,
    bridges: &[BridgeUse],
    failures: &[RoutingFailure],
) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    write_json(&dir.join(LAYOUT_DUMP), layout)?;
    write_json(&dir.join(OCCUPANCY_DUMP), &tracks.snapshot())?;
    write_json(&dir.join(BRIDGE_DUMP), &bridges)?;
    write_json(&dir.join(ROUTING_FAILURES_DUMP), &failures)?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let mut text = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    text.push('\n');
    fs::write(path, text)
}
