//! Inspect command implementation.

use super::{CommandResult, Format};
use serde::Serialize;
use shmkv_core::{SegmentFacility, SegmentStore};
use std::io::Write;

/// Segment inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Segment key as an integer.
    pub segment_id: u32,
    /// Segment key in hex.
    pub segment_hex: String,
    /// Number of stored variables.
    pub entries: u32,
    /// Bytes used by variables.
    pub used: usize,
    /// Bytes available for variables.
    pub capacity: usize,
    /// Bytes still free.
    pub free: usize,
}

/// Runs the inspect command.
pub fn run<F: SegmentFacility>(
    store: &SegmentStore<F>,
    format: Format,
    out: &mut impl Write,
) -> CommandResult {
    let key = store.segment_id().ok_or("store is not attached")?;
    let stats = store.stats()?;

    let result = InspectResult {
        segment_id: key.get(),
        segment_hex: key.to_string(),
        entries: stats.entries,
        used: stats.used,
        capacity: stats.capacity,
        free: stats.free(),
    };

    match format {
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?,
        Format::Text => {
            writeln!(out, "Segment:   {} ({})", result.segment_id, result.segment_hex)?;
            writeln!(out, "Variables: {}", result.entries)?;
            writeln!(out, "Used:      {} bytes", result.used)?;
            writeln!(out, "Capacity:  {} bytes", result.capacity)?;
            writeln!(out, "Free:      {} bytes", result.free)?;
        }
    }
    Ok(())
}
