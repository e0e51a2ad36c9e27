//! Remove command implementation.

use super::CommandResult;
use shmkv_core::{SegmentFacility, SegmentStore};
use std::io::Write;
use tracing::info;

/// Marks the segment for destruction and detaches.
pub fn run<F: SegmentFacility>(store: &mut SegmentStore<F>, out: &mut impl Write) -> CommandResult {
    let key = store.segment_id().ok_or("store is not attached")?;
    info!(segment = %key, "removing segment");
    store.remove()?;
    writeln!(out, "removed segment {key}")?;
    Ok(())
}
