//! Record aggregation
//!
//! Flattens parsed manifests into the single work sequence shared by the
//! downloader and the persister.

use crate::domain::{IngestError, Manifest, Result, WorkItem};
use std::sync::Arc;

/// Concatenates the records of `manifests` in manifest order
///
/// Manifests without records are skipped. Records referencing the same track
/// file are kept as separate work items.
///
/// # Errors
///
/// Returns [`IngestError::Fatal`] when no records remain, since there is
/// nothing for the later stages to do.
pub fn aggregate<'a>(manifests: impl IntoIterator<Item = &'a Manifest>) -> Result<Vec<WorkItem>> {
    let work: Vec<WorkItem> = manifests
        .into_iter()
        .filter(|manifest| !manifest.is_empty())
        .flat_map(|manifest| manifest.records.iter().cloned().map(Arc::new))
        .collect();

    if work.is_empty() {
        return Err(IngestError::Fatal(
            "parsed manifests contain no records".to_string(),
        ));
    }

    Ok(work)
}
