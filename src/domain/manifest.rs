//! Manifest and track record models
//!
//! A manifest is a CSV file with one row per recorded track. Each row names
//! the GPX file holding the track and carries the trip metrics.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// One manifest row
///
/// Column names follow the manifest header line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Owner of the track
    #[serde(rename = "user_id")]
    pub user_id: String,

    /// Display name of the track
    #[serde(rename = "name")]
    pub display_name: String,

    /// Track file referenced by this row
    #[serde(rename = "gpx_file")]
    pub track_file_name: String,

    pub distance: f32,
    pub duration: f32,
    pub ascent: f32,
    pub descent: f32,
    pub elevation_diff: f32,
    pub trails: String,
    pub recorded_at: String,
}

/// A record queued for download and persistence
///
/// Records are shared between the downloader and persister tasks without
/// copying the row.
pub type WorkItem = Arc<Record>;

/// A parsed manifest
///
/// Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// Bare file name of the manifest
    pub file_name: String,

    /// Absolute path the manifest was read from
    pub path: PathBuf,

    /// Hex-encoded SHA-512 of the manifest bytes
    pub content_hash: String,

    /// Rows in file order
    pub records: Vec<Record>,
}

impl Manifest {
    /// Number of rows in the manifest
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the manifest has no rows
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_deserializes_from_manifest_header() {
        let data = "user_id,name,gpx_file,distance,duration,ascent,descent,elevation_diff,trails,recorded_at\n\
                    u1,Morning loop,a.gpx,12.5,3600,120,118,2,ridge,2024-05-01T07:00:00Z\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let records: Vec<Record> = reader.deserialize().collect::<Result<_, _>>().unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, "u1");
        assert_eq!(records[0].display_name, "Morning loop");
        assert_eq!(records[0].track_file_name, "a.gpx");
        assert_eq!(records[0].distance, 12.5);
        assert_eq!(records[0].trails, "ridge");
    }

    #[test]
    fn test_manifest_len() {
        let manifest = Manifest {
            file_name: "empty.csv".to_string(),
            path: PathBuf::from("/tmp/empty.csv"),
            content_hash: String::new(),
            records: Vec::new(),
        };
        assert!(manifest.is_empty());
        assert_eq!(manifest.len(), 0);
    }
}
