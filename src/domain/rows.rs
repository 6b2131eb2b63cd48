//! Insertable row descriptors
//!
//! These are the shapes handed to the relational store. A file row comes
//! either from a manifest (manifest hash) or from a downloaded track file
//! (track hash); a record row always points at a track file row from the same
//! persistence batch.

use super::ids::RowId;
use super::manifest::{Manifest, Record};
use serde::Serialize;

/// Row for the `files` table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRow {
    pub id: RowId,
    pub filename: String,
    pub content_hash: String,
}

impl FileRow {
    /// Creates a file row
    pub fn new(id: RowId, filename: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            id,
            filename: filename.into(),
            content_hash: content_hash.into(),
        }
    }

    /// File row describing a parsed manifest
    pub fn from_manifest(id: RowId, manifest: &Manifest) -> Self {
        Self::new(id, manifest.file_name.clone(), manifest.content_hash.clone())
    }
}

/// Row for the `records` table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordRow {
    pub id: RowId,
    pub user_id: String,
    pub file_id: RowId,
    pub distance: f32,
    pub duration: f32,
    pub ascent: f32,
    pub descent: f32,
    pub elevation_diff: f32,
    pub trails: String,
    /// Full text of the track file
    pub raw_data: String,
}

impl RecordRow {
    /// Builds a record row from a manifest record and the stored track file
    pub fn from_record(id: RowId, file_id: RowId, record: &Record, raw_data: String) -> Self {
        Self {
            id,
            user_id: record.user_id.clone(),
            file_id,
            distance: record.distance,
            duration: record.duration,
            ascent: record.ascent,
            descent: record.descent,
            elevation_diff: record.elevation_diff,
            trails: record.trails.clone(),
            raw_data,
        }
    }
}
