//! Ingest summary and reporting
//!
//! This module defines the structure that tracks the outcome of one run
//! across all pipeline stages.

use crate::core::download::DownloadSummary;
use crate::core::persist::PersistSummary;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Summary of one ingest run
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// Manifest files discovered
    pub manifests_found: usize,

    /// Manifest files that parsed and hashed cleanly
    pub manifests_parsed: usize,

    /// Manifest files that failed
    pub manifests_failed: usize,

    /// Records queued for download and persistence
    pub work_items: usize,

    /// Download stage totals, when the stage ran
    pub download: Option<DownloadSummary>,

    /// Persistence stage totals, when the stage ran
    pub persist: Option<PersistSummary>,

    /// Rows were reported but not written
    pub dry_run: bool,

    /// A shutdown request stopped the run early
    pub interrupted: bool,

    /// Duration of the run
    pub duration: Duration,

    /// Manifest failures, one message per file
    pub errors: Vec<String>,
}

impl IngestSummary {
    /// Create a new empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Number of advisory failures across every stage
    pub fn failure_count(&self) -> usize {
        let download = self.download.as_ref().map_or(0, |d| d.failed);
        let persist = self
            .persist
            .as_ref()
            .map_or(0, |p| p.skipped + p.failed_batches);
        self.manifests_failed + download + persist
    }

    /// Every advisory error message, stage by stage
    pub fn all_errors(&self) -> impl Iterator<Item = &String> {
        let download = self.download.iter().flat_map(|d| d.errors.iter());
        let persist = self.persist.iter().flat_map(|p| p.errors.iter());
        self.errors.iter().chain(download).chain(persist)
    }

    /// Check if the run completed without any failure
    pub fn is_successful(&self) -> bool {
        !self.interrupted && self.all_errors().next().is_none()
    }

    /// Process exit code for this outcome
    ///
    /// 130 when interrupted, 1 when advisory errors occurred, 0 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            130
        } else if self.is_successful() {
            0
        } else {
            1
        }
    }

    /// Format the summary as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            manifests_found = self.manifests_found,
            manifests_parsed = self.manifests_parsed,
            manifests_failed = self.manifests_failed,
            work_items = self.work_items,
            dry_run = self.dry_run,
            interrupted = self.interrupted,
            duration_secs = self.duration.as_secs(),
            "Ingest completed"
        );

        if let Some(download) = &self.download {
            tracing::info!(
                succeeded = download.succeeded,
                failed = download.failed,
                rate_limited = download.rate_limited,
                bytes_written = download.bytes_written,
                "Download totals"
            );
        }

        if let Some(persist) = &self.persist {
            tracing::info!(
                prepared = persist.prepared,
                skipped = persist.skipped,
                files_inserted = persist.files_inserted,
                users_upserted = persist.users_upserted,
                records_inserted = persist.records_inserted,
                id_retries = persist.id_retries,
                failed_batches = persist.failed_batches,
                "Persistence totals"
            );
        }

        let errors: Vec<&String> = self.all_errors().collect();
        if !errors.is_empty() {
            tracing::warn!(error_count = errors.len(), "Ingest completed with errors");
            for error in errors {
                tracing::warn!(message = %error, "Ingest error");
            }
        }
    }
}
