//! Store used by dry runs
//!
//! Reports every row as written without touching a database.

use crate::adapters::database::traits::MetadataStore;
use crate::domain::{FileRow, RecordRow, StoreError};
use async_trait::async_trait;

/// Metadata store that only logs what it would write
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunStore;

impl DryRunStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetadataStore for DryRunStore {
    async fn test_connection(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn bulk_insert_files(&self, rows: &[FileRow]) -> Result<u64, StoreError> {
        tracing::info!(count = rows.len(), "DRY RUN: Would insert file rows");
        Ok(rows.len() as u64)
    }

    async fn upsert_user(&self, user_id: &str) -> Result<(), StoreError> {
        tracing::debug!(user_id, "DRY RUN: Would upsert user");
        Ok(())
    }

    async fn upsert_users(&self, user_ids: &[String]) -> Result<u64, StoreError> {
        tracing::info!(count = user_ids.len(), "DRY RUN: Would upsert users");
        Ok(user_ids.len() as u64)
    }

    async fn bulk_insert_records(&self, rows: &[RecordRow]) -> Result<u64, StoreError> {
        tracing::info!(count = rows.len(), "DRY RUN: Would insert record rows");
        Ok(rows.len() as u64)
    }
}
