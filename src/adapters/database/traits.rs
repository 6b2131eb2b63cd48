//! Metadata store abstraction
//!
//! The persister talks to the relational store only through
//! [`MetadataStore`]. Errors are [`StoreError`] rather than the crate-wide
//! error so callers can match on [`StoreError::IdCollision`] and retry.

use crate::domain::{FileRow, RecordRow, StoreError};
use async_trait::async_trait;

/// Bulk write interface for file, user and record rows
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Test the store connection
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionFailed`] if the store is unreachable.
    async fn test_connection(&self) -> Result<(), StoreError>;

    /// Insert all file rows in one statement
    ///
    /// Returns the number of rows written. A primary-key clash on `id` must
    /// surface as [`StoreError::IdCollision`] and leave no row of the call
    /// behind.
    async fn bulk_insert_files(&self, rows: &[FileRow]) -> Result<u64, StoreError>;

    /// Create the user if it does not exist yet
    async fn upsert_user(&self, user_id: &str) -> Result<(), StoreError>;

    /// Create every listed user that does not exist yet
    ///
    /// The default implementation calls [`MetadataStore::upsert_user`] once
    /// per id.
    async fn upsert_users(&self, user_ids: &[String]) -> Result<u64, StoreError> {
        for user_id in user_ids {
            self.upsert_user(user_id).await?;
        }
        Ok(user_ids.len() as u64)
    }

    /// Insert all record rows in one statement
    ///
    /// Every `file_id` must reference a file row that is already stored.
    async fn bulk_insert_records(&self, rows: &[RecordRow]) -> Result<u64, StoreError>;
}
