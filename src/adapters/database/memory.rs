//! In-memory metadata store
//!
//! Enforces the same constraints as the relational schema: unique file and
//! record ids, and records that reference stored files and users. Collisions
//! and insert failures can be injected to exercise the persister's retry and
//! isolation paths.

use crate::adapters::database::traits::MetadataStore;
use crate::domain::{FileRow, RecordRow, RowId, StoreError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    files: Vec<FileRow>,
    file_ids: HashSet<RowId>,
    users: Vec<String>,
    records: Vec<RecordRow>,
    record_ids: HashSet<RowId>,
}

/// Metadata store backed by vectors
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    file_collisions: AtomicUsize,
    record_collisions: AtomicUsize,
    record_failures: AtomicUsize,
    file_insert_calls: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` file inserts fail with an identifier collision
    pub fn with_file_collisions(self, count: usize) -> Self {
        self.file_collisions.store(count, Ordering::SeqCst);
        self
    }

    /// Makes the next `count` record inserts fail with an identifier collision
    pub fn with_record_collisions(self, count: usize) -> Self {
        self.record_collisions.store(count, Ordering::SeqCst);
        self
    }

    /// Makes the next `count` record inserts fail with a non-collision error
    pub fn with_record_failures(self, count: usize) -> Self {
        self.record_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Stored file rows in insertion order
    pub fn files(&self) -> Vec<FileRow> {
        self.lock().files.clone()
    }

    /// Stored user ids in insertion order
    pub fn users(&self) -> Vec<String> {
        self.lock().users.clone()
    }

    /// Stored record rows in insertion order
    pub fn records(&self) -> Vec<RecordRow> {
        self.lock().records.clone()
    }

    /// Number of `bulk_insert_files` calls, including failed ones
    pub fn file_insert_calls(&self) -> usize {
        self.file_insert_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Decrements `counter` if it is positive; true when a fault should fire
fn take_fault(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn test_connection(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn bulk_insert_files(&self, rows: &[FileRow]) -> Result<u64, StoreError> {
        self.file_insert_calls.fetch_add(1, Ordering::SeqCst);

        if take_fault(&self.file_collisions) {
            return Err(StoreError::IdCollision {
                table: "files".to_string(),
                message: "injected duplicate key".to_string(),
            });
        }

        let mut tables = self.lock();
        let mut seen = HashSet::new();
        for row in rows {
            if tables.file_ids.contains(&row.id) || !seen.insert(row.id) {
                return Err(StoreError::IdCollision {
                    table: "files".to_string(),
                    message: format!("duplicate key {}", row.id),
                });
            }
        }

        for row in rows {
            tables.file_ids.insert(row.id);
            tables.files.push(row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn upsert_user(&self, user_id: &str) -> Result<(), StoreError> {
        let mut tables = self.lock();
        if !tables.users.iter().any(|u| u == user_id) {
            tables.users.push(user_id.to_string());
        }
        Ok(())
    }

    async fn bulk_insert_records(&self, rows: &[RecordRow]) -> Result<u64, StoreError> {
        if take_fault(&self.record_collisions) {
            return Err(StoreError::IdCollision {
                table: "records".to_string(),
                message: "injected duplicate key".to_string(),
            });
        }

        if take_fault(&self.record_failures) {
            return Err(StoreError::InsertFailed {
                table: "records".to_string(),
                message: "injected failure".to_string(),
            });
        }

        let mut tables = self.lock();
        let mut seen = HashSet::new();
        for row in rows {
            if tables.record_ids.contains(&row.id) || !seen.insert(row.id) {
                return Err(StoreError::IdCollision {
                    table: "records".to_string(),
                    message: format!("duplicate key {}", row.id),
                });
            }
            if !tables.file_ids.contains(&row.file_id) {
                return Err(StoreError::InsertFailed {
                    table: "records".to_string(),
                    message: format!("file {} does not exist", row.file_id),
                });
            }
            if !tables.users.iter().any(|u| *u == row.user_id) {
                return Err(StoreError::InsertFailed {
                    table: "records".to_string(),
                    message: format!("user {} does not exist", row.user_id),
                });
            }
        }

        for row in rows {
            tables.record_ids.insert(row.id);
            tables.records.push(row.clone());
        }
        Ok(rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::IdGenerator;

    fn file_row(ids: &IdGenerator, name: &str) -> FileRow {
        FileRow::new(ids.generate().unwrap(), name, "hash")
    }

    #[tokio::test]
    async fn test_duplicate_file_id_is_collision() {
        let store = MemoryStore::new();
        let ids = IdGenerator::new();
        let row = file_row(&ids, "a.gpx");

        store.bulk_insert_files(&[row.clone()]).await.unwrap();
        let err = store.bulk_insert_files(&[row]).await.unwrap_err();

        assert!(err.is_id_collision());
        assert_eq!(store.files().len(), 1);
    }

    #[tokio::test]
    async fn test_injected_collision_fires_once() {
        let store = MemoryStore::new().with_file_collisions(1);
        let ids = IdGenerator::new();

        assert!(store
            .bulk_insert_files(&[file_row(&ids, "a.gpx")])
            .await
            .unwrap_err()
            .is_id_collision());
        assert_eq!(
            store.bulk_insert_files(&[file_row(&ids, "a.gpx")]).await.unwrap(),
            1
        );
        assert_eq!(store.file_insert_calls(), 2);
    }

    #[tokio::test]
    async fn test_record_requires_file_and_user() {
        let store = MemoryStore::new();
        let ids = IdGenerator::new();
        let file = file_row(&ids, "a.gpx");
        let record = RecordRow {
            id: ids.generate().unwrap(),
            user_id: "u1".to_string(),
            file_id: file.id,
            distance: 1.0,
            duration: 1.0,
            ascent: 1.0,
            descent: 1.0,
            elevation_diff: 0.0,
            trails: String::new(),
            raw_data: "<gpx/>".to_string(),
        };

        let err = store
            .bulk_insert_records(std::slice::from_ref(&record))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InsertFailed { .. }));

        store.bulk_insert_files(&[file]).await.unwrap();
        store
            .upsert_users(&["u1".to_string(), "u1".to_string()])
            .await
            .unwrap();
        store.bulk_insert_records(&[record]).await.unwrap();

        assert_eq!(store.users(), vec!["u1".to_string()]);
        assert_eq!(store.records().len(), 1);
    }
}
