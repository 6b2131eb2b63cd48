//! PostgreSQL implementation of [`MetadataStore`]
//!
//! Bulk inserts pass one array per column and expand them with `UNNEST`, so a
//! batch is a single statement and either lands completely or not at all.

use crate::adapters::database::traits::MetadataStore;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::domain::{FileRow, RecordRow, StoreError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_postgres::error::SqlState;
use uuid::Uuid;

const INSERT_FILES: &str = r#"
    INSERT INTO files (id, filename, content_hash)
    SELECT * FROM UNNEST($1::uuid[], $2::text[], $3::text[])
"#;

const UPSERT_USER: &str = "INSERT INTO users (id) VALUES ($1) ON CONFLICT (id) DO NOTHING";

const UPSERT_USERS: &str = r#"
    INSERT INTO users (id)
    SELECT * FROM UNNEST($1::text[])
    ON CONFLICT (id) DO NOTHING
"#;

const INSERT_RECORDS: &str = r#"
    INSERT INTO records (
        id, user_id, file_id, distance, duration,
        ascent, descent, elevation_diff, trails, raw_data
    )
    SELECT * FROM UNNEST(
        $1::uuid[], $2::text[], $3::uuid[], $4::real[], $5::real[],
        $6::real[], $7::real[], $8::real[], $9::text[], $10::text[]
    )
"#;

/// PostgreSQL-backed metadata store
pub struct PostgreSQLStore {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLStore {
    /// Create a new store over an existing client
    pub fn new(client: Arc<PostgreSQLClient>) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

/// Maps a failed insert, singling out primary-key clashes
fn insert_error(table: &str, err: tokio_postgres::Error) -> StoreError {
    if let Some(db_err) = err.as_db_error() {
        let on_primary_key = db_err
            .constraint()
            .is_some_and(|name| name.ends_with("_pkey"));
        if *db_err.code() == SqlState::UNIQUE_VIOLATION && on_primary_key {
            return StoreError::IdCollision {
                table: table.to_string(),
                message: db_err.message().to_string(),
            };
        }
    }

    StoreError::InsertFailed {
        table: table.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl MetadataStore for PostgreSQLStore {
    async fn test_connection(&self) -> Result<(), StoreError> {
        self.client.test_connection().await
    }

    async fn bulk_insert_files(&self, rows: &[FileRow]) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| *r.id.as_uuid()).collect();
        let filenames: Vec<&str> = rows.iter().map(|r| r.filename.as_str()).collect();
        let hashes: Vec<&str> = rows.iter().map(|r| r.content_hash.as_str()).collect();

        let conn = self.client.get_connection().await?;
        let affected = conn
            .execute(INSERT_FILES, &[&ids, &filenames, &hashes])
            .await
            .map_err(|e| insert_error("files", e))?;

        tracing::debug!(rows = rows.len(), affected, "Inserted file rows");
        Ok(affected)
    }

    async fn upsert_user(&self, user_id: &str) -> Result<(), StoreError> {
        let conn = self.client.get_connection().await?;
        conn.execute(UPSERT_USER, &[&user_id])
            .await
            .map_err(|e| insert_error("users", e))?;
        Ok(())
    }

    async fn upsert_users(&self, user_ids: &[String]) -> Result<u64, StoreError> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let conn = self.client.get_connection().await?;
        let affected = conn
            .execute(UPSERT_USERS, &[&user_ids])
            .await
            .map_err(|e| insert_error("users", e))?;

        tracing::debug!(users = user_ids.len(), created = affected, "Upserted users");
        Ok(affected)
    }

    async fn bulk_insert_records(&self, rows: &[RecordRow]) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| *r.id.as_uuid()).collect();
        let user_ids: Vec<&str> = rows.iter().map(|r| r.user_id.as_str()).collect();
        let file_ids: Vec<Uuid> = rows.iter().map(|r| *r.file_id.as_uuid()).collect();
        let distances: Vec<f32> = rows.iter().map(|r| r.distance).collect();
        let durations: Vec<f32> = rows.iter().map(|r| r.duration).collect();
        let ascents: Vec<f32> = rows.iter().map(|r| r.ascent).collect();
        let descents: Vec<f32> = rows.iter().map(|r| r.descent).collect();
        let elevation_diffs: Vec<f32> = rows.iter().map(|r| r.elevation_diff).collect();
        let trails: Vec<&str> = rows.iter().map(|r| r.trails.as_str()).collect();
        let raw_data: Vec<&str> = rows.iter().map(|r| r.raw_data.as_str()).collect();

        let conn = self.client.get_connection().await?;
        let affected = conn
            .execute(
                INSERT_RECORDS,
                &[
                    &ids,
                    &user_ids,
                    &file_ids,
                    &distances,
                    &durations,
                    &ascents,
                    &descents,
                    &elevation_diffs,
                    &trails,
                    &raw_data,
                ],
            )
            .await
            .map_err(|e| insert_error("records", e))?;

        tracing::debug!(rows = rows.len(), affected, "Inserted record rows");
        Ok(affected)
    }
}
