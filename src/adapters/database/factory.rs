//! Metadata store factory

use crate::adapters::database::dry_run::DryRunStore;
use crate::adapters::database::traits::MetadataStore;
use crate::adapters::postgresql::{PostgreSQLClient, PostgreSQLStore};
use crate::config::IngestConfig;
use crate::domain::{IngestError, Result};
use std::sync::Arc;

/// Create the metadata store for a run
///
/// Dry runs get a [`DryRunStore`] and never open a connection. Otherwise a
/// PostgreSQL pool is created and checked once.
///
/// # Errors
///
/// Returns [`IngestError::Configuration`] when the `[postgresql]` section is
/// missing and [`IngestError::Store`] when the server cannot be reached.
pub async fn create_metadata_store(
    config: &IngestConfig,
    dry_run: bool,
) -> Result<Arc<dyn MetadataStore>> {
    if dry_run {
        tracing::info!("Dry run: database writes are disabled");
        return Ok(Arc::new(DryRunStore::new()));
    }

    let pg_config = config.postgresql.as_ref().ok_or_else(|| {
        IngestError::Configuration("postgresql configuration is required".to_string())
    })?;

    tracing::info!(target_db = %pg_config.display_target(), "Creating PostgreSQL client");
    let client = Arc::new(PostgreSQLClient::new(pg_config)?);
    client.test_connection().await?;

    Ok(Arc::new(PostgreSQLStore::new(client)))
}
