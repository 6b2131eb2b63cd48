//! PostgreSQL client implementation
//!
//! Owns the connection pool and the embedded schema migrations.

use crate::config::schema::{validate_port, PostgreSQLConfig};
use crate::domain::{IngestError, Result, StoreError};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::config::SslMode;
use tokio_postgres::NoTls;

/// Schema migrations compiled into the binary, applied in order
pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial_schema.sql",
    include_str!("../../../migrations/001_initial_schema.sql"),
)];

/// PostgreSQL client for gpxload
///
/// Provides pooled connections and schema setup.
pub struct PostgreSQLClient {
    pool: Pool,
    target: String,
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// The pool connects lazily; call [`PostgreSQLClient::test_connection`]
    /// to fail fast on an unreachable server.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the settings cannot form a valid
    /// connection or the pool cannot be built.
    pub fn new(config: &PostgreSQLConfig) -> Result<Self> {
        let pg_config = build_pg_config(config)?;

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let timeout = Some(Duration::from_secs(config.connection_timeout_seconds));
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .wait_timeout(timeout)
            .create_timeout(timeout)
            .recycle_timeout(timeout)
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .build()
            .map_err(|e| {
                IngestError::Configuration(format!("Failed to create connection pool: {e}"))
            })?;

        Ok(Self {
            pool,
            target: config.display_target(),
        })
    }

    /// Test the connection to PostgreSQL
    pub async fn test_connection(&self) -> std::result::Result<(), StoreError> {
        let client = self.get_connection().await?;

        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| StoreError::ConnectionFailed(format!("Connection test failed: {e}")))?;

        tracing::info!(target_db = %self.target, "PostgreSQL connection test successful");
        Ok(())
    }

    /// Apply the embedded migrations
    ///
    /// Every statement is idempotent, so applying twice is harmless. Returns
    /// the names of the applied scripts.
    pub async fn run_migrations(&self) -> std::result::Result<Vec<&'static str>, StoreError> {
        let client = self.get_connection().await?;

        let mut applied = Vec::with_capacity(MIGRATIONS.len());
        for (name, sql) in MIGRATIONS {
            tracing::info!(migration = name, "Applying migration");
            client
                .batch_execute(sql)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{name}: {e}")))?;
            applied.push(*name);
        }

        Ok(applied)
    }

    /// Get a connection from the pool
    pub async fn get_connection(&self) -> std::result::Result<Object, StoreError> {
        self.pool.get().await.map_err(|e| {
            StoreError::ConnectionFailed(format!(
                "Failed to get connection to {}: {e}",
                self.target
            ))
        })
    }

    /// Connection target without credentials
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Get the pool statistics
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }
}

fn build_pg_config(config: &PostgreSQLConfig) -> Result<tokio_postgres::Config> {
    let port = validate_port(&config.port)
        .map_err(|e| IngestError::Configuration(format!("postgresql.port: {e}")))?;

    let ssl_mode = match config.ssl_mode.as_str() {
        "disable" => SslMode::Disable,
        "prefer" => SslMode::Prefer,
        other => {
            return Err(IngestError::Configuration(format!(
                "Unsupported postgresql.ssl_mode '{other}'"
            )))
        }
    };

    let mut pg_config = tokio_postgres::Config::new();
    pg_config
        .host(&config.host)
        .port(port)
        .user(&config.username)
        .dbname(&config.database_name)
        .application_name("gpxload")
        .ssl_mode(ssl_mode)
        .connect_timeout(Duration::from_secs(config.connection_timeout_seconds));

    if let Some(ref password) = config.password {
        pg_config.password(password.expose_secret().as_ref());
    }

    Ok(pg_config)
}
