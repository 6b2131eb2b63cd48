//! External system integrations for gpxload.
//!
//! This module provides adapters for the collaborators of the pipeline:
//!
//! - [`database`] - Metadata store abstraction layer (trait-based)
//! - [`postgresql`] - PostgreSQL implementation
//! - [`remote`] - HTTP client for the remote track file store
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external dependencies and
//! enable testing with in-memory implementations. The persister only sees the
//! [`database::MetadataStore`] trait.
//!
//! # Remote Store Adapter
//!
//! ```rust,no_run
//! use gpxload::adapters::remote::RemoteStoreClient;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RemoteStoreClient::new("https://tracks.example.com/gpx", Duration::from_secs(60))?;
//! let response = client.fetch("a.gpx").await?;
//! println!("status: {}", response.status());
//! # Ok(())
//! # }
//! ```
//!
//! # PostgreSQL Adapter
//!
//! ```rust,no_run
//! use gpxload::adapters::postgresql::{PostgreSQLClient, PostgreSQLStore};
//! use gpxload::config::load_config;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("gpxload.toml")?;
//! let pg = config.postgresql.as_ref().ok_or("missing [postgresql]")?;
//!
//! let client = Arc::new(PostgreSQLClient::new(pg)?);
//! client.run_migrations().await?;
//! let store = PostgreSQLStore::new(client);
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod postgresql;
pub mod remote;
