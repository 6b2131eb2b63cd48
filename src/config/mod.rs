//! Configuration management for gpxload.
//!
//! This module provides TOML-based configuration loading, parsing, and
//! validation.
//!
//! # Overview
//!
//! gpxload uses a TOML configuration file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `GPXLOAD_<SECTION>_<KEY>` environment overrides
//! - Password files (Docker/Kubernetes secret mounts)
//! - Default values for optional settings
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use gpxload::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("gpxload.toml")?;
//!
//! println!("Manifests: {}", config.sources.manifest_dir);
//! println!("Persist batch size: {}", config.persist.batch_size);
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! environment = "development"
//!
//! [application]
//! log_level = "info"
//!
//! [sources]
//! manifest_dir = "data-sources/csv"
//! install_dir = "data-sources/gpx"
//!
//! [download]
//! enabled = true
//! base_url = "https://tracks.example.com/files"
//!
//! [postgresql]
//! host = "localhost"
//! port = 5432
//! username = "gpxload"
//! password = "${GPXLOAD_DB_PASSWORD}"
//! database_name = "tracks"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{
    ApplicationConfig, DownloadConfig, Environment, IngestConfig, LoggingConfig, PersistConfig,
    PostgreSQLConfig, SourcesConfig,
};
pub use secret::{read_secret_file, secret_string, SecretString, SecretValue};
