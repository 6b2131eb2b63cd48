//! Configuration schema types
//!
//! This module defines the configuration structure for gpxload. Every section
//! maps to a TOML table and validates itself.

use crate::config::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

/// Runtime environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Development,
    /// Production environment
    Production,
}

/// Main gpxload configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Runtime environment (development, production)
    #[serde(default)]
    pub environment: Environment,

    /// Manifest and track file locations
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Remote track store settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Persistence batching settings
    #[serde(default)]
    pub persist: PersistConfig,

    /// PostgreSQL configuration (required if persist.enabled = true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgresql: Option<PostgreSQLConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl IngestConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.sources.validate()?;
        self.download.validate(&self.environment)?;
        self.persist.validate()?;

        if self.persist.enabled {
            match self.postgresql {
                Some(ref config) => config.validate()?,
                None => {
                    return Err(
                        "postgresql configuration is required when persist.enabled = true"
                            .to_string(),
                    )
                }
            }
        }

        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dry run mode (don't write to the database)
    #[serde(default)]
    pub dry_run: bool,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

/// Manifest and track file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Directory scanned for manifest files
    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: String,

    /// Extension (without dot) identifying manifest files
    #[serde(default = "default_manifest_extension")]
    pub manifest_extension: String,

    /// Directory track files are downloaded to and read from
    #[serde(default = "default_install_dir")]
    pub install_dir: String,
}

impl SourcesConfig {
    fn validate(&self) -> Result<(), String> {
        if self.manifest_dir.trim().is_empty() {
            return Err("sources.manifest_dir cannot be empty".to_string());
        }
        if self.install_dir.trim().is_empty() {
            return Err("sources.install_dir cannot be empty".to_string());
        }
        if self.manifest_extension.trim().is_empty() || self.manifest_extension.starts_with('.') {
            return Err(format!(
                "sources.manifest_extension must be a bare extension like 'csv', got '{}'",
                self.manifest_extension
            ));
        }
        Ok(())
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            manifest_dir: default_manifest_dir(),
            manifest_extension: default_manifest_extension(),
            install_dir: default_install_dir(),
        }
    }
}

/// Remote track store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Download referenced track files before persisting
    #[serde(default)]
    pub enabled: bool,

    /// Base URL; files are fetched from `<base_url>/<file name>`
    #[serde(default)]
    pub base_url: String,

    /// Records per download batch
    #[serde(default = "default_download_batch_size")]
    pub batch_size: usize,

    /// Concurrent downloads within a batch
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl DownloadConfig {
    fn validate(&self, environment: &Environment) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }

        let url = url::Url::parse(&self.base_url)
            .map_err(|e| format!("download.base_url '{}' is invalid: {e}", self.base_url))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(format!(
                "download.base_url must use http or https, got '{}'",
                url.scheme()
            ));
        }

        // Plain HTTP is only acceptable outside production
        if *environment == Environment::Production && url.scheme() != "https" {
            return Err(
                "download.base_url must use https when environment = production".to_string(),
            );
        }

        validate_batching("download", self.batch_size, self.max_concurrency)?;

        if self.request_timeout_seconds == 0 {
            return Err("download.request_timeout_seconds must be > 0".to_string());
        }

        Ok(())
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            batch_size: default_download_batch_size(),
            max_concurrency: default_max_concurrency(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

/// Persistence batching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistConfig {
    /// Write file, user and record rows to PostgreSQL
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Records per persistence batch
    #[serde(default = "default_persist_batch_size")]
    pub batch_size: usize,

    /// Concurrent row preparations within a batch
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Deadline for a single bulk insert, in seconds
    #[serde(default = "default_insert_timeout_seconds")]
    pub insert_timeout_seconds: u64,

    /// Attempts with regenerated identifiers after a primary-key collision
    #[serde(default = "default_max_id_retries")]
    pub max_id_retries: usize,

    /// Store one file row per parsed manifest
    #[serde(default = "default_true")]
    pub persist_manifests: bool,
}

impl PersistConfig {
    fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }

        validate_batching("persist", self.batch_size, self.max_concurrency)?;

        if self.insert_timeout_seconds == 0 {
            return Err("persist.insert_timeout_seconds must be > 0".to_string());
        }

        if self.max_id_retries > 100 {
            return Err(format!(
                "persist.max_id_retries must be <= 100, got {}",
                self.max_id_retries
            ));
        }

        Ok(())
    }
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: default_persist_batch_size(),
            max_concurrency: default_max_concurrency(),
            insert_timeout_seconds: default_insert_timeout_seconds(),
            max_id_retries: default_max_id_retries(),
            persist_manifests: true,
        }
    }
}

fn validate_batching(section: &str, batch_size: usize, max_concurrency: usize) -> Result<(), String> {
    if batch_size == 0 || batch_size > 100_000 {
        return Err(format!(
            "{section}.batch_size must be between 1 and 100000, got {batch_size}"
        ));
    }
    if max_concurrency == 0 || max_concurrency > 1024 {
        return Err(format!(
            "{section}.max_concurrency must be between 1 and 1024, got {max_concurrency}"
        ));
    }
    Ok(())
}

/// PostgreSQL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgreSQLConfig {
    /// Database host
    #[serde(default = "default_pg_host")]
    pub host: String,

    /// Database port, as a number or a string
    #[serde(default = "default_pg_port", deserialize_with = "deserialize_port")]
    pub port: String,

    /// Login role
    pub username: String,

    /// Password (stored securely in memory and zeroized on drop)
    #[serde(default)]
    pub password: Option<SecretString>,

    /// File holding the password; read at load time when `password` is unset
    #[serde(default)]
    pub password_file: Option<String>,

    /// Database name
    pub database_name: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_pg_max_connections")]
    pub max_connections: usize,

    /// Connection timeout in seconds
    #[serde(default = "default_pg_connection_timeout_seconds")]
    pub connection_timeout_seconds: u64,

    /// SSL mode (disable or prefer)
    #[serde(default = "default_pg_ssl_mode")]
    pub ssl_mode: String,
}

impl PostgreSQLConfig {
    fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("postgresql.host cannot be empty".to_string());
        }

        validate_port(&self.port).map_err(|e| format!("postgresql.port: {e}"))?;

        if self.username.trim().is_empty() {
            return Err("postgresql.username cannot be empty".to_string());
        }

        if self.database_name.trim().is_empty() {
            return Err("postgresql.database_name cannot be empty".to_string());
        }

        if self.password.is_none() {
            return Err(
                "postgresql.password or postgresql.password_file must be provided".to_string(),
            );
        }

        if self.max_connections == 0 || self.max_connections > 100 {
            return Err(format!(
                "postgresql.max_connections must be between 1 and 100, got {}",
                self.max_connections
            ));
        }

        let valid_ssl_modes = ["disable", "prefer"];
        if !valid_ssl_modes.contains(&self.ssl_mode.as_str()) {
            return Err(format!(
                "postgresql.ssl_mode must be one of: {}, got '{}'",
                valid_ssl_modes.join(", "),
                self.ssl_mode
            ));
        }

        Ok(())
    }

    /// Connection target without credentials, for logs
    pub fn display_target(&self) -> String {
        format!(
            "postgresql://{}@{}:{}/{}",
            self.username, self.host, self.port, self.database_name
        )
    }
}

/// Validates a TCP port given as text
///
/// The port must be numeric, within 1..=65535 and outside the privileged
/// range below 1024.
///
/// # Examples
///
/// ```
/// use gpxload::config::schema::validate_port;
///
/// assert_eq!(validate_port("5432"), Ok(5432));
/// assert!(validate_port("80").is_err());
/// assert!(validate_port("seventy").is_err());
/// ```
pub fn validate_port(port: &str) -> Result<u16, String> {
    let number: u32 = port
        .trim()
        .parse()
        .map_err(|_| format!("port '{port}' is not a number"))?;

    if number == 0 || number > 65535 {
        return Err(format!("port {port} is out of range"));
    }

    if number < 1024 {
        return Err(format!("port {port} is a privileged port"));
    }

    Ok(number as u16)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(i64),
    Text(String),
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match PortValue::deserialize(deserializer)? {
        PortValue::Number(n) => n.to_string(),
        PortValue::Text(s) => s,
    })
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log file directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,

    /// Maximum log file size in MB
    #[serde(default = "default_local_max_size_mb")]
    pub local_max_size_mb: usize,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_max_size_mb == 0 {
            return Err("logging.local_max_size_mb must be > 0".to_string());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
            local_max_size_mb: default_local_max_size_mb(),
        }
    }
}

// Default value functions

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_manifest_dir() -> String {
    "data-sources/csv".to_string()
}

fn default_manifest_extension() -> String {
    "csv".to_string()
}

fn default_install_dir() -> String {
    "data-sources/gpx".to_string()
}

fn default_download_batch_size() -> usize {
    500
}

fn default_persist_batch_size() -> usize {
    1500
}

fn default_max_concurrency() -> usize {
    64
}

fn default_request_timeout_seconds() -> u64 {
    60
}

fn default_insert_timeout_seconds() -> u64 {
    600
}

fn default_max_id_retries() -> usize {
    5
}

fn default_pg_host() -> String {
    "localhost".to_string()
}

fn default_pg_port() -> String {
    "5432".to_string()
}

fn default_pg_max_connections() -> usize {
    20
}

fn default_pg_connection_timeout_seconds() -> u64 {
    30
}

fn default_pg_ssl_mode() -> String {
    "disable".to_string()
}

fn default_local_path() -> String {
    "logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

fn default_local_max_size_mb() -> usize {
    100
}
