//! Domain error types
//!
//! This module defines the error hierarchy for gpxload. Errors are grouped by
//! the collaborator that raised them so callers can tell advisory failures
//! (a single manifest, download or row) from fatal ones (the whole run).
//! Third-party error types are flattened into messages and never leak out.

use thiserror::Error;

/// Main gpxload error type
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Manifest discovery or parsing errors
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Remote file store errors
    #[error("Remote store error: {0}")]
    RemoteStore(#[from] RemoteStoreError),

    /// Relational store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Identifier generation errors
    #[error("Identifier error: {0}")]
    Id(#[from] IdError),

    /// Fatal precondition violated (nothing to do, directory missing, ...)
    #[error("Pipeline aborted: {0}")]
    Fatal(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Background task failed to complete
    #[error("Task failed: {0}")]
    Task(String),
}

/// Errors raised while reading a single manifest file
///
/// Every variant carries the bare file name so a failed manifest can still be
/// identified in the parse report.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Manifest directory could not be listed
    #[error("Failed to read manifest directory {path}: {message}")]
    Discovery { path: String, message: String },

    /// Manifest file could not be opened
    #[error("Failed to open manifest {file_name}: {message}")]
    Open { file_name: String, message: String },

    /// Manifest rows could not be deserialized
    #[error("Failed to parse manifest {file_name}: {message}")]
    Parse { file_name: String, message: String },

    /// Manifest content hash could not be computed
    #[error("Failed to hash manifest {file_name}: {message}")]
    Hash { file_name: String, message: String },
}

impl ManifestError {
    /// File name the error refers to (directory path for discovery errors)
    pub fn file_name(&self) -> &str {
        match self {
            ManifestError::Discovery { path, .. } => path,
            ManifestError::Open { file_name, .. }
            | ManifestError::Parse { file_name, .. }
            | ManifestError::Hash { file_name, .. } => file_name,
        }
    }
}

/// Remote file store errors
///
/// Rate limiting is kept apart from other HTTP failures so a backoff policy
/// can target it specifically.
#[derive(Debug, Error)]
pub enum RemoteStoreError {
    /// File name or destination directory was empty
    #[error("File name or output path is empty")]
    EmptyPath,

    /// Invalid base URL or file name
    #[error("Invalid download URL for {file_name}: {message}")]
    InvalidUrl { file_name: String, message: String },

    /// Request could not be sent or the body could not be read
    #[error("Request for {file_name} failed: {message}")]
    Request { file_name: String, message: String },

    /// Server answered 429 Too Many Requests
    #[error("Rate limited while downloading {file_name}")]
    RateLimited { file_name: String },

    /// Server answered with a non-success status
    #[error("Failed to download {file_name}: status {status}")]
    UnexpectedStatus { file_name: String, status: u16 },

    /// Local file could not be created or written
    #[error("Failed to write {path}: {message}")]
    LocalWrite { path: String, message: String },
}

impl RemoteStoreError {
    /// Whether the caller should back off before retrying
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RemoteStoreError::RateLimited { .. })
    }
}

/// Relational store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not obtain a connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// A generated identifier collided with an existing primary key
    #[error("Identifier collision on {table}: {message}")]
    IdCollision { table: String, message: String },

    /// The bulk call exceeded its deadline
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// Bulk insert failed for a reason other than an identifier collision
    #[error("Failed to insert into {table}: {message}")]
    InsertFailed { table: String, message: String },

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Any other query failure
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

impl StoreError {
    /// Whether retrying with fresh identifiers can resolve the failure
    pub fn is_id_collision(&self) -> bool {
        matches!(self, StoreError::IdCollision { .. })
    }
}

/// Identifier generation errors
#[derive(Debug, Error)]
pub enum IdError {
    /// System clock is before the Unix epoch or out of range
    #[error("System clock unavailable: {0}")]
    Clock(String),

    /// Operating system entropy source failed
    #[error("Entropy source unavailable: {0}")]
    Entropy(String),
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for IngestError {
    fn from(err: toml::de::Error) -> Self {
        IngestError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<tokio::task::JoinError> for IngestError {
    fn from(err: tokio::task::JoinError) -> Self {
        IngestError::Task(err.to_string())
    }
}
