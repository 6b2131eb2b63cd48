//! Domain models and types for gpxload.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Input models** ([`Manifest`], [`Record`]) parsed from manifest files
//! - **Row descriptors** ([`FileRow`], [`RecordRow`]) handed to the store
//! - **Identifiers** ([`RowId`]) for persisted rows
//! - **Error types** ([`IngestError`], [`ManifestError`], [`RemoteStoreError`], [`StoreError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible pipeline operations return [`Result<T, IngestError>`]:
//!
//! ```rust
//! use gpxload::domain::{IngestError, Result};
//!
//! fn example() -> Result<()> {
//!     let config = gpxload::config::load_config("gpxload.toml")?;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod ids;
pub mod manifest;
pub mod result;
pub mod rows;

pub use errors::{IdError, IngestError, ManifestError, RemoteStoreError, StoreError};
pub use ids::RowId;
pub use manifest::{Manifest, Record, WorkItem};
pub use result::Result;
pub use rows::{FileRow, RecordRow};
