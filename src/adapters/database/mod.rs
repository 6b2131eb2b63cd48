//! Metadata store abstraction layer
//!
//! The persister depends on the [`MetadataStore`] trait only. Implementations:
//!
//! - [`crate::adapters::postgresql::PostgreSQLStore`] - PostgreSQL via a
//!   connection pool
//! - [`DryRunStore`] - logs what would be written
//! - [`MemoryStore`] - in-process tables with fault injection

pub mod dry_run;
pub mod factory;
pub mod memory;
pub mod traits;

pub use dry_run::DryRunStore;
pub use factory::create_metadata_store;
pub use memory::MemoryStore;
pub use traits::MetadataStore;
