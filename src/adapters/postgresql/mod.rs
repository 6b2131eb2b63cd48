//! PostgreSQL integration
//!
//! Connection pooling, embedded migrations and the bulk-insert
//! [`MetadataStore`](crate::adapters::database::MetadataStore) implementation.

pub mod adapter;
pub mod client;

pub use adapter::PostgreSQLStore;
pub use client::{PostgreSQLClient, MIGRATIONS};
