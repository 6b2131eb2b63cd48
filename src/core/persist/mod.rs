//! Row persistence
//!
//! [`BatchPersister`] turns work items into file, user and record rows and
//! writes them through a [`MetadataStore`](crate::adapters::database::MetadataStore)
//! one batch at a time.

pub mod batch;

pub use batch::{BatchPersister, PersistSettings, PersistSummary};
