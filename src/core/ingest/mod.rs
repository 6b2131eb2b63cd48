//! Pipeline orchestration
//!
//! This module wires the stages together and reports the outcome of a run.

pub mod coordinator;
pub mod summary;

pub use coordinator::IngestCoordinator;
pub use summary::IngestSummary;
