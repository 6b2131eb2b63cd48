//! Core pipeline logic for gpxload.
//!
//! This module contains the batch-processing pipeline and its building blocks.
//!
//! # Modules
//!
//! - [`manifest`] - Manifest discovery, concurrent parsing and aggregation
//! - [`download`] - Batched track file downloads
//! - [`persist`] - Batched row persistence with identifier-collision retry
//! - [`ingest`] - Run orchestration and summary
//! - [`batch`] - Batch partitioning shared by the batched stages
//! - [`checksum`] - Content hashing
//! - [`ids`] - Time-ordered identifier generation
//!
//! # Ingest Workflow
//!
//! 1. **Parse**: Discover manifests and parse each on its own task
//! 2. **Aggregate**: Concatenate the records of every parsed manifest
//! 3. **Download** (optional): Fetch referenced track files batch by batch
//! 4. **Persist**: Insert file, user and record rows batch by batch
//! 5. **Report**: Generate the ingest summary
//!
//! # Example
//!
//! ```rust,no_run
//! use gpxload::adapters::database::create_metadata_store;
//! use gpxload::config::load_config;
//! use gpxload::core::ingest::IngestCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("gpxload.toml")?;
//! let store = create_metadata_store(&config, config.application.dry_run).await?;
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let coordinator = IngestCoordinator::new(config, store, shutdown_rx, &tracing::Span::current());
//!
//! let summary = coordinator.execute().await?;
//! println!("Work items: {}", summary.work_items);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod checksum;
pub mod download;
pub mod ids;
pub mod ingest;
pub mod manifest;
pub mod persist;
