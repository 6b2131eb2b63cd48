// gpxload - GPX track manifest ingestion into PostgreSQL
// Copyright (c) 2025 gpxload Contributors
// Licensed under the MIT License

//! # gpxload - GPX track manifest ingestion
//!
//! gpxload is a batch job that reads manifest files describing recorded GPS
//! tracks, optionally downloads the referenced GPX files from a remote store
//! and loads file, user and record rows into PostgreSQL in bulk.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Parsing** manifest files concurrently, with a SHA-512 hash per file
//! - **Downloading** referenced track files in batches, isolating failures
//! - **Persisting** rows in batches with identifier-collision retry
//! - **Reporting** per-stage counters for each run
//!
//! ## Architecture
//!
//! gpxload follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Pipeline logic (manifest, download, persist, ingest)
//! - [`adapters`] - External integrations (PostgreSQL, remote file store)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gpxload::adapters::database::create_metadata_store;
//! use gpxload::config::load_config;
//! use gpxload::core::ingest::IngestCoordinator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("gpxload.toml")?;
//!     let store = create_metadata_store(&config, false).await?;
//!
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!     let coordinator =
//!         IngestCoordinator::new(config, store, shutdown_rx, &tracing::Span::current());
//!     let summary = coordinator.execute().await?;
//!
//!     println!("Queued {} records", summary.work_items);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! gpxload uses the [`domain::IngestError`] type for all errors:
//!
//! ```rust,no_run
//! use gpxload::domain::IngestError;
//!
//! fn example() -> Result<(), IngestError> {
//!     let config = gpxload::config::load_config("gpxload.toml")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! gpxload uses structured logging with the `tracing` crate. Pipeline
//! components receive a parent span and log under their own child span.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
