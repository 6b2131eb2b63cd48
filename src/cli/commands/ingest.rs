//! Ingest command implementation
//!
//! This module implements the `ingest` command, which runs the whole
//! pipeline once and exits.

use crate::adapters::database::{create_metadata_store, DryRunStore, MetadataStore};
use crate::config::{load_config, IngestConfig};
use crate::core::ingest::{IngestCoordinator, IngestSummary};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Maximum number of error lines printed after a run
const MAX_PRINTED_ERRORS: usize = 10;

/// Arguments for the ingest command
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Dry run mode - run every stage without writing to the database
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the download stage even if enabled in the configuration
    #[arg(long)]
    pub no_download: bool,

    /// Override the manifest directory
    #[arg(long)]
    pub manifest_dir: Option<String>,

    /// Override the install directory
    #[arg(long)]
    pub install_dir: Option<String>,

    /// Write the run summary as JSON to this file
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

impl IngestArgs {
    /// Apply command-line overrides to a loaded configuration
    pub fn apply_overrides(&self, config: &mut IngestConfig) {
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }

        if self.no_download {
            tracing::info!("Disabling download stage from CLI");
            config.download.enabled = false;
        }

        if let Some(dir) = &self.manifest_dir {
            tracing::info!(manifest_dir = %dir, "Overriding manifest directory from CLI");
            config.sources.manifest_dir = dir.clone();
        }

        if let Some(dir) = &self.install_dir {
            tracing::info!(install_dir = %dir, "Overriding install directory from CLI");
            config.sources.install_dir = dir.clone();
        }
    }

    /// Execute the ingest command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting ingest command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        self.apply_overrides(&mut config);

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        let dry_run = config.application.dry_run;
        if dry_run {
            tracing::info!("Dry run mode enabled - no data will be written");
            println!("🔍 DRY RUN MODE - No data will be written to the database");
            println!();
        }

        let store: Arc<dyn MetadataStore> = if config.persist.enabled {
            match create_metadata_store(&config, dry_run).await {
                Ok(store) => store,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create metadata store");
                    eprintln!("Failed to connect to the database: {e}");
                    return Ok(4);
                }
            }
        } else {
            Arc::new(DryRunStore::new())
        };

        let coordinator =
            IngestCoordinator::new(config, store, shutdown_signal, &tracing::Span::current());

        println!("🚀 Starting ingest...");
        println!();

        let summary = match coordinator.execute().await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Ingest failed");
                eprintln!("Ingest failed: {e}");
                return Ok(5);
            }
        };

        print_summary(&summary);

        if let Some(path) = &self.report {
            match write_report(&summary, path) {
                Ok(()) => println!("📝 Report written to {}", path.display()),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to write report");
                    eprintln!("Failed to write report: {e}");
                }
            }
        }

        let exit_code = summary.exit_code();
        match exit_code {
            130 => {
                println!("⚠️  Ingest interrupted after the current batch.");
                tracing::info!("Ingest interrupted by user signal");
            }
            0 => println!("✅ Ingest completed successfully!"),
            _ => println!("⚠️  Ingest completed with errors"),
        }

        Ok(exit_code)
    }
}

fn write_report(summary: &IngestSummary, path: &Path) -> anyhow::Result<()> {
    let json = summary.to_json()?;
    std::fs::write(path, json)?;
    Ok(())
}

fn print_summary(summary: &IngestSummary) {
    println!();
    println!("📊 Ingest Summary:");
    println!(
        "  Manifests: {} found, {} parsed, {} failed",
        summary.manifests_found, summary.manifests_parsed, summary.manifests_failed
    );
    println!("  Work items: {}", summary.work_items);

    if let Some(download) = &summary.download {
        println!(
            "  Downloads: {} ok, {} failed ({} rate limited), {} bytes",
            download.succeeded, download.failed, download.rate_limited, download.bytes_written
        );
    }

    if let Some(persist) = &summary.persist {
        println!(
            "  Rows prepared: {}, skipped: {}",
            persist.prepared, persist.skipped
        );
        println!(
            "  Inserted: {} files, {} users, {} records",
            persist.files_inserted, persist.users_upserted, persist.records_inserted
        );
        println!(
            "  Identifier retries: {}, failed batches: {}",
            persist.id_retries, persist.failed_batches
        );
    }

    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!();

    let errors: Vec<&String> = summary.all_errors().collect();
    if !errors.is_empty() {
        println!("⚠️  Errors encountered:");
        for error in errors.iter().take(MAX_PRINTED_ERRORS) {
            println!("  - {error}");
        }
        if errors.len() > MAX_PRINTED_ERRORS {
            println!("  ... and {} more", errors.len() - MAX_PRINTED_ERRORS);
        }
        println!();
    }
}
