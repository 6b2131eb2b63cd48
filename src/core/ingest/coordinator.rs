//! Ingest coordinator - main orchestrator for a pipeline run
//!
//! This module drives the stages in order: parse manifests, aggregate the
//! work sequence, prepare the install directory, download track files and
//! persist rows. Only the preconditions between stages are fatal; everything
//! inside a stage is advisory and ends up in the [`IngestSummary`].

use crate::adapters::database::MetadataStore;
use crate::adapters::remote::RemoteStoreClient;
use crate::config::IngestConfig;
use crate::core::download::BatchDownloader;
use crate::core::ids::IdGenerator;
use crate::core::ingest::summary::IngestSummary;
use crate::core::manifest::{aggregate, ManifestParser};
use crate::core::persist::{BatchPersister, PersistSettings, PersistSummary};
use crate::domain::{IngestError, Result};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::Span;

/// Ingest coordinator
pub struct IngestCoordinator {
    config: IngestConfig,
    store: Arc<dyn MetadataStore>,
    ids: Arc<IdGenerator>,
    shutdown: watch::Receiver<bool>,
    span: Span,
}

impl IngestCoordinator {
    /// Create a coordinator writing through `store`
    ///
    /// The store is expected to be connected already; see
    /// [`create_metadata_store`](crate::adapters::database::create_metadata_store).
    pub fn new(
        config: IngestConfig,
        store: Arc<dyn MetadataStore>,
        shutdown: watch::Receiver<bool>,
        parent: &Span,
    ) -> Self {
        let span = tracing::info_span!(
            parent: parent,
            "ingest",
            dry_run = config.application.dry_run
        );
        Self {
            config,
            store,
            ids: Arc::new(IdGenerator::new()),
            shutdown,
            span,
        }
    }

    /// Execute the run
    ///
    /// # Errors
    ///
    /// Fails when no manifest is found, when the manifests hold no records,
    /// when the install directory cannot be created, or when the remote store
    /// client cannot be built.
    pub async fn execute(&self) -> Result<IngestSummary> {
        let started = Instant::now();
        let mut summary = IngestSummary::new();
        summary.started_at = Some(Utc::now());
        summary.dry_run = self.config.application.dry_run;

        tracing::info!(parent: &self.span, "Starting ingest");

        let sources = &self.config.sources;
        let parser = ManifestParser::new(&sources.manifest_extension, &self.span);
        let report = parser.parse_dir(Path::new(&sources.manifest_dir)).await?;

        summary.manifests_found = report.len();
        summary.manifests_parsed = report.manifests().count();
        summary.manifests_failed = report.failed_count();
        summary.errors = report.errors().map(|e| e.to_string()).collect();

        let work = aggregate(report.manifests())?;
        summary.work_items = work.len();
        tracing::info!(
            parent: &self.span,
            manifests = summary.manifests_parsed,
            work_items = work.len(),
            "Work sequence built"
        );

        let install_dir = Path::new(&sources.install_dir);
        tokio::fs::create_dir_all(install_dir).await.map_err(|e| {
            IngestError::Fatal(format!(
                "cannot create install directory {}: {e}",
                install_dir.display()
            ))
        })?;

        if self.config.download.enabled {
            let download = &self.config.download;
            let client = Arc::new(RemoteStoreClient::new(
                &download.base_url,
                Duration::from_secs(download.request_timeout_seconds),
            )?);
            let downloader = BatchDownloader::new(
                client,
                install_dir,
                download.batch_size,
                download.max_concurrency,
                &self.span,
            );

            let outcome = downloader.run(&work, &self.shutdown).await;
            summary.interrupted |= outcome.interrupted;
            summary.download = Some(outcome);
        } else {
            tracing::info!(parent: &self.span, "Download stage disabled");
        }

        if !self.config.persist.enabled {
            tracing::info!(parent: &self.span, "Persistence stage disabled");
        } else if summary.interrupted {
            tracing::warn!(parent: &self.span, "Skipping persistence after shutdown request");
        } else {
            let persister = BatchPersister::new(
                Arc::clone(&self.store),
                Arc::clone(&self.ids),
                install_dir,
                PersistSettings::from_config(&self.config.persist),
                &self.span,
            );

            let mut outcome = PersistSummary::default();
            if self.config.persist.persist_manifests {
                persister
                    .persist_manifests(report.manifests(), &mut outcome)
                    .await;
            }
            persister
                .run_into(&work, &self.shutdown, &mut outcome)
                .await;

            summary.interrupted |= outcome.interrupted;
            summary.persist = Some(outcome);
        }

        let summary = summary.with_duration(started.elapsed());
        self.span.in_scope(|| summary.log_summary());

        Ok(summary)
    }
}
