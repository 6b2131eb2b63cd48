//! Batched track file downloads
//!
//! The work sequence is downloaded one batch at a time. Inside a batch every
//! item runs on its own task, gated by a semaphore; the batch ends when all of
//! its tasks have finished. A failed item is logged and counted but never
//! stops its siblings or the following batches.

use crate::adapters::remote::RemoteStoreClient;
use crate::core::batch::{batch_count, partition, BatchResult};
use crate::domain::{RemoteStoreError, WorkItem};
use futures::StreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{Instrument, Span};
use uuid::Uuid;

/// Totals of one download run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadSummary {
    /// Work items the run was given
    pub total: usize,
    /// Batches that were started
    pub batches: usize,
    /// Items downloaded and written
    pub succeeded: usize,
    /// Items that failed for any reason
    pub failed: usize,
    /// Failures caused by HTTP 429
    pub rate_limited: usize,
    /// Bytes written to the install directory
    pub bytes_written: u64,
    /// Stopped early by a shutdown request
    pub interrupted: bool,
    /// Error message per failed item
    pub errors: Vec<String>,
}

/// Downloads referenced track files into the install directory
pub struct BatchDownloader {
    client: Arc<RemoteStoreClient>,
    install_dir: PathBuf,
    batch_size: usize,
    max_concurrency: usize,
    span: Span,
}

impl BatchDownloader {
    /// Create a downloader
    ///
    /// `max_concurrency` caps the in-flight requests of a batch independently
    /// of `batch_size`.
    pub fn new(
        client: Arc<RemoteStoreClient>,
        install_dir: impl Into<PathBuf>,
        batch_size: usize,
        max_concurrency: usize,
        parent: &Span,
    ) -> Self {
        Self {
            client,
            install_dir: install_dir.into(),
            batch_size: batch_size.max(1),
            max_concurrency: max_concurrency.max(1),
            span: tracing::info_span!(parent: parent, "downloader"),
        }
    }

    /// Download every work item, batch by batch
    ///
    /// A shutdown request is honoured between batches: the running batch
    /// completes and no further batch starts.
    pub async fn run(&self, work: &[WorkItem], shutdown: &watch::Receiver<bool>) -> DownloadSummary {
        let started = Instant::now();
        let total_batches = batch_count(work.len(), self.batch_size);
        let mut summary = DownloadSummary {
            total: work.len(),
            ..DownloadSummary::default()
        };
        let mut totals = BatchResult::new();

        tracing::info!(
            parent: &self.span,
            items = work.len(),
            batches = total_batches,
            batch_size = self.batch_size,
            install_dir = %self.install_dir.display(),
            "Starting downloads"
        );

        for (index, batch) in partition(work, self.batch_size).enumerate() {
            if *shutdown.borrow() {
                tracing::warn!(
                    parent: &self.span,
                    completed_batches = index,
                    total_batches,
                    "Shutdown requested, skipping remaining download batches"
                );
                summary.interrupted = true;
                break;
            }

            self.span.in_scope(|| {
                crate::log_batch_processing!(index + 1, total_batches, batch.len());
            });

            let outcome = self.download_batch(batch).await;

            tracing::info!(
                parent: &self.span,
                batch = index + 1,
                successful = outcome.result.successful,
                failed = outcome.result.failed,
                rate_limited = outcome.rate_limited,
                "Batch download completed"
            );

            summary.batches += 1;
            summary.rate_limited += outcome.rate_limited;
            summary.bytes_written += outcome.bytes_written;
            totals.merge(outcome.result);
        }

        summary.succeeded = totals.successful;
        summary.failed = totals.failed;
        summary.errors = totals.errors;

        self.span.in_scope(|| {
            crate::log_stage_complete!(
                "download",
                started,
                succeeded = summary.succeeded,
                failed = summary.failed,
                rate_limited = summary.rate_limited
            );
        });

        summary
    }

    async fn download_batch(&self, batch: &[WorkItem]) -> BatchOutcome {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let (error_tx, mut error_rx) = mpsc::unbounded_channel::<RemoteStoreError>();

        // Sole owner of the batch's error list
        let collector = tokio::spawn(async move {
            let mut errors = Vec::new();
            while let Some(error) = error_rx.recv().await {
                errors.push(error);
            }
            errors
        });

        let mut tasks = JoinSet::new();
        for item in batch {
            let item = Arc::clone(item);
            let client = Arc::clone(&self.client);
            let install_dir = self.install_dir.clone();
            let semaphore = Arc::clone(&semaphore);
            let error_tx = error_tx.clone();

            tasks.spawn(
                async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return None;
                    };

                    match download_file(&client, &item.track_file_name, &install_dir).await {
                        Ok(bytes) => {
                            tracing::info!(file = %item.track_file_name, bytes, "Downloaded track file");
                            Some(bytes)
                        }
                        Err(e) => {
                            if e.is_rate_limited() {
                                tracing::warn!(file = %item.track_file_name, error = %e, "Rate limited by remote store");
                            } else {
                                tracing::error!(file = %item.track_file_name, error = %e, "Failed to download track file");
                            }
                            let _ = error_tx.send(e);
                            None
                        }
                    }
                }
                .instrument(self.span.clone()),
            );
        }
        drop(error_tx);

        let mut result = BatchResult::new();
        let mut bytes_written = 0;
        let mut task_failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(bytes)) => {
                    result.add_success();
                    bytes_written += bytes;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(parent: &self.span, error = %e, "Download task failed");
                    task_failures.push(format!("download task failed: {e}"));
                }
            }
        }

        // Every sender is gone once the join set is drained
        let errors = match collector.await {
            Ok(errors) => errors,
            Err(e) => {
                tracing::error!(parent: &self.span, error = %e, "Download error collector failed");
                Vec::new()
            }
        };

        let rate_limited = errors.iter().filter(|e| e.is_rate_limited()).count();
        for error in errors {
            result.add_failure(error.to_string());
        }
        for failure in task_failures {
            result.add_failure(failure);
        }
        // Items whose task ended without reporting either way
        while result.successful + result.failed < batch.len() {
            result.add_failure("download task ended without a result".to_string());
        }

        BatchOutcome {
            result,
            rate_limited,
            bytes_written,
        }
    }
}

struct BatchOutcome {
    result: BatchResult,
    rate_limited: usize,
    bytes_written: u64,
}

/// Download one track file into `install_dir`
///
/// The body is streamed into a part file unique to this call, created before
/// the request is sent, and renamed onto `install_dir/file_name` only once
/// the body is complete. On failure only that part file is removed, so
/// concurrent downloads of the same name never delete each other's result.
/// Returns the number of bytes written.
pub async fn download_file(
    client: &RemoteStoreClient,
    file_name: &str,
    install_dir: &Path,
) -> Result<u64, RemoteStoreError> {
    if file_name.is_empty() || install_dir.as_os_str().is_empty() {
        return Err(RemoteStoreError::EmptyPath);
    }

    if Path::new(file_name).file_name() != Some(std::ffi::OsStr::new(file_name)) {
        return Err(RemoteStoreError::InvalidUrl {
            file_name: file_name.to_string(),
            message: "not a bare file name".to_string(),
        });
    }

    let path = install_dir.join(file_name);
    let part_path = install_dir.join(part_file_name(file_name));
    let file = File::create(&part_path)
        .await
        .map_err(|e| local_write_error(&part_path, e))?;

    tracing::debug!(path = %part_path.display(), "Created part file");

    let result = match fetch_into(client, file_name, file, &part_path).await {
        Ok(bytes) => tokio::fs::rename(&part_path, &path)
            .await
            .map(|()| bytes)
            .map_err(|e| local_write_error(&path, e)),
        Err(e) => Err(e),
    };

    if result.is_err() {
        if let Err(remove_err) = tokio::fs::remove_file(&part_path).await {
            tracing::warn!(path = %part_path.display(), error = %remove_err, "Failed to remove part file");
        } else {
            tracing::debug!(path = %part_path.display(), "Removed part file");
        }
    }

    result
}

/// `<name>.<uuid>.part`, unique per download attempt
fn part_file_name(file_name: &str) -> String {
    format!("{file_name}.{}.part", Uuid::now_v7().simple())
}

async fn fetch_into(
    client: &RemoteStoreClient,
    file_name: &str,
    mut file: File,
    path: &Path,
) -> Result<u64, RemoteStoreError> {
    let response = client.fetch(file_name).await?;

    let mut written = 0u64;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| RemoteStoreError::Request {
            file_name: file_name.to_string(),
            message: e.to_string(),
        })?;
        file.write_all(&chunk)
            .await
            .map_err(|e| local_write_error(path, e))?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(|e| local_write_error(path, e))?;
    Ok(written)
}

fn local_write_error(path: &Path, err: std::io::Error) -> RemoteStoreError {
    RemoteStoreError::LocalWrite {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
