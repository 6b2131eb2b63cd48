//! Batched persistence of file, user and record rows
//!
//! Each batch runs in two phases. First every record is prepared on its own
//! task: identifiers are minted, the local track file is hashed and read, and
//! the resulting rows are sent to one collector per table. Once every task has
//! finished the collected rows are written in order: files, users, records.
//!
//! A primary-key collision on a bulk insert regenerates the identifiers of
//! the whole batch and retries, up to `max_id_retries` times. Record rows are
//! remapped to the regenerated file identifiers so they keep pointing at the
//! file rows of their own batch.

use crate::adapters::database::MetadataStore;
use crate::config::PersistConfig;
use crate::core::batch::{batch_count, partition};
use crate::core::checksum::hash_reader;
use crate::core::ids::IdGenerator;
use crate::domain::{
    FileRow, IdError, Manifest, Record, RecordRow, RowId, StoreError, WorkItem,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{Instrument, Span};

/// Persistence tuning
#[derive(Debug, Clone)]
pub struct PersistSettings {
    /// Records per batch
    pub batch_size: usize,
    /// Row preparations running at once within a batch
    pub max_concurrency: usize,
    /// Deadline for each bulk store call
    pub insert_timeout: Duration,
    /// Retries with fresh identifiers after a collision
    pub max_id_retries: usize,
}

impl PersistSettings {
    /// Settings from the `[persist]` section
    pub fn from_config(config: &PersistConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_concurrency: config.max_concurrency,
            insert_timeout: Duration::from_secs(config.insert_timeout_seconds),
            max_id_retries: config.max_id_retries,
        }
    }
}

impl Default for PersistSettings {
    fn default() -> Self {
        Self::from_config(&PersistConfig::default())
    }
}

/// Totals of one persistence run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistSummary {
    /// Work items the run was given
    pub total: usize,
    /// Batches that were started
    pub batches: usize,
    /// Records whose file and record rows were both prepared
    pub prepared: usize,
    /// Records dropped during preparation
    pub skipped: usize,
    /// File rows written, manifests included
    pub files_inserted: u64,
    /// Users created
    pub users_upserted: u64,
    /// Record rows written
    pub records_inserted: u64,
    /// Bulk inserts repeated with regenerated identifiers
    pub id_retries: usize,
    /// Batches whose writes failed
    pub failed_batches: usize,
    /// Stopped early by a shutdown request
    pub interrupted: bool,
    /// Advisory error messages
    pub errors: Vec<String>,
}

/// Writes manifests and work items to a [`MetadataStore`]
pub struct BatchPersister {
    store: Arc<dyn MetadataStore>,
    ids: Arc<IdGenerator>,
    install_dir: PathBuf,
    settings: PersistSettings,
    span: Span,
}

/// Rows gathered from one batch's preparation tasks
#[derive(Debug, Default)]
struct PreparedBatch {
    files: Vec<FileRow>,
    users: Vec<String>,
    records: Vec<RecordRow>,
    skipped: Vec<String>,
}

/// Row counts written for one batch
#[derive(Debug, Default)]
struct BatchWrite {
    files: u64,
    users: u64,
    records: u64,
    retries: usize,
}

impl BatchPersister {
    /// Create a persister reading track files from `install_dir`
    pub fn new(
        store: Arc<dyn MetadataStore>,
        ids: Arc<IdGenerator>,
        install_dir: impl Into<PathBuf>,
        settings: PersistSettings,
        parent: &Span,
    ) -> Self {
        Self {
            store,
            ids,
            install_dir: install_dir.into(),
            settings,
            span: tracing::info_span!(parent: parent, "persister"),
        }
    }

    /// Store one file row per manifest, carrying the manifest hash
    ///
    /// Returns the number of rows written. A failure is advisory and recorded
    /// in `summary`.
    pub async fn persist_manifests<'a>(
        &self,
        manifests: impl IntoIterator<Item = &'a Manifest>,
        summary: &mut PersistSummary,
    ) -> u64 {
        let mut files = Vec::new();
        for manifest in manifests {
            match self.ids.generate() {
                Ok(id) => files.push(FileRow::from_manifest(id, manifest)),
                Err(e) => {
                    tracing::error!(parent: &self.span, file = %manifest.file_name, error = %e, "Failed to generate manifest file id");
                    summary
                        .errors
                        .push(format!("{}: {e}", manifest.file_name));
                }
            }
        }

        if files.is_empty() {
            return 0;
        }

        tracing::info!(parent: &self.span, count = files.len(), "Inserting manifest file rows");

        match self.insert_files(&mut files, &mut []).await {
            Ok((inserted, retries)) => {
                summary.files_inserted += inserted;
                summary.id_retries += retries;
                inserted
            }
            Err(e) => {
                tracing::error!(parent: &self.span, error = %e, "Failed to insert manifest file rows");
                summary.errors.push(format!("manifest files: {e}"));
                0
            }
        }
    }

    /// Persist every work item, batch by batch
    ///
    /// Batches run strictly one after another. A shutdown request is honoured
    /// between batches.
    pub async fn run(&self, work: &[WorkItem], shutdown: &watch::Receiver<bool>) -> PersistSummary {
        let mut summary = PersistSummary::default();
        self.run_into(work, shutdown, &mut summary).await;
        summary
    }

    /// Like [`BatchPersister::run`], adding to an existing summary
    pub async fn run_into(
        &self,
        work: &[WorkItem],
        shutdown: &watch::Receiver<bool>,
        summary: &mut PersistSummary,
    ) {
        let started = Instant::now();
        let batch_size = self.settings.batch_size.max(1);
        let total_batches = batch_count(work.len(), batch_size);
        summary.total += work.len();

        tracing::info!(
            parent: &self.span,
            items = work.len(),
            batches = total_batches,
            batch_size,
            "Starting persistence"
        );

        for (index, batch) in partition(work, batch_size).enumerate() {
            if *shutdown.borrow() {
                tracing::warn!(
                    parent: &self.span,
                    completed_batches = index,
                    total_batches,
                    "Shutdown requested, skipping remaining persistence batches"
                );
                summary.interrupted = true;
                break;
            }

            self.span.in_scope(|| {
                crate::log_batch_processing!(index + 1, total_batches, batch.len());
            });

            let batch_started = Instant::now();
            let prepared = self.prepare_batch(batch).await;

            summary.batches += 1;
            summary.prepared += prepared.records.len();
            summary.skipped += prepared.skipped.len();
            summary.errors.extend(prepared.skipped.iter().cloned());

            match self.write_batch(prepared).await {
                Ok(written) => {
                    tracing::info!(
                        parent: &self.span,
                        batch = index + 1,
                        files = written.files,
                        users = written.users,
                        records = written.records,
                        retries = written.retries,
                        elapsed_ms = batch_started.elapsed().as_millis() as u64,
                        "Batch persisted"
                    );
                    summary.files_inserted += written.files;
                    summary.users_upserted += written.users;
                    summary.records_inserted += written.records;
                    summary.id_retries += written.retries;
                }
                Err((e, written)) => {
                    tracing::error!(
                        parent: &self.span,
                        batch = index + 1,
                        error = %e,
                        "Batch persistence failed"
                    );
                    summary.files_inserted += written.files;
                    summary.users_upserted += written.users;
                    summary.records_inserted += written.records;
                    summary.id_retries += written.retries;
                    summary.failed_batches += 1;
                    summary.errors.push(format!("batch {}: {e}", index + 1));
                }
            }
        }

        self.span.in_scope(|| {
            crate::log_stage_complete!(
                "persist",
                started,
                files = summary.files_inserted,
                records = summary.records_inserted,
                skipped = summary.skipped,
                failed_batches = summary.failed_batches
            );
        });
    }

    /// Prepare rows for every record of the batch
    async fn prepare_batch(&self, batch: &[WorkItem]) -> PreparedBatch {
        let (files_tx, files_rx) = mpsc::unbounded_channel::<FileRow>();
        let (records_tx, records_rx) = mpsc::unbounded_channel::<RecordRow>();
        let (users_tx, mut users_rx) = mpsc::unbounded_channel::<String>();

        let files_collector = tokio::spawn(collect(files_rx));
        let records_collector = tokio::spawn(collect(records_rx));
        let users_collector = tokio::spawn(async move {
            let mut seen = HashSet::new();
            let mut users = Vec::new();
            while let Some(user) = users_rx.recv().await {
                if seen.insert(user.clone()) {
                    users.push(user);
                }
            }
            users
        });

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for item in batch {
            let item = Arc::clone(item);
            let ids = Arc::clone(&self.ids);
            let install_dir = self.install_dir.clone();
            let semaphore = Arc::clone(&semaphore);
            let senders = RowSenders {
                files: files_tx.clone(),
                records: records_tx.clone(),
                users: users_tx.clone(),
            };
            let span = self.span.clone();

            tasks.spawn(
                async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| format!("{}: {e}", item.track_file_name))?;

                    let file_name = item.track_file_name.clone();
                    tokio::task::spawn_blocking(move || {
                        let _enter = span.enter();
                        prepare_record(&ids, &install_dir, &item, &senders)
                    })
                    .await
                    .map_err(|e| format!("{file_name}: preparation task failed: {e}"))??;
                    Ok(file_name)
                }
                .instrument(self.span.clone()),
            );
        }
        drop(files_tx);
        drop(records_tx);
        drop(users_tx);

        let mut prepared_names = Vec::new();
        let mut skipped = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| format!("preparation task failed: {e}"));
            match outcome.and_then(|inner| inner) {
                Ok(file_name) => prepared_names.push(file_name),
                Err(message) => {
                    tracing::warn!(parent: &self.span, error = %message, "Record skipped");
                    skipped.push(message);
                }
            }
        }

        // All senders are dropped once the join set is drained
        let files = self.finish_collector("files", files_collector).await;
        let records = self.finish_collector("records", records_collector).await;
        let users = self.finish_collector("users", users_collector).await;

        assemble_batch(files, records, users, prepared_names, skipped)
    }

    async fn finish_collector<T>(
        &self,
        name: &str,
        handle: tokio::task::JoinHandle<Vec<T>>,
    ) -> Result<Vec<T>, String> {
        handle.await.map_err(|e| {
            tracing::error!(parent: &self.span, collector = name, error = %e, "Row collector failed");
            format!("{name} collector failed: {e}")
        })
    }

    /// Write one prepared batch: files, then users, then records
    ///
    /// On failure the counts written so far are returned with the error.
    async fn write_batch(
        &self,
        mut prepared: PreparedBatch,
    ) -> Result<BatchWrite, (StoreError, BatchWrite)> {
        let mut written = BatchWrite::default();

        if prepared.files.is_empty() {
            return Ok(written);
        }

        match self
            .insert_files(&mut prepared.files, &mut prepared.records)
            .await
        {
            Ok((inserted, retries)) => {
                written.files = inserted;
                written.retries += retries;
            }
            Err(e) => return Err((e, written)),
        }

        if !prepared.users.is_empty() {
            let store = Arc::clone(&self.store);
            let users = prepared.users;
            match self
                .with_deadline("upsert users", async move { store.upsert_users(&users).await })
                .await
            {
                Ok(upserted) => written.users = upserted,
                Err(e) => return Err((e, written)),
            }
        }

        if prepared.records.is_empty() {
            return Ok(written);
        }

        match self.insert_records(&mut prepared.records).await {
            Ok((inserted, retries)) => {
                written.records = inserted;
                written.retries += retries;
                Ok(written)
            }
            Err(e) => Err((e, written)),
        }
    }

    /// Bulk insert file rows, regenerating every id on collision
    ///
    /// `records` referencing a regenerated file id are updated to the new id.
    /// Returns rows written and the number of retries.
    async fn insert_files(
        &self,
        files: &mut [FileRow],
        records: &mut [RecordRow],
    ) -> Result<(u64, usize), StoreError> {
        let mut retries = 0;
        loop {
            let rows = files.to_vec();
            let store = Arc::clone(&self.store);
            match self
                .with_deadline("bulk insert files", async move {
                    store.bulk_insert_files(&rows).await
                })
                .await
            {
                Ok(inserted) => return Ok((inserted, retries)),
                Err(e) if e.is_id_collision() && retries < self.settings.max_id_retries => {
                    retries += 1;
                    self.span.in_scope(|| {
                        crate::log_retry_attempt!(retries, self.settings.max_id_retries, e);
                    });

                    let remap = regenerate_ids(&self.ids, files.iter_mut().map(|f| &mut f.id))
                        .map_err(|e| regeneration_error("files", e))?;
                    for record in records.iter_mut() {
                        if let Some(new_id) = remap.get(&record.file_id) {
                            record.file_id = *new_id;
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Bulk insert record rows, regenerating every id on collision
    async fn insert_records(&self, records: &mut [RecordRow]) -> Result<(u64, usize), StoreError> {
        let mut retries = 0;
        loop {
            let rows = records.to_vec();
            let store = Arc::clone(&self.store);
            match self
                .with_deadline("bulk insert records", async move {
                    store.bulk_insert_records(&rows).await
                })
                .await
            {
                Ok(inserted) => return Ok((inserted, retries)),
                Err(e) if e.is_id_collision() && retries < self.settings.max_id_retries => {
                    retries += 1;
                    self.span.in_scope(|| {
                        crate::log_retry_attempt!(retries, self.settings.max_id_retries, e);
                    });

                    regenerate_ids(&self.ids, records.iter_mut().map(|r| &mut r.id))
                        .map_err(|e| regeneration_error("records", e))?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run a store call under the configured deadline
    async fn with_deadline<T, F>(&self, operation: &str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.settings.insert_timeout, call)
            .instrument(self.span.clone())
            .await
            .map_err(|_| StoreError::Timeout {
                operation: operation.to_string(),
                seconds: self.settings.insert_timeout.as_secs(),
            })?
    }
}

/// Combine the collected rows of one batch
///
/// If any collector was lost the rows of the others no longer line up, so
/// every prepared record of the batch is reported as skipped instead.
fn assemble_batch(
    files: Result<Vec<FileRow>, String>,
    records: Result<Vec<RecordRow>, String>,
    users: Result<Vec<String>, String>,
    prepared_names: Vec<String>,
    mut skipped: Vec<String>,
) -> PreparedBatch {
    match (files, records, users) {
        (Ok(files), Ok(records), Ok(users)) => PreparedBatch {
            files,
            users,
            records,
            skipped,
        },
        (files, records, users) => {
            let failures: Vec<String> = [files.err(), records.err(), users.err()]
                .into_iter()
                .flatten()
                .collect();
            let reason = failures.join("; ");
            skipped.extend(
                prepared_names
                    .into_iter()
                    .map(|name| format!("{name}: rows dropped: {reason}")),
            );
            PreparedBatch {
                skipped,
                ..PreparedBatch::default()
            }
        }
    }
}

struct RowSenders {
    files: UnboundedSender<FileRow>,
    records: UnboundedSender<RecordRow>,
    users: UnboundedSender<String>,
}

async fn collect<T>(mut rx: UnboundedReceiver<T>) -> Vec<T> {
    let mut rows = Vec::new();
    while let Some(row) = rx.recv().await {
        rows.push(row);
    }
    rows
}

/// Prepare and emit the rows of one record
///
/// The file row is emitted as soon as the track file is hashed; the record
/// row and user id follow once the content is read. Any failure drops the
/// rest of this record only.
fn prepare_record(
    ids: &IdGenerator,
    install_dir: &Path,
    record: &Record,
    senders: &RowSenders,
) -> Result<(), String> {
    let file_name = &record.track_file_name;
    let fail = |step: &str, e: &dyn std::fmt::Display| format!("{file_name}: {step}: {e}");

    let file_id = ids.generate().map_err(|e| fail("file id", &e))?;
    let record_id = ids.generate().map_err(|e| fail("record id", &e))?;

    let path = install_dir.join(file_name);
    let mut file = std::fs::File::open(&path).map_err(|e| fail("open", &e))?;

    let content_hash = hash_reader(&mut file).map_err(|e| fail("hash", &e))?;
    senders
        .files
        .send(FileRow::new(file_id, file_name.clone(), content_hash))
        .map_err(|e| fail("collect file row", &e))?;

    let mut raw_data = String::new();
    file.read_to_string(&mut raw_data)
        .map_err(|e| fail("read", &e))?;

    senders
        .records
        .send(RecordRow::from_record(record_id, file_id, record, raw_data))
        .map_err(|e| fail("collect record row", &e))?;
    senders
        .users
        .send(record.user_id.clone())
        .map_err(|e| fail("collect user", &e))?;

    tracing::debug!(file = %file_name, "Prepared record");
    Ok(())
}

/// Assign a fresh id to every row, returning old id to new id
fn regenerate_ids<'a>(
    ids: &IdGenerator,
    rows: impl Iterator<Item = &'a mut RowId>,
) -> Result<HashMap<RowId, RowId>, IdError> {
    let mut remap = HashMap::new();
    for id in rows {
        let fresh = ids.generate()?;
        remap.insert(*id, fresh);
        *id = fresh;
    }
    Ok(remap)
}

fn regeneration_error(table: &str, err: IdError) -> StoreError {
    StoreError::InsertFailed {
        table: table.to_string(),
        message: format!("could not regenerate identifiers: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn record(user: &str, file: &str) -> WorkItem {
        Arc::new(Record {
            user_id: user.to_string(),
            display_name: "track".to_string(),
            track_file_name: file.to_string(),
            distance: 1.5,
            duration: 60.0,
            ascent: 10.0,
            descent: 5.0,
            elevation_diff: 5.0,
            trails: "ridge".to_string(),
            recorded_at: "2024-05-01".to_string(),
        })
    }

    fn install_dir(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    fn persister(store: Arc<MemoryStore>, dir: &TempDir, settings: PersistSettings) -> BatchPersister {
        BatchPersister::new(
            store,
            Arc::new(IdGenerator::new()),
            dir.path(),
            settings,
            &Span::none(),
        )
    }

    fn settings(batch_size: usize) -> PersistSettings {
        PersistSettings {
            batch_size,
            max_concurrency: 4,
            insert_timeout: Duration::from_secs(5),
            max_id_retries: 3,
        }
    }

    #[tokio::test]
    async fn test_missing_file_skips_only_that_record() {
        let dir = install_dir(&[("a.gpx", "<a/>"), ("c.gpx", "<c/>")]);
        let store = Arc::new(MemoryStore::new());
        let (_tx, shutdown) = watch::channel(false);

        let work = vec![record("u1", "a.gpx"), record("u2", "missing.gpx"), record("u1", "c.gpx")];
        let summary = persister(Arc::clone(&store), &dir, settings(10))
            .run(&work, &shutdown)
            .await;

        assert_eq!(summary.prepared, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.records_inserted, 2);
        assert!(summary.errors[0].contains("missing.gpx"));
        assert_eq!(store.users(), vec!["u1".to_string()]);
    }

    #[tokio::test]
    async fn test_file_collision_retries_with_new_ids() {
        let dir = install_dir(&[("a.gpx", "<a/>"), ("b.gpx", "<b/>")]);
        let store = Arc::new(MemoryStore::new().with_file_collisions(2));
        let (_tx, shutdown) = watch::channel(false);

        let work = vec![record("u1", "a.gpx"), record("u2", "b.gpx")];
        let summary = persister(Arc::clone(&store), &dir, settings(10))
            .run(&work, &shutdown)
            .await;

        assert_eq!(summary.id_retries, 2);
        assert_eq!(summary.failed_batches, 0);
        assert_eq!(store.file_insert_calls(), 3);
        assert_eq!(store.records().len(), 2);

        let file_ids: HashSet<RowId> = store.files().iter().map(|f| f.id).collect();
        assert!(store.records().iter().all(|r| file_ids.contains(&r.file_id)));
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted_fails_batch_only() {
        let dir = install_dir(&[("a.gpx", "<a/>"), ("b.gpx", "<b/>")]);
        let store = Arc::new(MemoryStore::new().with_file_collisions(4));
        let (_tx, shutdown) = watch::channel(false);

        let work = vec![record("u1", "a.gpx"), record("u2", "b.gpx")];
        let summary = persister(Arc::clone(&store), &dir, settings(1))
            .run(&work, &shutdown)
            .await;

        // First batch uses up all four collisions, second batch is clean
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.failed_batches, 1);
        assert_eq!(summary.records_inserted, 1);
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_record_failure_is_advisory() {
        let dir = install_dir(&[("a.gpx", "<a/>"), ("b.gpx", "<b/>")]);
        let store = Arc::new(MemoryStore::new().with_record_failures(1));
        let (_tx, shutdown) = watch::channel(false);

        let work = vec![record("u1", "a.gpx"), record("u2", "b.gpx")];
        let summary = persister(Arc::clone(&store), &dir, settings(1))
            .run(&work, &shutdown)
            .await;

        assert_eq!(summary.failed_batches, 1);
        assert_eq!(summary.files_inserted, 2);
        assert_eq!(summary.records_inserted, 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_before_next_batch() {
        let dir = install_dir(&[("a.gpx", "<a/>")]);
        let store = Arc::new(MemoryStore::new());
        let (tx, shutdown) = watch::channel(false);
        tx.send(true).unwrap();

        let work = vec![record("u1", "a.gpx")];
        let summary = persister(Arc::clone(&store), &dir, settings(1))
            .run(&work, &shutdown)
            .await;

        assert!(summary.interrupted);
        assert_eq!(summary.batches, 0);
        assert!(store.files().is_empty());
    }

    #[tokio::test]
    async fn test_persist_manifests() {
        let dir = install_dir(&[]);
        let store = Arc::new(MemoryStore::new().with_file_collisions(1));
        let manifest = Manifest {
            file_name: "routes.csv".to_string(),
            path: dir.path().join("routes.csv"),
            content_hash: "abc".to_string(),
            records: vec![],
        };

        let mut summary = PersistSummary::default();
        let inserted = persister(Arc::clone(&store), &dir, settings(10))
            .persist_manifests([&manifest], &mut summary)
            .await;

        assert_eq!(inserted, 1);
        assert_eq!(summary.id_retries, 1);
        assert_eq!(store.files()[0].filename, "routes.csv");
        assert_eq!(store.files()[0].content_hash, "abc");
    }

    /// Store whose first file insert outlasts any short deadline
    struct StallingStore {
        inner: MemoryStore,
        stalls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl MetadataStore for StallingStore {
        async fn test_connection(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn bulk_insert_files(&self, rows: &[FileRow]) -> Result<u64, StoreError> {
            let stall = self
                .stalls
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if stall {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            self.inner.bulk_insert_files(rows).await
        }

        async fn upsert_user(&self, user_id: &str) -> Result<(), StoreError> {
            self.inner.upsert_user(user_id).await
        }

        async fn bulk_insert_records(&self, rows: &[RecordRow]) -> Result<u64, StoreError> {
            self.inner.bulk_insert_records(rows).await
        }
    }

    #[tokio::test]
    async fn test_insert_timeout_fails_batch_only() {
        let dir = install_dir(&[("a.gpx", "<a/>"), ("b.gpx", "<b/>")]);
        let store = Arc::new(StallingStore {
            inner: MemoryStore::new(),
            stalls: AtomicUsize::new(1),
        });
        let (_tx, shutdown) = watch::channel(false);

        let persister = BatchPersister::new(
            Arc::clone(&store) as Arc<dyn MetadataStore>,
            Arc::new(IdGenerator::new()),
            dir.path(),
            PersistSettings {
                insert_timeout: Duration::from_millis(50),
                ..settings(1)
            },
            &Span::none(),
        );

        let work = vec![record("u1", "a.gpx"), record("u2", "b.gpx")];
        let summary = persister.run(&work, &shutdown).await;

        assert_eq!(summary.batches, 2);
        assert_eq!(summary.failed_batches, 1);
        assert!(summary
            .errors
            .iter()
            .any(|e| e.contains("bulk insert files timed out")));

        // The second batch is written normally
        assert_eq!(summary.records_inserted, 1);
        assert_eq!(store.inner.records().len(), 1);
        assert_eq!(store.inner.files()[0].filename, "b.gpx");
    }

    #[tokio::test]
    async fn test_lost_collector_reports_batch_as_skipped() {
        let dir = install_dir(&[]);
        let persister = persister(Arc::new(MemoryStore::new()), &dir, settings(10));

        let crashed = tokio::spawn(async {
            if true {
                panic!("collector crashed");
            }
            Vec::<RecordRow>::new()
        });
        let records = persister.finish_collector("records", crashed).await;
        assert!(records.as_ref().unwrap_err().starts_with("records collector failed"));

        let ids = IdGenerator::new();
        let files = vec![
            FileRow::new(ids.generate().unwrap(), "a.gpx", "h"),
            FileRow::new(ids.generate().unwrap(), "b.gpx", "h"),
        ];
        let prepared = assemble_batch(
            Ok(files),
            records,
            Ok(vec!["u1".to_string()]),
            vec!["a.gpx".to_string(), "b.gpx".to_string()],
            vec!["c.gpx: open: not found".to_string()],
        );

        assert!(prepared.files.is_empty());
        assert!(prepared.records.is_empty());
        assert!(prepared.users.is_empty());
        assert_eq!(prepared.skipped.len(), 3);
        assert!(prepared.skipped[1].starts_with("a.gpx: rows dropped: records collector failed"));
        assert!(prepared.skipped[2].starts_with("b.gpx: rows dropped"));
    }

    #[test]
    fn test_assemble_batch_keeps_rows_when_collectors_finish() {
        let ids = IdGenerator::new();
        let file = FileRow::new(ids.generate().unwrap(), "a.gpx", "h");

        let prepared = assemble_batch(
            Ok(vec![file]),
            Ok(Vec::new()),
            Ok(vec!["u1".to_string()]),
            vec!["a.gpx".to_string()],
            Vec::new(),
        );

        assert_eq!(prepared.files.len(), 1);
        assert_eq!(prepared.users, vec!["u1".to_string()]);
        assert!(prepared.skipped.is_empty());
    }

    #[test]
    fn test_regenerate_ids_maps_old_to_new() {
        let ids = IdGenerator::new();
        let mut rows = vec![
            FileRow::new(ids.generate().unwrap(), "a.gpx", "h"),
            FileRow::new(ids.generate().unwrap(), "a.gpx", "h"),
        ];
        let before: Vec<RowId> = rows.iter().map(|r| r.id).collect();

        let remap = regenerate_ids(&ids, rows.iter_mut().map(|r| &mut r.id)).unwrap();

        assert_eq!(remap.len(), 2);
        for (old, row) in before.iter().zip(&rows) {
            assert_ne!(*old, row.id);
            assert_eq!(remap[old], row.id);
        }
    }
}
