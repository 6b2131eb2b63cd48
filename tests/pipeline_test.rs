//! End-to-end pipeline tests against the in-memory metadata store

use gpxload::adapters::database::MemoryStore;
use gpxload::config::IngestConfig;
use gpxload::core::batch::{batch_count, partition};
use gpxload::core::checksum::{hash_bytes, hash_reader};
use gpxload::core::ids::IdGenerator;
use gpxload::core::ingest::IngestCoordinator;
use gpxload::core::manifest::{aggregate, ManifestParser};
use gpxload::core::persist::{BatchPersister, PersistSettings};
use gpxload::domain::{IngestError, RowId, WorkItem};
use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use test_case::test_case;
use tokio::sync::watch;
use tracing::Span;

const HEADER: &str =
    "user_id,name,gpx_file,distance,duration,ascent,descent,elevation_diff,trails,recorded_at\n";

fn row(user: &str, file: &str) -> String {
    format!("{user},Track,{file},10.5,3600,120,110,10,ridge,2024-05-01T07:00:00Z\n")
}

fn write_manifest(dir: &Path, name: &str, rows: &[String]) {
    let mut content = HEADER.to_string();
    for r in rows {
        content.push_str(r);
    }
    std::fs::write(dir.join(name), content).unwrap();
}

fn write_tracks(dir: &Path, names: &[&str]) {
    for name in names {
        std::fs::write(dir.join(name), format!("<gpx name=\"{name}\"/>")).unwrap();
    }
}

fn settings(batch_size: usize, max_id_retries: usize) -> PersistSettings {
    PersistSettings {
        batch_size,
        max_concurrency: 8,
        insert_timeout: Duration::from_secs(10),
        max_id_retries,
    }
}

async fn parse_and_aggregate(dir: &Path) -> Vec<WorkItem> {
    let report = ManifestParser::new("csv", &Span::none())
        .parse_dir(dir)
        .await
        .unwrap();
    aggregate(report.manifests()).unwrap()
}

#[tokio::test]
async fn test_duplicate_file_names_get_their_own_rows() {
    let manifests = TempDir::new().unwrap();
    let install = TempDir::new().unwrap();
    write_manifest(
        manifests.path(),
        "routes.csv",
        &[row("u1", "a.gpx"), row("u2", "b.gpx"), row("u1", "b.gpx")],
    );
    write_tracks(install.path(), &["a.gpx", "b.gpx"]);

    let work = parse_and_aggregate(manifests.path()).await;
    let names: Vec<&str> = work.iter().map(|w| w.track_file_name.as_str()).collect();
    assert_eq!(names, vec!["a.gpx", "b.gpx", "b.gpx"]);

    let store = Arc::new(MemoryStore::new());
    let persister = BatchPersister::new(
        store.clone(),
        Arc::new(IdGenerator::new()),
        install.path(),
        settings(10, 5),
        &Span::none(),
    );
    let (_tx, shutdown) = watch::channel(false);
    let summary = persister.run(&work, &shutdown).await;

    assert_eq!(summary.records_inserted, 3);
    assert_eq!(summary.files_inserted, 3);

    let files = store.files();
    let records = store.records();
    assert_eq!(files.len(), 3);
    assert_eq!(records.len(), 3);

    let file_ids: HashSet<RowId> = files.iter().map(|f| f.id).collect();
    assert_eq!(file_ids.len(), 3, "file ids must be distinct");

    // Each record points at a file row of its own, carrying that file's content
    let by_id: HashMap<RowId, &str> = files.iter().map(|f| (f.id, f.filename.as_str())).collect();
    let referenced: HashSet<RowId> = records.iter().map(|r| r.file_id).collect();
    assert_eq!(referenced, file_ids);
    for record in &records {
        let filename = by_id[&record.file_id];
        assert_eq!(record.raw_data, format!("<gpx name=\"{filename}\"/>"));
    }

    let users: HashSet<String> = store.users().into_iter().collect();
    assert_eq!(users, HashSet::from(["u1".to_string(), "u2".to_string()]));
    assert_eq!(store.users().len(), 2);
}

#[tokio::test]
async fn test_collision_retry_keeps_filenames_and_hashes() {
    let install = TempDir::new().unwrap();
    let manifests = TempDir::new().unwrap();
    write_manifest(
        manifests.path(),
        "routes.csv",
        &[row("u1", "a.gpx"), row("u2", "b.gpx")],
    );
    write_tracks(install.path(), &["a.gpx", "b.gpx"]);
    let work = parse_and_aggregate(manifests.path()).await;

    let store = Arc::new(MemoryStore::new().with_file_collisions(2).with_record_collisions(1));
    let persister = BatchPersister::new(
        store.clone(),
        Arc::new(IdGenerator::new()),
        install.path(),
        settings(10, 5),
        &Span::none(),
    );
    let (_tx, shutdown) = watch::channel(false);
    let summary = persister.run(&work, &shutdown).await;

    assert_eq!(summary.id_retries, 3);
    assert_eq!(summary.failed_batches, 0);
    assert_eq!(store.file_insert_calls(), 3);

    let mut stored: Vec<(String, String)> = store
        .files()
        .iter()
        .map(|f| (f.filename.clone(), f.content_hash.clone()))
        .collect();
    stored.sort();
    assert_eq!(
        stored,
        vec![
            ("a.gpx".to_string(), hash_bytes(b"<gpx name=\"a.gpx\"/>")),
            ("b.gpx".to_string(), hash_bytes(b"<gpx name=\"b.gpx\"/>")),
        ]
    );

    let file_ids: HashSet<RowId> = store.files().iter().map(|f| f.id).collect();
    let records = store.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| file_ids.contains(&r.file_id)));
}

#[tokio::test]
async fn test_failed_manifest_is_reported_without_records() {
    let manifests = TempDir::new().unwrap();
    write_manifest(manifests.path(), "good.csv", &[row("u1", "a.gpx")]);
    std::fs::write(
        manifests.path().join("bad.csv"),
        format!("{HEADER}u1,Track,a.gpx,ten,3600,120,110,10,ridge,2024-05-01\n"),
    )
    .unwrap();

    let report = ManifestParser::new("csv", &Span::none())
        .parse_dir(manifests.path())
        .await
        .unwrap();

    assert_eq!(report.len(), 2);
    let bad = report
        .outcomes()
        .iter()
        .find(|o| o.file_name == "bad.csv")
        .expect("failed manifest is listed");
    assert!(bad.result.is_err());

    let work = aggregate(report.manifests()).unwrap();
    assert_eq!(work.len(), 1);
}

#[tokio::test]
async fn test_missing_manifest_directory_contents_is_fatal() {
    let manifests = TempDir::new().unwrap();
    let install = TempDir::new().unwrap();

    let mut config: IngestConfig = toml::from_str("").unwrap();
    config.sources.manifest_dir = manifests.path().display().to_string();
    config.sources.install_dir = install.path().display().to_string();

    let (_tx, shutdown) = watch::channel(false);
    let coordinator = IngestCoordinator::new(
        config,
        Arc::new(MemoryStore::new()),
        shutdown,
        &Span::none(),
    );

    let err = coordinator.execute().await.unwrap_err();
    assert!(matches!(err, IngestError::Fatal(_)));
}

#[tokio::test]
async fn test_full_run_with_manifest_rows() {
    let manifests = TempDir::new().unwrap();
    let install = TempDir::new().unwrap();
    write_manifest(
        manifests.path(),
        "a.csv",
        &[row("u1", "a.gpx"), row("u2", "missing.gpx")],
    );
    write_manifest(manifests.path(), "b.csv", &[row("u3", "b.gpx")]);
    write_tracks(install.path(), &["a.gpx", "b.gpx"]);

    let mut config: IngestConfig = toml::from_str("").unwrap();
    config.sources.manifest_dir = manifests.path().display().to_string();
    config.sources.install_dir = install.path().display().to_string();
    config.persist.batch_size = 2;

    let store = Arc::new(MemoryStore::new());
    let (_tx, shutdown) = watch::channel(false);
    let summary = IngestCoordinator::new(config, store.clone(), shutdown, &Span::none())
        .execute()
        .await
        .unwrap();

    let persist = summary.persist.as_ref().unwrap();
    assert_eq!(summary.manifests_parsed, 2);
    assert_eq!(summary.work_items, 3);
    assert_eq!(persist.batches, 2);
    assert_eq!(persist.skipped, 1);
    assert_eq!(persist.records_inserted, 2);
    // Two manifest rows plus two track file rows
    assert_eq!(persist.files_inserted, 4);
    assert_eq!(summary.exit_code(), 1);

    let manifest_rows: Vec<String> = store
        .files()
        .iter()
        .filter(|f| f.filename.ends_with(".csv"))
        .map(|f| f.filename.clone())
        .collect();
    assert_eq!(manifest_rows, vec!["a.csv".to_string(), "b.csv".to_string()]);
}

#[tokio::test]
async fn test_interrupted_run_skips_persistence() {
    let manifests = TempDir::new().unwrap();
    let install = TempDir::new().unwrap();
    write_manifest(manifests.path(), "a.csv", &[row("u1", "a.gpx")]);
    write_tracks(install.path(), &["a.gpx"]);

    let mut config: IngestConfig = toml::from_str("").unwrap();
    config.sources.manifest_dir = manifests.path().display().to_string();
    config.sources.install_dir = install.path().display().to_string();
    config.persist.persist_manifests = false;

    let store = Arc::new(MemoryStore::new());
    let (tx, shutdown) = watch::channel(false);
    tx.send(true).unwrap();

    let summary = IngestCoordinator::new(config, store.clone(), shutdown, &Span::none())
        .execute()
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.exit_code(), 130);
    assert!(store.records().is_empty());
}

#[test]
fn test_hash_is_idempotent_and_rewinds() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.gpx");
    std::fs::write(&path, "<gpx>track</gpx>").unwrap();

    let mut file = std::fs::File::open(&path).unwrap();
    file.seek(SeekFrom::Start(5)).unwrap();

    let first = hash_reader(&mut file).unwrap();
    let second = hash_reader(&mut file).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, hash_bytes(b"<gpx>track</gpx>"));

    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    assert_eq!(content, "<gpx>track</gpx>");
}

#[test_case(0, 1500 ; "empty")]
#[test_case(1, 1500 ; "single")]
#[test_case(1500, 1500 ; "exactly one batch")]
#[test_case(1501, 1500 ; "one over")]
#[test_case(4499, 1500 ; "trailing partial")]
#[test_case(10, 3 ; "small batches")]
fn test_partition_never_drops_items(n: usize, b: usize) {
    let items: Vec<usize> = (0..n).collect();
    let batches: Vec<&[usize]> = partition(&items, b).collect();

    assert_eq!(batches.len(), n.div_ceil(b));
    assert_eq!(batches.len(), batch_count(n, b));
    assert_eq!(batches.concat(), items);
}
