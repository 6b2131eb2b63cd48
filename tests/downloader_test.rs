//! Batch downloader tests against a mock remote store

use gpxload::adapters::remote::RemoteStoreClient;
use gpxload::core::download::BatchDownloader;
use gpxload::domain::{Record, WorkItem};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use tracing::Span;

fn work_item(file: &str) -> WorkItem {
    Arc::new(Record {
        user_id: "u1".to_string(),
        display_name: "Track".to_string(),
        track_file_name: file.to_string(),
        distance: 1.0,
        duration: 60.0,
        ascent: 0.0,
        descent: 0.0,
        elevation_diff: 0.0,
        trails: String::new(),
        recorded_at: "2024-05-01".to_string(),
    })
}

fn downloader(server: &mockito::Server, dir: &TempDir, batch_size: usize) -> BatchDownloader {
    let client = RemoteStoreClient::new(&server.url(), Duration::from_secs(5)).unwrap();
    BatchDownloader::new(Arc::new(client), dir.path(), batch_size, 4, &Span::none())
}

#[tokio::test]
async fn test_rate_limited_item_does_not_block_batch() {
    let mut server = mockito::Server::new_async().await;
    let _a = server
        .mock("GET", "/a.gpx")
        .with_status(200)
        .with_body("<gpx>a</gpx>")
        .create_async()
        .await;
    let _b = server
        .mock("GET", "/b.gpx")
        .with_status(200)
        .with_body("<gpx>b</gpx>")
        .create_async()
        .await;
    let _c = server
        .mock("GET", "/c.gpx")
        .with_status(429)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let work = vec![work_item("a.gpx"), work_item("b.gpx"), work_item("c.gpx")];
    let (_tx, shutdown) = watch::channel(false);

    let summary = downloader(&server, &dir, 3).run(&work, &shutdown).await;

    assert_eq!(summary.batches, 1);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.rate_limited, 1);
    assert!(summary.errors[0].contains("c.gpx"));

    assert!(dir.path().join("a.gpx").exists());
    assert!(dir.path().join("b.gpx").exists());
    assert!(!dir.path().join("c.gpx").exists());
}

#[tokio::test]
async fn test_one_failure_leaves_siblings_complete() {
    let mut server = mockito::Server::new_async().await;
    // Mocks are removed from the server when dropped
    let mut mocks = Vec::new();
    for name in ["t1.gpx", "t2.gpx", "t3.gpx", "t5.gpx"] {
        let mock = server
            .mock("GET", format!("/{name}").as_str())
            .with_status(200)
            .with_body(name)
            .create_async()
            .await;
        mocks.push(mock);
    }
    let _failing = server
        .mock("GET", "/t4.gpx")
        .with_status(503)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let work: Vec<WorkItem> = (1..=5).map(|i| work_item(&format!("t{i}.gpx"))).collect();
    let (_tx, shutdown) = watch::channel(false);

    let summary = downloader(&server, &dir, 5).run(&work, &shutdown).await;

    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.rate_limited, 0);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("t5.gpx")).unwrap(),
        "t5.gpx"
    );
}

#[tokio::test]
async fn test_batches_cover_every_item() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", mockito::Matcher::Regex(r"^/f\d+\.gpx$".to_string()))
        .with_status(200)
        .with_body("<gpx/>")
        .expect(7)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let work: Vec<WorkItem> = (0..7).map(|i| work_item(&format!("f{i}.gpx"))).collect();
    let (_tx, shutdown) = watch::channel(false);

    let summary = downloader(&server, &dir, 3).run(&work, &shutdown).await;

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.succeeded, 7);
    assert_eq!(summary.bytes_written, 7 * 6);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_duplicate_name_failure_keeps_sibling_download() {
    let mut server = mockito::Server::new_async().await;
    // The first request for b.gpx succeeds, every later one is rate limited
    let ok = server
        .mock("GET", "/b.gpx")
        .with_status(200)
        .with_body("<gpx>b</gpx>")
        .expect(1)
        .create_async()
        .await;
    let _limited = server
        .mock("GET", "/b.gpx")
        .with_status(429)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let work = vec![work_item("b.gpx"), work_item("b.gpx")];
    let (_tx, shutdown) = watch::channel(false);

    let summary = downloader(&server, &dir, 2).run(&work, &shutdown).await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.rate_limited, 1);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("b.gpx")).unwrap(),
        "<gpx>b</gpx>"
    );

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["b.gpx".to_string()]);
    ok.assert_async().await;
}

#[tokio::test]
async fn test_shutdown_before_start_downloads_nothing() {
    let server = mockito::Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let (tx, shutdown) = watch::channel(false);
    tx.send(true).unwrap();

    let summary = downloader(&server, &dir, 2)
        .run(&[work_item("a.gpx")], &shutdown)
        .await;

    assert!(summary.interrupted);
    assert_eq!(summary.batches, 0);
    assert_eq!(summary.succeeded, 0);
}
