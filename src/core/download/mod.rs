//! Track file downloads from the remote store
//!
//! See [`BatchDownloader`] for the batching and failure isolation rules.

pub mod batch;

pub use batch::{download_file, BatchDownloader, DownloadSummary};
