//! Concurrent manifest parsing
//!
//! Every manifest in the source directory is parsed on its own blocking task.
//! Outcomes flow through one channel to a single collector; a failure in one
//! file is recorded next to its file name and never blocks the others.

use crate::core::checksum::hash_reader;
use crate::domain::{IngestError, Manifest, ManifestError, Record, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::Span;

/// Result of parsing one manifest file
#[derive(Debug)]
pub struct ParseOutcome {
    /// Bare file name, also set when parsing failed
    pub file_name: String,
    pub result: std::result::Result<Manifest, ManifestError>,
}

impl ParseOutcome {
    /// Whether the manifest parsed and hashed cleanly
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Every outcome of one parse run, sorted by file name
#[derive(Debug, Default)]
pub struct ParseReport {
    outcomes: Vec<ParseOutcome>,
}

impl ParseReport {
    fn new(mut outcomes: Vec<ParseOutcome>) -> Self {
        outcomes.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Self { outcomes }
    }

    /// All outcomes, successes and failures alike
    pub fn outcomes(&self) -> &[ParseOutcome] {
        &self.outcomes
    }

    /// Manifests that parsed cleanly
    pub fn manifests(&self) -> impl Iterator<Item = &Manifest> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Per-file failures
    pub fn errors(&self) -> impl Iterator<Item = &ManifestError> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }

    /// Number of files that failed
    pub fn failed_count(&self) -> usize {
        self.errors().count()
    }

    /// Number of files that were attempted
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Discovers and parses manifest files
pub struct ManifestParser {
    extension: String,
    span: Span,
}

impl ManifestParser {
    /// Creates a parser for files ending in `.{extension}`
    ///
    /// Log events are emitted under a `manifest_parser` span nested in `parent`.
    pub fn new(extension: impl Into<String>, parent: &Span) -> Self {
        Self {
            extension: extension.into(),
            span: tracing::info_span!(parent: parent, "manifest_parser"),
        }
    }

    /// Lists manifest files in `dir` as absolute paths, sorted
    ///
    /// Subdirectories and files with other extensions are skipped.
    pub fn discover(&self, dir: &Path) -> std::result::Result<Vec<PathBuf>, ManifestError> {
        let discovery_error = |e: std::io::Error| ManifestError::Discovery {
            path: dir.display().to_string(),
            message: e.to_string(),
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(discovery_error)? {
            let entry = entry.map_err(discovery_error)?;
            if !entry.file_type().map_err(discovery_error)?.is_file() {
                continue;
            }

            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == self.extension);
            if !matches {
                continue;
            }

            files.push(std::fs::canonicalize(&path).map_err(discovery_error)?);
        }

        files.sort();
        Ok(files)
    }

    /// Parses every manifest in `dir`
    ///
    /// # Errors
    ///
    /// Fails only when the directory cannot be listed or holds no manifest
    /// files. Per-file failures are reported in the returned [`ParseReport`].
    pub async fn parse_dir(&self, dir: &Path) -> Result<ParseReport> {
        let started = Instant::now();
        let files = self.discover(dir)?;

        if files.is_empty() {
            return Err(IngestError::Fatal(format!(
                "no .{} manifest files found in {}",
                self.extension,
                dir.display()
            )));
        }

        tracing::info!(
            parent: &self.span,
            directory = %dir.display(),
            files = files.len(),
            "Manifest files found, starting parse"
        );

        let report = self.parse_files(files).await?;

        for error in report.errors() {
            tracing::error!(parent: &self.span, file = %error.file_name(), error = %error, "Manifest failed");
        }
        self.span.in_scope(|| {
            crate::log_stage_complete!(
                "parse",
                started,
                files = report.len(),
                failed = report.failed_count()
            );
        });

        Ok(report)
    }

    /// Parses the given files, one blocking task per file
    pub async fn parse_files(&self, files: Vec<PathBuf>) -> Result<ParseReport> {
        let (tx, mut rx) = mpsc::unbounded_channel::<ParseOutcome>();

        let collector = tokio::spawn(async move {
            let mut outcomes = Vec::new();
            while let Some(outcome) = rx.recv().await {
                outcomes.push(outcome);
            }
            outcomes
        });

        let mut tasks = JoinSet::new();
        for path in files {
            let tx = tx.clone();
            let span = self.span.clone();
            tasks.spawn_blocking(move || {
                let _enter = span.enter();
                let outcome = parse_outcome(&path);
                match &outcome.result {
                    Ok(manifest) => tracing::info!(
                        file = %outcome.file_name,
                        records = manifest.len(),
                        "Parsed manifest"
                    ),
                    Err(e) => tracing::debug!(file = %outcome.file_name, error = %e, "Manifest parse failed"),
                }
                // The receiver lives until every sender is dropped
                let _ = tx.send(outcome);
            });
        }
        drop(tx);

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(parent: &self.span, error = %e, "Manifest parse task failed");
            }
        }

        let outcomes = collector.await?;
        Ok(ParseReport::new(outcomes))
    }
}

fn parse_outcome(path: &Path) -> ParseOutcome {
    let file_name = bare_file_name(path);
    ParseOutcome {
        result: parse_manifest_file(path),
        file_name,
    }
}

fn bare_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Reads, deserializes and hashes one manifest file
///
/// On a deserialization error no records are returned at all.
pub fn parse_manifest_file(path: &Path) -> std::result::Result<Manifest, ManifestError> {
    let file_name = bare_file_name(path);

    let mut file = File::open(path).map_err(|e| ManifestError::Open {
        file_name: file_name.clone(),
        message: e.to_string(),
    })?;

    let records = {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(&mut file);
        reader
            .deserialize::<Record>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ManifestError::Parse {
                file_name: file_name.clone(),
                message: e.to_string(),
            })?
    };

    let content_hash = hash_reader(&mut file).map_err(|e| ManifestError::Hash {
        file_name: file_name.clone(),
        message: e.to_string(),
    })?;

    Ok(Manifest {
        file_name,
        path: path.to_path_buf(),
        content_hash,
        records,
    })
}
