//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Configurable log levels
//! - Console output
//! - JSON file logging with rotation
//!
//! # Example
//!
//! ```no_run
//! use gpxload::logging::init_logging;
//! use gpxload::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the start of a batch
///
/// # Example
///
/// ```no_run
/// use gpxload::log_batch_processing;
///
/// log_batch_processing!(3, 10, 500);
/// ```
#[macro_export]
macro_rules! log_batch_processing {
    ($current:expr, $total:expr, $size:expr) => {
        tracing::debug!(
            batch = $current,
            total_batches = $total,
            batch_size = $size,
            progress_pct = ($current as f64 / $total as f64 * 100.0),
            "Processing batch"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use gpxload::log_retry_attempt;
///
/// log_retry_attempt!(2, 5, "identifier collision on files");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying operation"
        );
    };
}

/// Log the end of a pipeline stage with its duration
///
/// # Example
///
/// ```no_run
/// use gpxload::log_stage_complete;
/// use std::time::Instant;
///
/// let started = Instant::now();
/// log_stage_complete!("parse", started, manifests = 4);
/// ```
#[macro_export]
macro_rules! log_stage_complete {
    ($stage:expr, $started:expr $(, $field:ident = $value:expr)* $(,)?) => {
        tracing::info!(
            stage = $stage,
            elapsed_ms = $started.elapsed().as_millis() as u64,
            $($field = $value,)*
            "Stage completed"
        );
    };
}
