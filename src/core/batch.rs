//! Batch partitioning shared by the downloader and persister
//!
//! The work sequence is cut into contiguous chunks of a fixed size; the last
//! chunk may be shorter. Every item lands in exactly one batch.

/// Number of batches needed for `item_count` items
///
/// Rounds up, so a trailing partial batch is always counted. A zero batch size
/// is treated as one item per batch, matching [`partition`].
///
/// # Examples
///
/// ```
/// use gpxload::core::batch::batch_count;
///
/// assert_eq!(batch_count(10, 3), 4);
/// assert_eq!(batch_count(9, 3), 3);
/// assert_eq!(batch_count(0, 3), 0);
/// ```
pub fn batch_count(item_count: usize, batch_size: usize) -> usize {
    item_count.div_ceil(batch_size.max(1))
}

/// Splits `items` into contiguous batches of at most `batch_size`
///
/// A zero batch size is treated as one item per batch.
pub fn partition<T>(items: &[T], batch_size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(batch_size.max(1))
}

/// Counters for one processed batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Items that completed
    pub successful: usize,
    /// Items that failed
    pub failed: usize,
    /// Advisory error messages
    pub errors: Vec<String>,
}

impl BatchResult {
    /// Create a new empty batch result
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a successful item
    pub fn add_success(&mut self) {
        self.successful += 1;
    }

    /// Add a failed item
    pub fn add_failure(&mut self, error: String) {
        self.failed += 1;
        self.errors.push(error);
    }

    /// Merge another batch result into this one
    pub fn merge(&mut self, other: BatchResult) {
        self.successful += other.successful;
        self.failed += other.failed;
        self.errors.extend(other.errors);
    }
}
