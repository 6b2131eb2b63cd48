//! Result type alias for gpxload

use super::errors::IngestError;

/// Result type alias for gpxload operations
///
/// # Examples
///
/// ```
/// use gpxload::domain::result::Result;
/// use gpxload::domain::errors::IngestError;
///
/// fn failing_function() -> Result<()> {
///     Err(IngestError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, IngestError>;
