//! Manifest discovery, parsing and aggregation
//!
//! - [`parser`] - Concurrent parsing of every manifest in a directory
//! - [`aggregate`] - Flattening parsed manifests into work items

pub mod aggregate;
pub mod parser;

pub use aggregate::aggregate;
pub use parser::{parse_manifest_file, ManifestParser, ParseOutcome, ParseReport};
