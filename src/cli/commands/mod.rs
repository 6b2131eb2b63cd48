//! CLI command implementations
//!
//! Every command returns the process exit code: 0 success, 1 completed with
//! errors, 2 configuration error, 4 connection error, 5 fatal error and 130
//! interrupted.

pub mod ingest;
pub mod init;
pub mod migrate;
pub mod validate;
