//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for gpxload using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// gpxload - GPX track manifest loader
#[derive(Parser, Debug)]
#[command(name = "gpxload")]
#[command(version, about, long_about = None)]
#[command(author = "gpxload Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "gpxload.toml", env = "GPXLOAD_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "GPXLOAD_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse manifests, download track files and persist rows
    Ingest(commands::ingest::IngestArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Apply the database schema
    Migrate(commands::migrate::MigrateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
