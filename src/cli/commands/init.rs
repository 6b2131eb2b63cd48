//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "gpxload.toml")]
    pub output: String,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing gpxload configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        match fs::write(&self.output, sample_config()) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Export GPXLOAD_PG_PASSWORD or set postgresql.password_file");
                println!("  3. Create the schema: gpxload migrate");
                println!("  4. Validate configuration: gpxload validate-config");
                println!("  5. Run the pipeline: gpxload ingest");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }
}

/// Sample configuration with every section and its defaults
pub fn sample_config() -> &'static str {
    r#"# gpxload Configuration File
# GPX track manifest loader

# Runtime environment (development | production)
# production requires an https download.base_url
environment = "development"

[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# Dry run mode (parse, download and report rows without writing them)
dry_run = false

[sources]
# Directory scanned for manifest files
manifest_dir = "data-sources/csv"

# Manifest file extension, without the dot
manifest_extension = "csv"

# Directory track files are downloaded to and read from
install_dir = "data-sources/gpx"

[download]
# Fetch referenced track files from <base_url>/<file name> before persisting
enabled = false
base_url = "https://tracks.example.com/gpx"

# Records per batch and concurrent requests within a batch
batch_size = 500
max_concurrency = 64

# Per-request timeout
request_timeout_seconds = 60

[persist]
enabled = true

# Records per batch and concurrent row preparations within a batch
batch_size = 1500
max_concurrency = 64

# Deadline for each bulk insert
insert_timeout_seconds = 600

# Attempts with fresh identifiers after a primary-key collision
max_id_retries = 5

# Store one file row per manifest
persist_manifests = true

[postgresql]
host = "localhost"
port = 5432
username = "gpxload"
password = "${GPXLOAD_PG_PASSWORD}"
# password_file = "/run/secrets/gpxload_pg_password"
database_name = "gpxload"
max_connections = 20
connection_timeout_seconds = 30

# disable | prefer
ssl_mode = "prefer"

[logging]
local_enabled = true
local_path = "logs"
local_rotation = "daily"
local_max_size_mb = 100
"#
}
