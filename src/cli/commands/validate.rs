//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the gpxload configuration file.

use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates after substitution and overrides
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                println!();
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Environment: {:?}", config.environment);
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!(
            "  Manifests: {}/*.{}",
            config.sources.manifest_dir, config.sources.manifest_extension
        );
        println!("  Install Directory: {}", config.sources.install_dir);

        if config.download.enabled {
            println!("  Download: {}", config.download.base_url);
            println!(
                "  Download Batch Size: {} (concurrency {})",
                config.download.batch_size, config.download.max_concurrency
            );
        } else {
            println!("  Download: disabled");
        }

        if config.persist.enabled {
            println!(
                "  Persist Batch Size: {} (concurrency {})",
                config.persist.batch_size, config.persist.max_concurrency
            );
            if let Some(pg) = &config.postgresql {
                println!("  PostgreSQL: {}", pg.display_target());
                println!("  Max Connections: {}", pg.max_connections);
            }
        } else {
            println!("  Persist: disabled");
        }
        println!();

        Ok(0)
    }
}
