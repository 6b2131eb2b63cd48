//! Migrate command implementation
//!
//! This module implements the `migrate` command, which applies the embedded
//! schema migrations to the configured PostgreSQL database.

use crate::adapters::postgresql::{PostgreSQLClient, MIGRATIONS};
use crate::config::load_config;
use clap::Args;

/// Arguments for the migrate command
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// List the embedded migrations without connecting
    #[arg(long)]
    pub list: bool,
}

impl MigrateArgs {
    /// Execute the migrate command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        if self.list {
            println!("Embedded migrations:");
            for (name, _) in MIGRATIONS {
                println!("  - {name}");
            }
            return Ok(0);
        }

        tracing::info!(config_path = %config_path, "Running schema migrations");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        let Some(pg_config) = config.postgresql.as_ref() else {
            eprintln!("The [postgresql] section is required to run migrations");
            return Ok(2);
        };

        let client = match PostgreSQLClient::new(pg_config) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create PostgreSQL client");
                eprintln!("Failed to create database client: {e}");
                return Ok(4);
            }
        };

        if let Err(e) = client.test_connection().await {
            tracing::error!(error = %e, "Database connection failed");
            eprintln!("Failed to connect to {}: {e}", client.target());
            return Ok(4);
        }

        match client.run_migrations().await {
            Ok(applied) => {
                println!("✅ Schema is up to date on {}", client.target());
                for name in applied {
                    println!("  - {name}");
                }
                Ok(0)
            }
            Err(e) => {
                tracing::error!(error = %e, "Migration failed");
                eprintln!("Migration failed: {e}");
                Ok(5)
            }
        }
    }
}
