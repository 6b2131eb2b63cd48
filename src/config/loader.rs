//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::IngestConfig;
use super::secret::{read_secret_file, secret_string};
use crate::domain::errors::IngestError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the TOML into [`IngestConfig`]
/// 4. Applies environment variable overrides (`GPXLOAD_*` prefix)
/// 5. Reads the database password from `password_file` if one is configured
/// 6. Validates the configuration
///
/// # Errors
///
/// Returns [`IngestError::Configuration`] if any step fails.
///
/// # Examples
///
/// ```no_run
/// use gpxload::config::loader::load_config;
///
/// let config = load_config("gpxload.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<IngestConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(IngestError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        IngestError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: IngestConfig = toml::from_str(&contents)
        .map_err(|e| IngestError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config);
    resolve_secret_files(&mut config)?;

    config.validate().map_err(|e| {
        IngestError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("placeholder pattern is a valid regex")
    })
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are copied untouched. Every missing variable is reported
/// in a single error.
fn substitute_env_vars(input: &str) -> Result<String> {
    let pattern = placeholder_pattern();
    let mut missing_vars: Vec<String> = Vec::new();
    let mut lines = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let replaced = pattern.replace_all(line, |caps: &regex::Captures<'_>| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    caps[0].to_string()
                }
            }
        });
        lines.push(replaced.into_owned());
    }

    if !missing_vars.is_empty() {
        return Err(IngestError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn env_flag(name: &str, current: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(current)
}

fn env_number<T: std::str::FromStr>(name: &str, current: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(current)
}

/// Applies environment variable overrides using the `GPXLOAD_` prefix
///
/// Variables follow the pattern `GPXLOAD_<SECTION>_<KEY>`, for example
/// `GPXLOAD_DOWNLOAD_BASE_URL` or `GPXLOAD_PERSIST_BATCH_SIZE`. Unparseable
/// numeric or boolean values leave the file value in place.
fn apply_env_overrides(config: &mut IngestConfig) {
    if let Ok(val) = std::env::var("GPXLOAD_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    config.application.dry_run = env_flag("GPXLOAD_APPLICATION_DRY_RUN", config.application.dry_run);

    if let Ok(val) = std::env::var("GPXLOAD_SOURCES_MANIFEST_DIR") {
        config.sources.manifest_dir = val;
    }
    if let Ok(val) = std::env::var("GPXLOAD_SOURCES_INSTALL_DIR") {
        config.sources.install_dir = val;
    }

    config.download.enabled = env_flag("GPXLOAD_DOWNLOAD_ENABLED", config.download.enabled);
    if let Ok(val) = std::env::var("GPXLOAD_DOWNLOAD_BASE_URL") {
        config.download.base_url = val;
    }
    config.download.batch_size =
        env_number("GPXLOAD_DOWNLOAD_BATCH_SIZE", config.download.batch_size);
    config.download.max_concurrency =
        env_number("GPXLOAD_DOWNLOAD_MAX_CONCURRENCY", config.download.max_concurrency);

    config.persist.enabled = env_flag("GPXLOAD_PERSIST_ENABLED", config.persist.enabled);
    config.persist.batch_size = env_number("GPXLOAD_PERSIST_BATCH_SIZE", config.persist.batch_size);
    config.persist.max_concurrency =
        env_number("GPXLOAD_PERSIST_MAX_CONCURRENCY", config.persist.max_concurrency);
    config.persist.max_id_retries =
        env_number("GPXLOAD_PERSIST_MAX_ID_RETRIES", config.persist.max_id_retries);

    if let Some(ref mut pg) = config.postgresql {
        if let Ok(val) = std::env::var("GPXLOAD_POSTGRESQL_HOST") {
            pg.host = val;
        }
        if let Ok(val) = std::env::var("GPXLOAD_POSTGRESQL_PORT") {
            pg.port = val;
        }
        if let Ok(val) = std::env::var("GPXLOAD_POSTGRESQL_USERNAME") {
            pg.username = val;
        }
        if let Ok(val) = std::env::var("GPXLOAD_POSTGRESQL_PASSWORD") {
            pg.password = Some(secret_string(val));
        }
        if let Ok(val) = std::env::var("GPXLOAD_POSTGRESQL_PASSWORD_FILE") {
            pg.password_file = Some(val);
        }
        if let Ok(val) = std::env::var("GPXLOAD_POSTGRESQL_DATABASE_NAME") {
            pg.database_name = val;
        }
    }

    config.logging.local_enabled =
        env_flag("GPXLOAD_LOGGING_LOCAL_ENABLED", config.logging.local_enabled);
    if let Ok(val) = std::env::var("GPXLOAD_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}

/// Reads `postgresql.password_file` when no inline password is set
fn resolve_secret_files(config: &mut IngestConfig) -> Result<()> {
    let Some(ref mut pg) = config.postgresql else {
        return Ok(());
    };

    if pg.password.is_some() {
        return Ok(());
    }

    if let Some(ref password_file) = pg.password_file {
        let secret = read_secret_file(password_file).map_err(|e| {
            IngestError::Configuration(format!(
                "Failed to read postgresql.password_file {password_file}: {e}"
            ))
        })?;
        pg.password = Some(secret);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("GPXLOAD_LOADER_TEST_VAR", "test_value");
        let input = "password = \"${GPXLOAD_LOADER_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "password = \"test_value\"");
        std::env::remove_var("GPXLOAD_LOADER_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("GPXLOAD_LOADER_MISSING_VAR");
        let input = "password = \"${GPXLOAD_LOADER_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("GPXLOAD_LOADER_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_env_vars_skips_comments() {
        let input = "# password = \"${GPXLOAD_LOADER_COMMENTED}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(matches!(result, Err(IngestError::Configuration(_))));
    }

    #[test]
    fn test_load_config_reads_password_file() {
        let mut secret = NamedTempFile::new().unwrap();
        secret.write_all(b"from-file\n").unwrap();
        secret.flush().unwrap();

        let toml_content = format!(
            r#"
[sources]
manifest_dir = "manifests"
install_dir = "tracks"

[postgresql]
host = "db.internal"
port = 5433
username = "loader"
password_file = "{}"
database_name = "tracks"
"#,
            secret.path().display()
        );

        let mut config_file = NamedTempFile::new().unwrap();
        config_file.write_all(toml_content.as_bytes()).unwrap();
        config_file.flush().unwrap();

        let config = load_config(config_file.path()).unwrap();
        let pg = config.postgresql.unwrap();
        assert_eq!(pg.port, "5433");
        assert_eq!(pg.password.unwrap().expose_secret().as_ref(), "from-file");
    }
}
