//! Configuration loader
//!
//! Loads pipeline configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Required:
//! - `TRACELANE_DB_PATH`: Database file path
//! - `TRACELANE_LISTEN_ADDR`: Ingest endpoint bind address
//!
//! Optional (defaults apply when unset):
//! - `TRACELANE_DB_POOL_SIZE`: Connection pool size
//! - `TRACELANE_ENCRYPTION_KEY`: Base64 AES-256 key shared with clients
//! - `TRACELANE_TICK_INTERVAL_MS`: Ingest tick period
//! - `TRACELANE_BATCH_SIZE`: Jobs processed per tick
//! - `TRACELANE_ANTI_STARVATION_ROUND_LENGTH`: Ticks per forced lane round
//! - `TRACELANE_MAX_BUFFER_SIZE`: Default per-indicator flush size
//! - `TRACELANE_FLUSH_INTERVAL_MS`: Default per-indicator flush period
//! - `TRACELANE_IMMEDIATE_INDICATORS`: Comma-separated indicator names
//! - `TRACELANE_ENDPOINT`: Client ingest URL
//! - `TRACELANE_DEBUG_MODE`: Log bundles instead of sending (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./tracelane.json` or `./tracelane.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracelane_domain::{PipelineConfig, Result, TracelaneError};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file. The
/// result is validated either way.
///
/// # Errors
/// Returns `TracelaneError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - A value fails validation
pub fn load() -> Result<PipelineConfig> {
    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)?
        }
    };
    config.validate()?;
    Ok(config)
}

/// Like [`load`], but falls back to defaults when no source exists at all.
///
/// A source that exists but is invalid is still an error.
pub fn load_or_default() -> Result<PipelineConfig> {
    if load_from_env().is_err() && probe_config_paths().is_none() {
        tracing::warn!("No configuration found; using defaults");
        let config = PipelineConfig::default();
        config.validate()?;
        return Ok(config);
    }
    load()
}

/// Load configuration from environment variables
///
/// The required variables must be present; optional ones override defaults.
/// See module documentation for the complete list.
///
/// # Errors
/// Returns `TracelaneError::Config` if required variables are missing
/// or any variable has an invalid value.
pub fn load_from_env() -> Result<PipelineConfig> {
    let mut config = PipelineConfig::default();

    config.database.path = env_var("TRACELANE_DB_PATH")?;
    config.server.listen_addr = env_var("TRACELANE_LISTEN_ADDR")?;

    if let Some(pool_size) = env_parse("TRACELANE_DB_POOL_SIZE")? {
        config.database.pool_size = pool_size;
    }
    config.server.encryption_key = std::env::var("TRACELANE_ENCRYPTION_KEY").ok();
    if let Some(tick) = env_parse("TRACELANE_TICK_INTERVAL_MS")? {
        config.server.tick_interval_ms = tick;
    }
    if let Some(batch_size) = env_parse("TRACELANE_BATCH_SIZE")? {
        config.server.batch_size = batch_size;
    }
    if let Some(round_length) = env_parse("TRACELANE_ANTI_STARVATION_ROUND_LENGTH")? {
        config.server.anti_starvation_round_length = round_length;
    }
    if let Some(max_buffer_size) = env_parse("TRACELANE_MAX_BUFFER_SIZE")? {
        config.server.default_buffer.max_buffer_size = max_buffer_size;
    }
    if let Some(flush_interval_ms) = env_parse("TRACELANE_FLUSH_INTERVAL_MS")? {
        config.server.default_buffer.flush_interval_ms = flush_interval_ms;
    }
    if let Ok(indicators) = std::env::var("TRACELANE_IMMEDIATE_INDICATORS") {
        config.server.immediate_indicators = indicators
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ToString::to_string)
            .collect();
    }
    if let Ok(endpoint) = std::env::var("TRACELANE_ENDPOINT") {
        config.client.endpoint = endpoint;
    }
    config.client.debug_mode = env_bool("TRACELANE_DEBUG_MODE", false);

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `TracelaneError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<PipelineConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(TracelaneError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            TracelaneError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| TracelaneError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<PipelineConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TracelaneError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TracelaneError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(TracelaneError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches for config files in the following locations (in order):
/// 1. Current working directory (`./config.{json,toml}`,
///    `./tracelane.{json,toml}`)
/// 2. Parent directories (up to 2 levels)
/// 3. Relative to executable location
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidate_paths(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidate_paths(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidate_paths(base: &Path) -> Vec<PathBuf> {
    vec![
        base.join("config.json"),
        base.join("config.toml"),
        base.join("tracelane.json"),
        base.join("tracelane.toml"),
        base.join("../config.json"),
        base.join("../config.toml"),
        base.join("../../config.json"),
        base.join("../../config.toml"),
    ]
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        TracelaneError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Parse an optional environment variable; set but unparsable is an error.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| TracelaneError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;
    use tempfile::TempDir;

    use super::*;

    const ENV_KEYS: [&str; 5] = [
        "TRACELANE_DB_PATH",
        "TRACELANE_LISTEN_ADDR",
        "TRACELANE_BATCH_SIZE",
        "TRACELANE_IMMEDIATE_INDICATORS",
        "TRACELANE_DEBUG_MODE",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_env_bool_parsing() {
        std::env::set_var("TRACELANE_TEST_BOOL_ON", "on");
        std::env::set_var("TRACELANE_TEST_BOOL_UPPER", "TRUE");
        std::env::set_var("TRACELANE_TEST_BOOL_OFF", "0");

        assert!(env_bool("TRACELANE_TEST_BOOL_ON", false));
        assert!(env_bool("TRACELANE_TEST_BOOL_UPPER", false));
        assert!(!env_bool("TRACELANE_TEST_BOOL_OFF", true));
        assert!(env_bool("TRACELANE_TEST_BOOL_MISSING", true));

        std::env::remove_var("TRACELANE_TEST_BOOL_ON");
        std::env::remove_var("TRACELANE_TEST_BOOL_UPPER");
        std::env::remove_var("TRACELANE_TEST_BOOL_OFF");
    }

    #[test]
    #[serial]
    fn test_load_from_env_overrides_defaults() {
        clear_env();
        std::env::set_var("TRACELANE_DB_PATH", "/tmp/tracelane-test.db");
        std::env::set_var("TRACELANE_LISTEN_ADDR", "0.0.0.0:9000");
        std::env::set_var("TRACELANE_BATCH_SIZE", "25");
        std::env::set_var("TRACELANE_IMMEDIATE_INDICATORS", "fsp, crash ,");
        std::env::set_var("TRACELANE_DEBUG_MODE", "yes");

        let config = load_from_env().expect("env config loads");
        assert_eq!(config.database.path, "/tmp/tracelane-test.db");
        assert_eq!(config.server.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.server.batch_size, 25);
        assert_eq!(config.server.immediate_indicators, vec!["fsp", "crash"]);
        assert!(config.client.debug_mode);
        assert_eq!(config.server.tick_interval_ms, 5_000);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_from_env_missing_var() {
        clear_env();
        let err = load_from_env().unwrap_err();
        assert!(matches!(err, TracelaneError::Config(_)));
    }

    #[test]
    #[serial]
    fn test_load_from_env_invalid_number() {
        clear_env();
        std::env::set_var("TRACELANE_DB_PATH", "/tmp/test.db");
        std::env::set_var("TRACELANE_LISTEN_ADDR", "127.0.0.1:0");
        std::env::set_var("TRACELANE_BATCH_SIZE", "lots");

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, TracelaneError::Config(msg) if msg.contains("TRACELANE_BATCH_SIZE")));

        clear_env();
    }

    #[test]
    fn test_load_from_file_toml() {
        let toml_content = r#"
[server]
batch_size = 10
anti_starvation_round_length = 3

[server.event_types.error]
max_buffer_size = 5
flush_interval_ms = 250

[database]
path = "ingest.db"
"#;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tracelane.toml");
        std::fs::File::create(&path).unwrap().write_all(toml_content.as_bytes()).unwrap();

        let config = load_from_file(Some(path)).expect("toml loads");
        assert_eq!(config.server.batch_size, 10);
        assert_eq!(config.server.anti_starvation_round_length, 3);
        assert_eq!(config.server.buffer_for("error").max_buffer_size, 5);
        assert_eq!(config.database.path, "ingest.db");
        assert_eq!(config.database.pool_size, 4);
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/config.json")));
        assert!(matches!(result, Err(TracelaneError::Config(_))));
    }

    #[test]
    fn test_parse_config_json() {
        let json_content = r#"{ "client": { "retry_cnt": 1 }, "server": { "batch_size": 7 } }"#;
        let config = parse_config(json_content, &PathBuf::from("test.json")).unwrap();
        assert_eq!(config.client.retry_cnt, 1);
        assert_eq!(config.server.batch_size, 7);
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", &PathBuf::from("test.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }
}
