//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;
use std::path::PathBuf;

use tempfile::TempDir;
use tracelane_domain::TracelaneError;
use tracelane_infra::config;

fn write_config(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("Failed to create config file");
    file.write_all(contents.as_bytes()).expect("Failed to write config file");
    path
}

#[test]
fn test_load_config_from_json_file() {
    let json_content = r#"{
        "client": {
            "endpoint": "https://collect.example.com/report",
            "max_concurrent_tasks": 2,
            "transport_delay_ms": 500
        },
        "server": {
            "tick_interval_ms": 1000,
            "immediate_indicators": ["first-screen-paint", "crash"],
            "event_types": {
                "error": { "max_buffer_size": 1, "flush_interval_ms": 100 }
            }
        },
        "database": {
            "path": "/tmp/integration_test.db",
            "pool_size": 8
        }
    }"#;

    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "config.json", json_content);

    let config = config::load_from_file(Some(path)).expect("Failed to load config from JSON file");

    assert_eq!(config.client.endpoint, "https://collect.example.com/report");
    assert_eq!(config.client.max_concurrent_tasks, 2);
    assert_eq!(config.client.transport_delay_ms, 500);
    // Unspecified fields keep their defaults.
    assert_eq!(config.client.retry_cnt, 3);
    assert_eq!(config.server.tick_interval_ms, 1000);
    assert_eq!(config.server.immediate_indicators, vec!["first-screen-paint", "crash"]);
    assert_eq!(config.server.buffer_for("error").max_buffer_size, 1);
    assert_eq!(config.server.buffer_for("unlisted"), config.server.default_buffer);
    assert_eq!(config.database.path, "/tmp/integration_test.db");
    assert_eq!(config.database.pool_size, 8);
    config.validate().expect("loaded config is valid");
}

#[test]
fn test_load_config_from_toml_file() {
    let toml_content = r#"
[client]
debug_mode = true
endpoint = ""

[server]
listen_addr = "0.0.0.0:9100"
encryption_key = "c2VjcmV0"
"#;

    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "tracelane.toml", toml_content);

    let config = config::load_from_file(Some(path)).expect("Failed to load config from TOML file");

    assert!(config.client.debug_mode);
    assert_eq!(config.server.listen_addr, "0.0.0.0:9100");
    assert_eq!(config.server.encryption_key.as_deref(), Some("c2VjcmV0"));
    // Debug mode tolerates a missing endpoint.
    config.validate().expect("debug config is valid");
}

#[test]
fn test_invalid_json_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "config.json", "{ \"server\": ");

    let err = config::load_from_file(Some(path)).unwrap_err();
    assert!(matches!(err, TracelaneError::Config(msg) if msg.contains("Invalid JSON")));
}

#[test]
fn test_zero_threshold_fails_validation() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "config.json",
        r#"{ "server": { "anti_starvation_round_length": 0 } }"#,
    );

    let config = config::load_from_file(Some(path)).expect("file parses");
    assert!(matches!(config.validate(), Err(TracelaneError::Config(_))));
}
