//! Integration tests for logging initialization
//!
//! The global subscriber can only be installed once per process, so only
//! one test here initializes it successfully.

use tempfile::TempDir;
use tradex::config::LoggingConfig;
use tradex::logging::init_logging;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(config.local_enabled);
    assert_eq!(config.local_path, "logs");
    assert_eq!(config.local_rotation, "daily");
}

#[test]
fn test_invalid_level_is_rejected_before_install() {
    let config = LoggingConfig {
        local_enabled: false,
        ..LoggingConfig::default()
    };
    assert!(init_logging("verbose", &config).is_err());
}

#[test]
fn test_file_logging_writes_json() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "never".to_string(),
    };

    let guard = init_logging("info", &config).unwrap();
    assert!(log_path.is_dir());

    tracing::info!(target: "tradex", combination = "HS:01 | JAN24", "Combination finished");
    drop(guard);

    let content = std::fs::read_to_string(log_path.join("tradex.log")).unwrap();
    let line = content.lines().last().unwrap();
    let value: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(value["fields"]["message"], "Combination finished");
    assert_eq!(value["fields"]["combination"], "HS:01 | JAN24");
}
