//! Configuration resolution and loading.

use std::path::Path;

use riskecho::{EngineConfig, Sector};
use riskecho_cli::config::{load_config, resolve_config_path_from};

#[test]
fn test_explicit_path_wins() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("config.json");
    std::fs::write(&local, "{}").unwrap();

    let resolved = resolve_config_path_from(Some("custom.json"), Some("env.json".into()), &local);
    assert_eq!(resolved.unwrap(), Path::new("custom.json"));
}

#[test]
fn test_env_path_before_local_file() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("config.json");
    std::fs::write(&local, "{}").unwrap();

    let resolved = resolve_config_path_from(None, Some("env.json".into()), &local);
    assert_eq!(resolved.unwrap(), Path::new("env.json"));

    let blank = resolve_config_path_from(None, Some("  ".into()), &local);
    assert_eq!(blank.unwrap(), local);
}

#[test]
fn test_missing_local_file_means_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("absent.json");
    assert!(resolve_config_path_from(None, None, &local).is_none());
}

#[test]
fn test_load_partial_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("riskecho.json");
    std::fs::write(
        &path,
        r#"{"window_capacity": 10, "aggregator": {"home_sector": "healthcare"}}"#,
    )
    .unwrap();

    let config = load_config(path.to_str()).unwrap();
    assert_eq!(config.window_capacity, 10);
    assert_eq!(config.aggregator.home_sector, Sector::Healthcare);
    assert_eq!(config.rules, EngineConfig::default().rules);
}

#[test]
fn test_invalid_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{"window_capacity": 0}"#).unwrap();
    assert!(load_config(path.to_str()).is_err());

    let missing = dir.path().join("missing.json");
    assert!(load_config(missing.to_str()).is_err());
}
