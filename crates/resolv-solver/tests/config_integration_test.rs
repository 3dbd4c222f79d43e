/// Integration tests for the configuration system
///
/// These tests load configuration from files and override it through
/// `RESOLV_*` variables supplied to the loader.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use resolv_solver::config::{ChannelPriority, Config, ConfigError, ConfigLoader, ConfigSource, SslVerify};
use resolv_solver::{HttpClient, HttpClientConfig};
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("resolv.json");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{
            "channels": ["main", "forge"],
            "channel_priority": "strict",
            "flags": {"force_reinstall": true},
            "solver": {"max_steps": 1000, "timeout_secs": 2},
            "network": {
                "proxy_servers": {"http": "http://proxy:3128", "https": "http://proxy:3129"},
                "ssl_verify": false,
                "user_agent": "resolv-test"
            }
        }"#,
    );

    let config = Config::load(&path).unwrap();
    assert_eq!(config.channels, vec!["main", "forge"]);
    assert_eq!(config.channel_priority, ChannelPriority::Strict);
    assert!(config.flags.force_reinstall);
    assert!(config.request_flags().strict_repo_priority);
    assert_eq!(config.solve_budget().timeout, Some(Duration::from_secs(2)));
    assert_eq!(config.network.ssl_verify, SslVerify::Bool(false));
    assert_eq!(config.get_source("channels"), Some(&ConfigSource::File(path.clone())));

    let client = HttpClient::from_network(&config.network).unwrap();
    assert_eq!(client.user_agent(), "resolv-test");
    assert_eq!(client.proxy_for("http://repo.example.com"), Some("http://proxy:3128"));
    assert_eq!(client.proxy_for("https://repo.example.com"), Some("http://proxy:3129"));
}

#[test]
fn test_environment_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"solver": {"max_steps": 1000}, "channels": ["main"]}"#);

    let loader = ConfigLoader::from_vars([
        ("RESOLV_MAX_STEPS", "50"),
        ("RESOLV_SSL_VERIFY", "/certs/ca.pem"),
    ]);
    let config = Config::build(Some(path.as_path()), &loader).unwrap();

    assert_eq!(config.solver.max_steps, 50);
    assert_eq!(config.channels, vec!["main"]);
    assert_eq!(
        config.network.ssl_verify,
        SslVerify::Path(PathBuf::from("/certs/ca.pem"))
    );
    assert_eq!(
        config.get_source("max-steps"),
        Some(&ConfigSource::Environment("RESOLV_MAX_STEPS".to_string()))
    );
    assert_eq!(config.get_source("channels"), Some(&ConfigSource::File(path)));
}

#[test]
fn test_environment_ignored_when_disabled() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"solver": {"max_steps": 1000}}"#);

    let config = Config::build(Some(path.as_path()), &ConfigLoader::new(false)).unwrap();
    assert_eq!(config.solver.max_steps, 1000);
}

#[test]
fn test_malformed_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "{ not json");

    let err = Config::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)));
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = Config::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_ca_bundle_from_config_must_exist() {
    let dir = TempDir::new().unwrap();
    let config = HttpClientConfig::new()
        .with_ssl_verify(SslVerify::Path(dir.path().join("missing.pem")));

    assert!(HttpClient::new(config).is_err());
}
