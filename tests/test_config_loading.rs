//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation, and error handling.
//! We test observable outcomes, not implementation details of TOML parsing.

use sensor_hub_client::config::{AppConfig, ConfigError};
use sensor_hub_client::manager::ManagerConfig;
use sensor_hub_client::tls::TlsMaterialSource;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
[hub]
topic_root = "home"
command_source = "cli"
reconnect_delay_secs = 3

[settings]
path = "/tmp/sensor-hub/settings.toml"
"#,
    );

    let config = AppConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.hub.topic_root, "home");
    assert_eq!(config.hub.command_source, "cli");
    assert_eq!(config.hub.reconnect_delay(), Duration::from_secs(3));
    assert_eq!(
        config.settings.path,
        PathBuf::from("/tmp/sensor-hub/settings.toml")
    );
}

#[test]
fn test_config_loads_with_optional_sections() {
    let temp_file = write_config(
        r#"
[tls]
ca_bundle = "certs/ca_bundle.pem"
client_cert = "certs/client.crt"
client_key = "certs/client.key"

[directory]
base_url = "http://192.168.1.234:8081/api/"
"#,
    );

    let config = AppConfig::load_from_file(temp_file.path()).unwrap();

    let tls = config.tls.as_ref().unwrap();
    assert_eq!(tls.client_cert, Some(PathBuf::from("certs/client.crt")));
    let directory = config.directory.as_ref().unwrap();
    assert_eq!(directory.page_size, 100);
    assert_eq!(directory.timeout_secs, 10);
}

#[test]
fn test_empty_file_uses_defaults() {
    let temp_file = write_config("");
    let config = AppConfig::load_from_file(temp_file.path()).unwrap();
    assert_eq!(config, AppConfig::default());
}

#[test]
fn test_config_returns_error_for_invalid_toml_syntax() {
    let temp_file = write_config("[hub\ntopic_root = ");
    let result = AppConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_returns_error_when_file_not_found() {
    let result = AppConfig::load_from_file(std::path::Path::new("/nonexistent/sensor-hub.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_config_rejects_wildcard_topic_root() {
    for root in ["sensor/hub", "#", "hub+", ""] {
        let temp_file = write_config(&format!("[hub]\ntopic_root = \"{root}\"\n"));
        let result = AppConfig::load_from_file(temp_file.path());
        assert!(
            matches!(result, Err(ConfigError::InvalidTopicRoot(_))),
            "root {root:?} should be rejected"
        );
    }
}

#[test]
fn test_config_rejects_half_client_identity() {
    let temp_file = write_config(
        r#"
[tls]
ca_bundle = "certs/ca_bundle.pem"
client_key = "certs/client.key"
"#,
    );
    let result = AppConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_config_rejects_zero_reconnect_delay() {
    let temp_file = write_config("[hub]\nreconnect_delay_secs = 0\n");
    let result = AppConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_config_round_trips_through_toml() {
    let temp_file = write_config(
        r#"
[hub]
topic_root = "home"

[directory]
base_url = "http://localhost:8081/api/"
page_size = 25
"#,
    );
    let config = AppConfig::load_from_file(temp_file.path()).unwrap();

    let rendered = toml::to_string_pretty(&config).unwrap();
    let reparsed: AppConfig = toml::from_str(&rendered).unwrap();
    assert_eq!(config, reparsed);
}

#[test]
fn test_manager_config_follows_app_config() {
    let temp_file = write_config(
        r#"
[hub]
topic_root = "home"
command_source = "cli"
reconnect_delay_secs = 9

[tls]
ca_bundle = "certs/ca_bundle.pem"
"#,
    );
    let config = AppConfig::load_from_file(temp_file.path()).unwrap();
    let manager_config = ManagerConfig::from_app_config(&config);

    assert_eq!(manager_config.topics.root(), "home");
    assert_eq!(manager_config.command_source, "cli");
    assert_eq!(manager_config.reconnect_delay, Duration::from_secs(9));
    assert!(!manager_config.unique_client_id);
    assert!(matches!(
        manager_config.tls,
        Some(TlsMaterialSource::Files(_))
    ));
}
