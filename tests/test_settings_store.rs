//! File-backed settings store behaviour

use sensor_hub_client::config::ConfigError;
use sensor_hub_client::settings::{ConnectionSettings, FileSettingsStore, SettingsStore};
use tempfile::TempDir;

fn custom_settings() -> ConnectionSettings {
    ConnectionSettings {
        host: "broker.home.lan".to_string(),
        port: 1883,
        client_id: "kitchen_tablet".to_string(),
        username: Some("hub".to_string()),
        password: Some("hunter2".to_string()),
        use_secure_transport: false,
        connection_timeout_secs: 15,
        keep_alive_secs: 30,
    }
}

#[test]
fn test_missing_file_loads_defaults() {
    let dir = TempDir::new().unwrap();
    let store = FileSettingsStore::new(dir.path().join("settings.toml"));

    assert_eq!(store.load().unwrap(), ConnectionSettings::default());
    assert!(!store.path().exists());
}

#[test]
fn test_saved_settings_survive_a_new_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("settings.toml");

    FileSettingsStore::new(&path).save(&custom_settings()).unwrap();

    let reopened = FileSettingsStore::new(&path);
    assert_eq!(reopened.load().unwrap(), custom_settings());
}

#[test]
fn test_save_replaces_wholesale() {
    let dir = TempDir::new().unwrap();
    let store = FileSettingsStore::new(dir.path().join("settings.toml"));

    store.save(&custom_settings()).unwrap();
    let without_credentials = ConnectionSettings {
        username: None,
        password: None,
        ..custom_settings()
    };
    store.save(&without_credentials).unwrap();

    let loaded = store.load().unwrap();
    assert!(loaded.username.is_none());
    assert!(loaded.password.is_none());
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.toml");
    std::fs::write(&path, "host = \"10.0.0.5\"\nport = 1884\n").unwrap();

    let loaded = FileSettingsStore::new(&path).load().unwrap();
    assert_eq!(loaded.host, "10.0.0.5");
    assert_eq!(loaded.port, 1884);
    assert_eq!(loaded.client_id, ConnectionSettings::default().client_id);
    assert_eq!(loaded.keep_alive_secs, 20);
}

#[test]
fn test_reset_to_defaults_overwrites_file() {
    let dir = TempDir::new().unwrap();
    let store = FileSettingsStore::new(dir.path().join("settings.toml"));
    store.save(&custom_settings()).unwrap();

    let defaults = store.reset_to_defaults().unwrap();

    assert_eq!(defaults, ConnectionSettings::default());
    assert_eq!(store.load().unwrap(), ConnectionSettings::default());
}

#[test]
fn test_invalid_settings_are_not_written() {
    let dir = TempDir::new().unwrap();
    let store = FileSettingsStore::new(dir.path().join("settings.toml"));
    store.save(&custom_settings()).unwrap();

    let invalid = ConnectionSettings {
        host: "   ".to_string(),
        ..custom_settings()
    };
    assert!(matches!(
        store.save(&invalid),
        Err(ConfigError::InvalidSettings(_))
    ));
    assert_eq!(store.load().unwrap(), custom_settings());
}

#[test]
fn test_corrupt_file_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    assert!(matches!(
        FileSettingsStore::new(&path).load(),
        Err(ConfigError::TomlParse(_))
    ));
}

#[test]
fn test_keep_alive_too_large_for_connect_packet_is_not_written() {
    let dir = TempDir::new().unwrap();
    let store = FileSettingsStore::new(dir.path().join("settings.toml"));

    let oversized = ConnectionSettings {
        keep_alive_secs: 70_000,
        ..custom_settings()
    };
    assert!(matches!(
        store.save(&oversized),
        Err(ConfigError::InvalidSettings(_))
    ));
    assert!(!store.path().exists());
}
