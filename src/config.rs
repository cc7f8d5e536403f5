//! Application configuration for the sensor hub client
//!
//! The TOML file describes the parts of the deployment that do not change at
//! runtime: the topic namespace, where TLS material and persisted connection
//! settings live, and the optional device directory endpoint. Broker
//! host/port/credentials are *not* here; they are user-editable and live in
//! the [`crate::settings`] store so that edits take effect on the next
//! reconnect.

use crate::protocol::topics::{validate_topic_root, DEFAULT_TOPIC_ROOT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub hub: HubSection,
    /// TLS material locations (optional; without it secure connections use platform roots)
    pub tls: Option<TlsSection>,
    #[serde(default)]
    pub settings: SettingsSection,
    /// Device directory REST endpoint (optional)
    pub directory: Option<DirectorySection>,
}

/// Hub section - topic namespace and reconnection policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HubSection {
    /// First topic level shared by every sensor hub message
    #[serde(default = "default_topic_root")]
    pub topic_root: String,
    /// Value of the `source` field in outbound command payloads
    #[serde(default = "default_command_source")]
    pub command_source: String,
    /// Fixed delay before a reconnect attempt (default: 5 seconds)
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            topic_root: default_topic_root(),
            command_source: default_command_source(),
            reconnect_delay_secs: default_reconnect_delay(),
        }
    }
}

impl HubSection {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

fn default_topic_root() -> String {
    DEFAULT_TOPIC_ROOT.to_string()
}

fn default_command_source() -> String {
    "android_app".to_string()
}

fn default_reconnect_delay() -> u64 {
    5
}

/// TLS section - paths to PEM files, re-read on every connect attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TlsSection {
    /// Concatenated PEM CA certificates
    pub ca_bundle: PathBuf,
    /// Client certificate for mutual TLS
    pub client_cert: Option<PathBuf>,
    /// Client private key (PKCS#1 or PKCS#8 PEM)
    pub client_key: Option<PathBuf>,
}

/// Settings section - where the persisted connection settings live
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettingsSection {
    #[serde(default = "default_settings_path")]
    pub path: PathBuf,
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("settings.toml")
}

/// Device directory section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectorySection {
    /// Base URL of the REST API, e.g. `http://192.168.1.234:8081/api/`
    pub base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_directory_timeout")]
    pub timeout_secs: u64,
}

fn default_page_size() -> u32 {
    100
}

fn default_directory_timeout() -> u64 {
    10
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Invalid topic root: {0}")]
    InvalidTopicRoot(String),
    #[error("Invalid connection settings: {0}")]
    InvalidSettings(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AppConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_topic_root(&self.hub.topic_root)
            .map_err(|e| ConfigError::InvalidTopicRoot(e.to_string()))?;

        if self.hub.reconnect_delay_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "hub.reconnect_delay_secs must be greater than 0".to_string(),
            ));
        }

        if self.hub.command_source.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "hub.command_source must not be empty".to_string(),
            ));
        }

        if let Some(tls) = &self.tls {
            if tls.client_cert.is_some() != tls.client_key.is_some() {
                return Err(ConfigError::InvalidConfig(
                    "tls.client_cert and tls.client_key must be set together".to_string(),
                ));
            }
        }

        if let Some(directory) = &self.directory {
            if directory.base_url.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(
                    "directory.base_url must not be empty".to_string(),
                ));
            }
            if directory.page_size == 0 {
                return Err(ConfigError::InvalidConfig(
                    "directory.page_size must be greater than 0".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[hub]
topic_root = "sensor_hub"
command_source = "test_suite"
reconnect_delay_secs = 5

[settings]
path = "test-settings.toml"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[hub]
topic_root = "sensor_hub"
command_source = "android_app"
reconnect_delay_secs = 5

[tls]
ca_bundle = "certs/bundle.pem"
client_cert = "certs/client.crt"
client_key = "certs/client.key"

[settings]
path = "/var/lib/sensor-hub/settings.toml"

[directory]
base_url = "http://192.168.1.234:8081/api/"
page_size = 50
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.hub.topic_root, "sensor_hub");
        assert_eq!(config.hub.reconnect_delay(), Duration::from_secs(5));
        let tls = config.tls.unwrap();
        assert_eq!(tls.ca_bundle, PathBuf::from("certs/bundle.pem"));
        assert_eq!(tls.client_key, Some(PathBuf::from("certs/client.key")));
        let directory = config.directory.unwrap();
        assert_eq!(directory.page_size, 50);
        assert_eq!(directory.timeout_secs, 10);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.hub.topic_root, DEFAULT_TOPIC_ROOT);
        assert_eq!(config.hub.command_source, "android_app");
        assert_eq!(config.hub.reconnect_delay_secs, 5);
        assert_eq!(config.settings.path, PathBuf::from("settings.toml"));
        assert!(config.tls.is_none());
        assert!(config.directory.is_none());
    }

    #[test]
    fn test_invalid_topic_root() {
        let mut config = AppConfig::test_config();
        config.hub.topic_root = "sensor/hub".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTopicRoot(_))
        ));

        config.hub.topic_root = "+".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_reconnect_delay_rejected() {
        let mut config = AppConfig::test_config();
        config.hub.reconnect_delay_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_client_identity_must_be_complete() {
        let mut config = AppConfig::test_config();
        config.tls = Some(TlsSection {
            ca_bundle: PathBuf::from("ca.pem"),
            client_cert: Some(PathBuf::from("client.crt")),
            client_key: None,
        });
        assert!(config.validate().is_err());

        config.tls = Some(TlsSection {
            ca_bundle: PathBuf::from("ca.pem"),
            client_cert: None,
            client_key: None,
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_directory_page_size_validation() {
        let mut config = AppConfig::test_config();
        config.directory = Some(DirectorySection {
            base_url: "http://localhost/api/".to_string(),
            page_size: 0,
            timeout_secs: 10,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::InvalidSettings("port must be greater than 0".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid connection settings: port must be greater than 0"
        );
    }
}
