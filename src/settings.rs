//! Persisted broker connection settings
//!
//! [`ConnectionSettings`] is an immutable value that is replaced wholesale on
//! save. The Connection Manager re-reads it from a [`SettingsStore`] on every
//! connect attempt, so a saved change is picked up by the next reconnect even
//! without an explicit `update_settings` call.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Recommended bounds; values outside are accepted with a warning
pub const CONNECTION_TIMEOUT_RANGE: (u64, u64) = (5, 60);
pub const KEEP_ALIVE_RANGE: (u64, u64) = (10, 300);

/// Broker connection parameters edited by the user
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_secure_transport: bool,
    pub connection_timeout_secs: u64,
    pub keep_alive_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "192.168.1.100".to_string(),
            port: 8883,
            client_id: "android_home_security".to_string(),
            username: None,
            password: None,
            use_secure_transport: true,
            connection_timeout_secs: 10,
            keep_alive_secs: 20,
        }
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("use_secure_transport", &self.use_secure_transport)
            .field("connection_timeout_secs", &self.connection_timeout_secs)
            .field("keep_alive_secs", &self.keep_alive_secs)
            .finish()
    }
}

impl ConnectionSettings {
    /// Reject values the transport cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidSettings(
                "host must not be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidSettings(
                "port must be in 1..=65535".to_string(),
            ));
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::InvalidSettings(
                "client_id must not be empty".to_string(),
            ));
        }
        if self.connection_timeout_secs == 0 {
            return Err(ConfigError::InvalidSettings(
                "connection_timeout_secs must be greater than 0".to_string(),
            ));
        }
        // The CONNECT packet carries keep-alive as a u16
        if self.keep_alive_secs > u64::from(u16::MAX) {
            return Err(ConfigError::InvalidSettings(format!(
                "keep_alive_secs must be at most {}",
                u16::MAX
            )));
        }

        self.warn_outside_recommended_bounds();
        Ok(())
    }

    fn warn_outside_recommended_bounds(&self) {
        let (min_timeout, max_timeout) = CONNECTION_TIMEOUT_RANGE;
        if !(min_timeout..=max_timeout).contains(&self.connection_timeout_secs) {
            warn!(
                connection_timeout_secs = self.connection_timeout_secs,
                "Connection timeout outside recommended range {}-{}s", min_timeout, max_timeout
            );
        }
        let (min_keep_alive, max_keep_alive) = KEEP_ALIVE_RANGE;
        if !(min_keep_alive..=max_keep_alive).contains(&self.keep_alive_secs) {
            warn!(
                keep_alive_secs = self.keep_alive_secs,
                "Keep-alive outside recommended range {}-{}s", min_keep_alive, max_keep_alive
            );
        }
    }

    /// `ssl://host:port` or `tcp://host:port`
    pub fn broker_url(&self) -> String {
        let scheme = if self.use_secure_transport { "ssl" } else { "tcp" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// Username/password pair, `None` when no username is configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match self.username.as_deref() {
            Some(username) if !username.is_empty() => {
                Some((username, self.password.as_deref().unwrap_or_default()))
            }
            _ => None,
        }
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

/// Durable key/value record of [`ConnectionSettings`]
pub trait SettingsStore: Send + Sync {
    /// Current settings; defaults when nothing has been saved yet
    fn load(&self) -> Result<ConnectionSettings, ConfigError>;

    /// Replace the stored settings wholesale
    fn save(&self, settings: &ConnectionSettings) -> Result<(), ConfigError>;

    fn reset_to_defaults(&self) -> Result<ConnectionSettings, ConfigError> {
        let defaults = ConnectionSettings::default();
        self.save(&defaults)?;
        Ok(defaults)
    }
}

/// TOML file backed settings store
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Result<ConnectionSettings, ConfigError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No saved settings, using defaults");
            return Ok(ConnectionSettings::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }

    fn save(&self, settings: &ConnectionSettings) -> Result<(), ConfigError> {
        settings.validate()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(settings)?;
        // Write-then-rename so a crash never leaves a half-written file
        let tmp_path = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.path)?;

        info!(
            path = %self.path.display(),
            broker = %settings.broker_url(),
            "Saved connection settings"
        );
        Ok(())
    }
}

/// In-memory settings store for embedding and tests
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Mutex<ConnectionSettings>,
}

impl MemorySettingsStore {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<ConnectionSettings, ConfigError> {
        let guard = self
            .settings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(guard.clone())
    }

    fn save(&self, settings: &ConnectionSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        let mut guard = self
            .settings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = settings.clone();
        Ok(())
    }
}
