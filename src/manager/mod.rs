//! Connection Manager
//!
//! ```text
//!            start()                 ConnAck + subscribed
//! Disconnected ------> Connecting ------------------------> Connected
//!      ^                   |                                   |
//!      |   connect failed  |          connection lost          |
//!      +-------------------+-----------------------------------+
//!      |        (reconnect after a fixed delay while running)
//!      +-- stop(): always, and no reconnect
//! ```

mod handle;
pub mod reconnect;
mod worker;

pub use handle::ConnectionManager;
pub use reconnect::ReconnectTimer;

use crate::config::{AppConfig, ConfigError};
use crate::protocol::TopicBuilder;
use crate::settings::ConnectionSettings;
use crate::tls::TlsMaterialSource;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Static manager configuration; broker settings come from the store
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub topics: TopicBuilder,
    /// `source` field of outbound commands
    pub command_source: String,
    pub reconnect_delay: Duration,
    /// Used when settings request secure transport; platform roots otherwise
    pub tls: Option<TlsMaterialSource>,
    /// Append a random suffix to the client id, for short-lived sessions that
    /// must not kick the long-running client off the broker
    pub unique_client_id: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            topics: TopicBuilder::default(),
            command_source: "android_app".to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            tls: None,
            unique_client_id: false,
        }
    }
}

impl ManagerConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            topics: TopicBuilder::new(config.hub.topic_root.clone()),
            command_source: config.hub.command_source.clone(),
            reconnect_delay: config.hub.reconnect_delay(),
            tls: config.tls.clone().map(TlsMaterialSource::Files),
            unique_client_id: false,
        }
    }

    pub(crate) fn client_id_for(&self, settings: &ConnectionSettings) -> String {
        if self.unique_client_id {
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            format!("{}-{}", settings.client_id, &suffix[..8])
        } else {
            settings.client_id.clone()
        }
    }
}

/// Outcome of [`ConnectionManager::update_settings`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsUpdate {
    /// Same as the active settings; nothing saved, no reconnect
    Unchanged,
    /// Saved; the manager is not running so nothing reconnects
    Saved,
    /// Saved and the running connection is being re-established
    Reconnecting,
}

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Connection manager has shut down")]
    Stopped,
    #[error(transparent)]
    Settings(#[from] ConfigError),
}
