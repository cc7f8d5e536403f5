//! Public handle to the connection worker

use super::worker::{Command, ConnectionWorker};
use super::{ManagerConfig, ManagerError, SettingsUpdate};
use crate::broadcast::EventBroadcaster;
use crate::protocol::{validate_device_name, DeviceCommand, MessageCodec, TopicBuilder};
use crate::settings::{ConnectionSettings, SettingsStore};
use crate::transport::{BrokerTransport, ConnectionState, PublishError};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

/// Owns one broker connection through a background worker task.
///
/// Lifecycle methods (`start`, `stop`) enqueue and return immediately;
/// connect failures are never surfaced to the caller; they show up as
/// status notifications and a scheduled reconnect instead.
///
/// # Examples
/// ```rust,no_run
/// use std::sync::Arc;
/// use sensor_hub_client::broadcast::EventBroadcaster;
/// use sensor_hub_client::manager::{ConnectionManager, ManagerConfig};
/// use sensor_hub_client::presenter::LogPresenter;
/// use sensor_hub_client::settings::FileSettingsStore;
/// use sensor_hub_client::transport::mqtt::RumqttTransport;
///
/// # tokio_test::block_on(async {
/// let broadcaster = Arc::new(EventBroadcaster::new());
/// broadcaster.attach(Arc::new(LogPresenter));
///
/// let manager = ConnectionManager::new(
///     ManagerConfig::default(),
///     Arc::new(FileSettingsStore::new("settings.toml")),
///     Arc::new(RumqttTransport::new()),
///     broadcaster,
/// );
/// manager.start();
/// # manager.shutdown().await;
/// # });
/// ```
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    broadcaster: Arc<EventBroadcaster>,
    topics: TopicBuilder,
    command_source: String,
    worker: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Spawn the worker. Must be called inside a tokio runtime.
    pub fn new(
        config: ManagerConfig,
        store: Arc<dyn SettingsStore>,
        transport: Arc<dyn BrokerTransport>,
        broadcaster: Arc<EventBroadcaster>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let topics = config.topics.clone();
        let command_source = config.command_source.clone();

        let worker = ConnectionWorker::new(
            config,
            store,
            transport,
            Arc::clone(&broadcaster),
            command_rx,
            state_tx,
        );
        let handle = tokio::spawn(worker.run());

        Self {
            commands: command_tx,
            state_rx,
            broadcaster,
            topics,
            command_source,
            worker: std::sync::Mutex::new(Some(handle)),
        }
    }

    fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Connect and keep reconnecting until `stop`. Idempotent.
    pub fn start(&self) {
        if !self.send(Command::Start) {
            debug!("Start ignored, connection manager has shut down");
        }
    }

    /// Disconnect, cancel any pending reconnect and stay disconnected
    pub fn stop(&self) {
        if !self.send(Command::Stop) {
            debug!("Stop ignored, connection manager has shut down");
        }
    }

    /// Persist `settings` and reconnect if they differ from the active ones
    pub async fn update_settings(
        &self,
        settings: ConnectionSettings,
    ) -> Result<SettingsUpdate, ManagerError> {
        let (reply, response) = oneshot::channel();
        if !self.send(Command::UpdateSettings { settings, reply }) {
            return Err(ManagerError::Stopped);
        }
        response.await.map_err(|_| ManagerError::Stopped)?
    }

    /// Publish at QoS 1; fails immediately unless connected
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let (reply, response) = oneshot::channel();
        let command = Command::Publish {
            topic: topic.to_string(),
            payload,
            reply,
        };
        if !self.send(command) {
            return Err(PublishError::ManagerStopped);
        }
        response.await.map_err(|_| PublishError::ManagerStopped)?
    }

    /// Encode and publish a command to `<root>/<device>/cmd`
    pub async fn publish_command(
        &self,
        device: &str,
        command: DeviceCommand,
    ) -> Result<(), PublishError> {
        validate_device_name(device)
            .map_err(|e| PublishError::InvalidDevice(format!("'{device}': {e}")))?;
        let payload = MessageCodec::encode_command(command, &self.command_source)
            .map_err(PublishError::Serialization)?;
        self.publish(&self.topics.command_topic(device), payload)
            .await
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Watch every state transition
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Settings used by the most recent connect attempt
    pub async fn active_settings(&self) -> Option<ConnectionSettings> {
        let (reply, response) = oneshot::channel();
        if !self.send(Command::ActiveSettings { reply }) {
            return None;
        }
        response.await.ok().flatten()
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    pub fn topics(&self) -> &TopicBuilder {
        &self.topics
    }

    /// Stop and wait for the worker task to exit
    pub async fn shutdown(&self) {
        let (reply, response) = oneshot::channel();
        if self.send(Command::Shutdown { reply }) {
            let _ = response.await;
        }

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                debug!(error = %e, "Connection worker ended abnormally");
            }
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("topic_root", &self.topics.root())
            .finish_non_exhaustive()
    }
}
