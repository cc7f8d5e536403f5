//! The connection worker task
//!
//! One worker per manager owns the session, the running flag, the active
//! settings and the reconnect timer. It multiplexes four inputs in a single
//! `select!` loop: handle commands, the in-flight connect attempt, events
//! from the live session, and the reconnect timer. Because only this task
//! touches the session, no locking is needed and a session released by
//! `stop` can never deliver a late connection-loss event.

use super::reconnect::ReconnectTimer;
use super::{ManagerConfig, ManagerError, SettingsUpdate};
use crate::broadcast::EventBroadcaster;
use crate::routing::{RouteOutcome, TopicRouter};
use crate::settings::{ConnectionSettings, SettingsStore};
use crate::transport::{
    BrokerSession, BrokerTransport, ConnectError, ConnectParams, ConnectionState, PublishError,
    SessionHandle, TransportEvent, TransportSecurity,
};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

/// Requests from [`super::ConnectionManager`] handles
#[derive(Debug)]
pub(crate) enum Command {
    Start,
    Stop,
    UpdateSettings {
        settings: ConnectionSettings,
        reply: oneshot::Sender<Result<SettingsUpdate, ManagerError>>,
    },
    Publish {
        topic: String,
        payload: Vec<u8>,
        reply: oneshot::Sender<Result<(), PublishError>>,
    },
    ActiveSettings {
        reply: oneshot::Sender<Option<ConnectionSettings>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

type ConnectAttempt = JoinHandle<Result<BrokerSession, ConnectError>>;

pub(crate) struct ConnectionWorker {
    config: ManagerConfig,
    store: Arc<dyn SettingsStore>,
    transport: Arc<dyn BrokerTransport>,
    broadcaster: Arc<EventBroadcaster>,
    router: TopicRouter,
    commands: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    running: bool,
    active_settings: Option<ConnectionSettings>,
    attempt: Option<ConnectAttempt>,
    session: Option<Box<dyn SessionHandle>>,
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    reconnect: ReconnectTimer,
}

impl ConnectionWorker {
    pub(crate) fn new(
        config: ManagerConfig,
        store: Arc<dyn SettingsStore>,
        transport: Arc<dyn BrokerTransport>,
        broadcaster: Arc<EventBroadcaster>,
        commands: mpsc::UnboundedReceiver<Command>,
        state_tx: watch::Sender<ConnectionState>,
    ) -> Self {
        let router = TopicRouter::new(config.topics.clone());
        let reconnect = ReconnectTimer::new(config.reconnect_delay);
        Self {
            config,
            store,
            transport,
            broadcaster,
            router,
            commands,
            state_tx,
            running: false,
            active_settings: None,
            attempt: None,
            session: None,
            events: None,
            reconnect,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("Connection worker started");

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        // Every handle is gone
                        self.stop().await;
                        break;
                    };
                    if !self.handle_command(command).await {
                        break;
                    }
                }

                result = poll_attempt(&mut self.attempt) => {
                    self.attempt = None;
                    self.on_attempt_finished(result).await;
                }

                event = recv_event(&mut self.events) => {
                    match event {
                        Some(TransportEvent::MessageArrived { topic, payload }) => {
                            self.on_message(&topic, &payload);
                        }
                        Some(TransportEvent::ConnectionLost(reason)) => {
                            self.on_connection_lost(&reason);
                        }
                        None => self.on_connection_lost("session event stream closed"),
                    }
                }

                () = self.reconnect.wait() => {
                    self.on_reconnect_timer();
                }
            }
        }

        debug!("Connection worker stopped");
    }

    /// Returns false when the worker should exit
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Start => self.start(),
            Command::Stop => self.stop().await,
            Command::UpdateSettings { settings, reply } => {
                let outcome = self.update_settings(settings).await;
                let _ = reply.send(outcome);
            }
            Command::Publish {
                topic,
                payload,
                reply,
            } => {
                let outcome = self.publish(&topic, payload).await;
                let _ = reply.send(outcome);
            }
            Command::ActiveSettings { reply } => {
                let _ = reply.send(self.active_settings.clone());
            }
            Command::Shutdown { reply } => {
                self.stop().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ConnectionState) -> ConnectionState {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Connection state changed");
        }
        previous
    }

    fn start(&mut self) {
        if self.running {
            debug!("Start requested while already running");
            return;
        }
        self.running = true;
        info!("Connection manager starting");
        self.begin_attempt();
    }

    async fn stop(&mut self) {
        self.running = false;
        self.reconnect.cancel();

        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }

        self.events = None;
        if let Some(session) = self.session.take() {
            session.disconnect().await;
        }

        if self.set_state(ConnectionState::Disconnected) != ConnectionState::Disconnected {
            info!("Connection manager stopped");
            self.broadcaster.notify_connection_status(false);
        }
    }

    async fn update_settings(
        &mut self,
        settings: ConnectionSettings,
    ) -> Result<SettingsUpdate, ManagerError> {
        if self.active_settings.as_ref() == Some(&settings) {
            debug!("Settings unchanged, keeping current connection");
            return Ok(SettingsUpdate::Unchanged);
        }

        self.store.save(&settings)?;

        if !self.running {
            return Ok(SettingsUpdate::Saved);
        }

        info!(broker = %settings.broker_url(), "Settings changed, reconnecting");
        self.stop().await;
        self.start();
        Ok(SettingsUpdate::Reconnecting)
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let state = self.state();
        let session = match (&self.session, state) {
            (Some(session), ConnectionState::Connected) => session,
            _ => {
                warn!(topic, %state, "Publish rejected, not connected");
                return Err(PublishError::NotConnected { state });
            }
        };

        session.publish(topic, payload).await.map_err(|e| {
            warn!(topic, error = %e, "Publish failed");
            e
        })
    }

    /// Read settings, build TLS, then connect in a separate task so the
    /// worker keeps serving commands during the handshake.
    fn begin_attempt(&mut self) {
        self.reconnect.cancel();
        self.set_state(ConnectionState::Connecting);

        let params = match self.prepare_params() {
            Ok(params) => params,
            Err(e) => {
                self.on_attempt_failed(&e);
                return;
            }
        };

        let span = crate::mqtt_span!(
            broker = %params.settings.broker_url(),
            client_id = %params.client_id
        );
        let transport = Arc::clone(&self.transport);
        let filters = self.config.topics.subscriptions();
        self.attempt = Some(tokio::spawn(
            connect_and_subscribe(transport, params, filters).instrument(span),
        ));
    }

    fn prepare_params(&mut self) -> Result<ConnectParams, ConnectError> {
        let settings = self
            .store
            .load()
            .map_err(|e| ConnectError::Settings(e.to_string()))?;
        self.active_settings = Some(settings.clone());
        settings
            .validate()
            .map_err(|e| ConnectError::Settings(e.to_string()))?;

        let security = if !settings.use_secure_transport {
            TransportSecurity::Plain
        } else {
            match &self.config.tls {
                Some(source) => TransportSecurity::Tls(source.build()?),
                None => TransportSecurity::PlatformRoots,
            }
        };

        let client_id = self.config.client_id_for(&settings);
        Ok(ConnectParams {
            settings,
            security,
            client_id,
        })
    }

    async fn on_attempt_finished(
        &mut self,
        result: Result<Result<BrokerSession, ConnectError>, tokio::task::JoinError>,
    ) {
        match result {
            Ok(Ok(session)) if self.running => {
                info!("Connected to broker");
                self.session = Some(session.handle);
                self.events = Some(session.events);
                self.set_state(ConnectionState::Connected);
                self.broadcaster.notify_connection_status(true);
            }
            Ok(Ok(session)) => session.handle.disconnect().await,
            Ok(Err(e)) => self.on_attempt_failed(&e),
            Err(join_error) if join_error.is_cancelled() => {}
            Err(join_error) => {
                error!(error = %join_error, "Connect attempt task failed");
                self.on_attempt_failed(&ConnectError::Transport(join_error.to_string()));
            }
        }
    }

    fn on_attempt_failed(&mut self, error: &ConnectError) {
        warn!(error = %error, "Connect attempt failed");
        self.set_state(ConnectionState::Disconnected);
        self.broadcaster.notify_connection_status(false);
        self.schedule_reconnect();
    }

    fn on_connection_lost(&mut self, reason: &str) {
        if self.session.is_none() {
            return;
        }
        warn!(reason, "Connection lost");
        self.session = None;
        self.events = None;
        self.set_state(ConnectionState::Disconnected);
        self.broadcaster.notify_connection_status(false);
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if !self.running {
            return;
        }
        if self.reconnect.schedule() {
            info!(
                delay_secs = self.reconnect.delay().as_secs(),
                "Reconnect scheduled"
            );
        }
    }

    fn on_reconnect_timer(&mut self) {
        if !self.running || self.session.is_some() || self.attempt.is_some() {
            return;
        }
        info!("Attempting reconnect");
        self.begin_attempt();
    }

    fn on_message(&self, topic: &str, payload: &Bytes) {
        match self.router.route(topic, payload) {
            RouteOutcome::Alarm(event) => {
                info!(
                    device = event.device.as_deref().unwrap_or("unknown"),
                    state = %event.state,
                    "Alarm event"
                );
                self.broadcaster.notify_alarm(&event);
            }
            RouteOutcome::CommandResponse(response) => {
                self.broadcaster.notify_command_response(&response);
            }
            RouteOutcome::Dropped(reason) => {
                debug!(target: "mqtt_transport", topic, %reason, "Message dropped");
            }
        }
    }
}

async fn connect_and_subscribe(
    transport: Arc<dyn BrokerTransport>,
    params: ConnectParams,
    filters: Vec<String>,
) -> Result<BrokerSession, ConnectError> {
    let session = transport.open(params).await?;
    if let Err(e) = session.handle.subscribe(&filters).await {
        session.handle.disconnect().await;
        return Err(e);
    }
    Ok(session)
}

async fn poll_attempt(
    attempt: &mut Option<ConnectAttempt>,
) -> Result<Result<BrokerSession, ConnectError>, tokio::task::JoinError> {
    match attempt {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn recv_event(
    events: &mut Option<mpsc::UnboundedReceiver<TransportEvent>>,
) -> Option<TransportEvent> {
    match events {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}
