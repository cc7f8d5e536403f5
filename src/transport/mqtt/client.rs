//! rumqttc-backed broker transport
//!
//! `open` drives the eventloop until ConnAck (bounded by the connection
//! timeout), then hands the eventloop to a pump task that forwards inbound
//! messages and the first connection error as [`TransportEvent`]s. The pump
//! stops polling after that error, which disables rumqttc's implicit
//! reconnect: reconnection policy belongs to the connection manager.

use super::connection::{configure_mqtt_options, REQUEST_CHANNEL_CAPACITY};
use super::message_handler::{EventRoute, MessageHandler};
use crate::transport::{
    BrokerSession, BrokerTransport, ConnectError, ConnectParams, PublishError, SessionHandle,
    TransportEvent,
};
use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop, QoS};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long a graceful disconnect may take before the pump is aborted
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// Opens real broker sessions with rumqttc
#[derive(Debug, Default, Clone)]
pub struct RumqttTransport;

impl RumqttTransport {
    pub fn new() -> Self {
        Self
    }

    /// Poll until ConnAck; any eventloop error fails the attempt.
    async fn wait_for_connection_confirmation(
        event_loop: &mut EventLoop,
    ) -> Result<(), ConnectError> {
        loop {
            let event = event_loop
                .poll()
                .await
                .map_err(|e| ConnectError::Transport(e.to_string()))?;
            match MessageHandler::route_mqtt_event(&event) {
                EventRoute::ConnectionAcknowledged => return Ok(()),
                other => {
                    debug!(target: "mqtt_transport", "Pre-ConnAck event: {:?}", other);
                }
            }
        }
    }
}

#[async_trait]
impl BrokerTransport for RumqttTransport {
    async fn open(&self, params: ConnectParams) -> Result<BrokerSession, ConnectError> {
        let mqtt_options = configure_mqtt_options(&params)?;
        let (client, mut event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);

        let timeout = params.settings.connection_timeout();
        tokio::time::timeout(
            timeout,
            Self::wait_for_connection_confirmation(&mut event_loop),
        )
        .await
        .map_err(|_| ConnectError::Timeout(timeout))??;

        info!(
            broker = %params.settings.broker_url(),
            client_id = %params.client_id,
            "Broker acknowledged connection"
        );

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pump = tokio::spawn(pump_events(event_loop, event_tx, shutdown_rx));

        Ok(BrokerSession {
            handle: Box::new(RumqttSession {
                client,
                shutdown_tx,
                pump: Mutex::new(Some(pump)),
            }),
            events: event_rx,
        })
    }
}

/// Forward eventloop output until shutdown, broker disconnect or error
async fn pump_events(
    mut event_loop: EventLoop,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!(target: "mqtt_transport", "Event pump shutting down");
                    break;
                }
            }

            event_result = event_loop.poll() => {
                let event = match event_result {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "MQTT connection lost");
                        let _ = event_tx.send(TransportEvent::ConnectionLost(e.to_string()));
                        break;
                    }
                };

                match MessageHandler::route_mqtt_event(&event) {
                    EventRoute::MessageReceived { topic, payload } => {
                        debug!(target: "mqtt_transport", topic = %topic, "Received MQTT message");
                        if event_tx
                            .send(TransportEvent::MessageArrived { topic, payload })
                            .is_err()
                        {
                            break;
                        }
                    }
                    EventRoute::Disconnected => {
                        warn!("Broker closed the session");
                        let _ = event_tx.send(TransportEvent::ConnectionLost(
                            "disconnected by broker".to_string(),
                        ));
                        break;
                    }
                    EventRoute::SubscriptionConfirmed { packet_id, rejected } => {
                        if rejected > 0 {
                            warn!(packet_id, rejected, "Broker rejected subscription filters");
                        } else {
                            debug!(target: "mqtt_transport", packet_id, "Subscription confirmed");
                        }
                    }
                    EventRoute::ConnectionAcknowledged => {
                        debug!(target: "mqtt_transport", "Unexpected repeated ConnAck");
                    }
                    EventRoute::InfrastructureEvent(event_str) => {
                        debug!(target: "mqtt_transport", "MQTT event: {}", event_str);
                    }
                    EventRoute::OutgoingEvent => {}
                }
            }
        }
    }
}

struct RumqttSession {
    client: AsyncClient,
    shutdown_tx: watch::Sender<bool>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl SessionHandle for RumqttSession {
    async fn subscribe(&self, filters: &[String]) -> Result<(), ConnectError> {
        for filter in filters {
            self.client
                .subscribe(filter.as_str(), QoS::AtLeastOnce)
                .await
                .map_err(|e| ConnectError::Subscribe {
                    filter: filter.clone(),
                    reason: e.to_string(),
                })?;
            debug!(target: "mqtt_transport", "Subscribed to: {}", filter);
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| PublishError::SendFailed(e.to_string()))
    }

    async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            debug!(target: "mqtt_transport", "Disconnect request not sent: {}", e);
        }

        // The pump must keep polling for the DISCONNECT packet to go out
        let pump = self.pump.lock().await.take();
        if let Some(mut handle) = pump {
            if tokio::time::timeout(DISCONNECT_GRACE, &mut handle)
                .await
                .is_err()
            {
                debug!(target: "mqtt_transport", "Event pump did not stop in time, aborting");
                let _ = self.shutdown_tx.send(true);
                handle.abort();
            }
        }
    }
}

impl Drop for RumqttSession {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
