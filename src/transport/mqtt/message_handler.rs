//! Pure routing of rumqttc events
//!
//! Turns raw eventloop output into an [`EventRoute`] decision; the client
//! acts on the decision.

use bytes::Bytes;
use rumqttc::{Event, Packet, SubscribeReasonCode};

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// Broker accepted the connection
    ConnectionAcknowledged,
    /// Message received on a subscribed topic
    MessageReceived { topic: String, payload: Bytes },
    /// Broker closed the session
    Disconnected,
    /// SubAck; `rejected` counts filters the broker refused
    SubscriptionConfirmed { packet_id: u16, rejected: usize },
    /// PingResp, PubAck and friends
    InfrastructureEvent(String),
    /// Outgoing packets are handled by rumqttc
    OutgoingEvent,
}

pub struct MessageHandler;

impl MessageHandler {
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                Packet::Publish(publish) => EventRoute::MessageReceived {
                    topic: publish.topic.clone(),
                    payload: publish.payload.clone(),
                },
                Packet::Disconnect => EventRoute::Disconnected,
                Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                    packet_id: suback.pkid,
                    rejected: suback
                        .return_codes
                        .iter()
                        .filter(|code| matches!(code, SubscribeReasonCode::Failure))
                        .count(),
                },
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }
}
