//! Topic-shape classification of inbound broker messages
//!
//! ```text
//! <root>/+/cmd/response      -> CommandResponse (dropped if undecodable)
//! <root>/<dev>/alarm/<act>   -> AlarmEvent (never dropped, falls back to raw)
//! <root>/<dev>/<other>/...   -> dropped
//! <root>/<dev>/<x>           -> dropped
//! ```

use crate::protocol::{
    now_millis, AlarmEvent, AlarmState, CommandResponse, MessageCodec, TopicAddress,
    TopicBuilder, TopicShapeError,
};
use std::fmt;
use tracing::{debug, warn};

/// Result of routing one message
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Alarm(AlarmEvent),
    CommandResponse(CommandResponse),
    Dropped(DropReason),
}

/// Why a message produced no domain event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Topic is outside the configured root
    UnrelatedTopic,
    /// Fewer than four topic levels
    TooFewSegments(usize),
    /// Device-scoped but the category is not `alarm`
    NotAlarmCategory(String),
    /// Command response payload failed to decode
    UndecodableResponse(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::UnrelatedTopic => write!(f, "topic outside configured root"),
            DropReason::TooFewSegments(found) => {
                write!(f, "expected at least 4 topic segments, found {found}")
            }
            DropReason::NotAlarmCategory(category) => {
                write!(f, "unhandled topic category '{category}'")
            }
            DropReason::UndecodableResponse(reason) => {
                write!(f, "malformed command response: {reason}")
            }
        }
    }
}

/// Classifies inbound messages and decodes them into domain events
#[derive(Debug, Clone, Default)]
pub struct TopicRouter {
    topics: TopicBuilder,
}

impl TopicRouter {
    pub fn new(topics: TopicBuilder) -> Self {
        Self { topics }
    }

    pub fn topics(&self) -> &TopicBuilder {
        &self.topics
    }

    /// Route one message. Pure apart from logging and reading the clock.
    pub fn route(&self, topic: &str, payload: &[u8]) -> RouteOutcome {
        if self.topics.is_command_response(topic) {
            return self.route_command_response(topic, payload);
        }

        let address = match TopicAddress::parse(topic) {
            Ok(address) => address,
            Err(TopicShapeError::TooFewSegments { found, .. }) => {
                debug!(target: "mqtt_transport", topic, found, "Dropping message with short topic");
                return RouteOutcome::Dropped(DropReason::TooFewSegments(found));
            }
        };

        if address.root != self.topics.root() {
            debug!(target: "mqtt_transport", topic, "Dropping message outside topic root");
            return RouteOutcome::Dropped(DropReason::UnrelatedTopic);
        }

        if !address.is_alarm() {
            debug!(
                target: "mqtt_transport",
                topic,
                category = %address.category,
                "Dropping non-alarm message"
            );
            return RouteOutcome::Dropped(DropReason::NotAlarmCategory(address.category));
        }

        RouteOutcome::Alarm(Self::build_alarm_event(&address, payload))
    }

    fn route_command_response(&self, topic: &str, payload: &[u8]) -> RouteOutcome {
        match MessageCodec::decode_command_response(payload) {
            Ok(mut response) => {
                response.device = topic.split('/').nth(1).map(str::to_string);
                debug!(
                    target: "mqtt_transport",
                    topic,
                    command = %response.command,
                    status = %response.status,
                    "Command response received"
                );
                RouteOutcome::CommandResponse(response)
            }
            Err(e) => {
                warn!(topic, error = %e, "Dropping malformed command response");
                RouteOutcome::Dropped(DropReason::UndecodableResponse(e.to_string()))
            }
        }
    }

    /// The topic action always wins over any `state` in the body, including
    /// when the payload is not valid UTF-8 or not a JSON object.
    fn build_alarm_event(address: &TopicAddress, payload: &[u8]) -> AlarmEvent {
        let text = String::from_utf8_lossy(payload);

        match MessageCodec::decode_alarm_body(&text) {
            Ok(body) => AlarmEvent {
                triggered_by: body.triggered_by,
                timestamp: body.timestamp.unwrap_or_else(now_millis),
                state: AlarmState::from_action(&address.action),
                action: address.action.clone(),
                raw_message: body.message,
                device: Some(address.device.clone()),
            },
            Err(e) => {
                debug!(
                    device = %address.device,
                    error = %e,
                    "Alarm payload is not structured, keeping raw text"
                );
                AlarmEvent::from_raw(&address.device, &address.action, &text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> TopicRouter {
        TopicRouter::new(TopicBuilder::new("root"))
    }

    #[test]
    fn test_structured_alarm_action_overrides_body_state() {
        let outcome = router().route(
            "root/pico_w_1/alarm/triggered",
            br#"{"triggered_by":"pico_w_1","timestamp":1000,"state":"armed"}"#,
        );

        let RouteOutcome::Alarm(event) = outcome else {
            panic!("expected alarm");
        };
        assert_eq!(event.state, AlarmState::Triggered);
        assert_eq!(event.triggered_by.as_deref(), Some("pico_w_1"));
        assert_eq!(event.timestamp, 1000);
        assert_eq!(event.device.as_deref(), Some("pico_w_1"));
        assert!(event.raw_message.is_none());
    }

    #[test]
    fn test_unstructured_alarm_keeps_raw_payload() {
        let outcome = router().route("root/pico_w_1/alarm/triggered", b"not-json");

        let RouteOutcome::Alarm(event) = outcome else {
            panic!("expected alarm");
        };
        assert_eq!(event.state, AlarmState::Triggered);
        assert_eq!(event.raw_message.as_deref(), Some("not-json"));
        assert!(event.triggered_by.is_none());
    }

    #[test]
    fn test_body_message_becomes_raw_message() {
        let outcome = router().route(
            "root/pico_w_1/alarm/armed",
            br#"{"message":"System armed by keypad"}"#,
        );
        let RouteOutcome::Alarm(event) = outcome else {
            panic!("expected alarm");
        };
        assert_eq!(event.state, AlarmState::Armed);
        assert_eq!(event.raw_message.as_deref(), Some("System armed by keypad"));
    }

    #[test]
    fn test_unknown_action_keeps_raw_action() {
        let outcome = router().route("root/pico_w_1/alarm/tamper", b"{}");
        let RouteOutcome::Alarm(event) = outcome else {
            panic!("expected alarm");
        };
        assert_eq!(event.state, AlarmState::Unknown);
        assert_eq!(event.action, "tamper");
    }

    #[test]
    fn test_non_utf8_alarm_keeps_topic_action() {
        let outcome = router().route("root/pico_w_1/alarm/triggered", &[0x80, b'P', b'I', b'R']);
        let RouteOutcome::Alarm(event) = outcome else {
            panic!("expected alarm");
        };
        assert_eq!(event.state, AlarmState::Triggered);
        assert_eq!(event.action, "triggered");
        assert_eq!(event.raw_message.as_deref(), Some("\u{FFFD}PIR"));
        assert_eq!(event.device.as_deref(), Some("pico_w_1"));
    }

    #[test]
    fn test_array_alarm_payload_keeps_raw_text() {
        let payload = r#"["intruder", 5]"#;
        let outcome = router().route("root/pico_w_1/alarm/triggered", payload.as_bytes());
        let RouteOutcome::Alarm(event) = outcome else {
            panic!("expected alarm");
        };
        assert_eq!(event.state, AlarmState::Triggered);
        assert_eq!(event.raw_message.as_deref(), Some(payload));
        assert!(event.triggered_by.is_none());
        assert_ne!(event.timestamp, 5);
    }

    #[test]
    fn test_non_alarm_category_is_dropped() {
        assert_eq!(
            router().route("root/pico_w_1/status/ok", b"{}"),
            RouteOutcome::Dropped(DropReason::NotAlarmCategory("status".to_string()))
        );
    }

    #[test]
    fn test_short_topic_is_dropped() {
        assert_eq!(
            router().route("root/pico_w_1/alarm", b"{}"),
            RouteOutcome::Dropped(DropReason::TooFewSegments(3))
        );
    }

    #[test]
    fn test_foreign_root_is_dropped() {
        assert_eq!(
            router().route("elsewhere/pico_w_1/alarm/triggered", b"{}"),
            RouteOutcome::Dropped(DropReason::UnrelatedTopic)
        );
    }

    #[test]
    fn test_command_response_routed_with_device() {
        let outcome = router().route(
            "root/pico_w_1/cmd/response",
            br#"{"status":"success","message":"ok","command":"status","timestamp":5}"#,
        );
        let RouteOutcome::CommandResponse(response) = outcome else {
            panic!("expected command response");
        };
        assert_eq!(response.device.as_deref(), Some("pico_w_1"));
        assert_eq!(response.command, "status");
    }

    #[test]
    fn test_malformed_command_response_is_dropped() {
        let outcome = router().route("root/pico_w_1/cmd/response", b"{}");
        assert!(matches!(
            outcome,
            RouteOutcome::Dropped(DropReason::UndecodableResponse(_))
        ));
    }
}
