//! Sensor hub message types
//!
//! Inbound: [`AlarmEvent`] and [`CommandResponse`], built by the topic router
//! from broker messages and never mutated afterwards. Outbound:
//! [`CommandRequest`] carrying a [`DeviceCommand`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Alarm state as announced by the topic action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmState {
    Armed,
    Disarmed,
    Triggered,
    Unknown,
}

impl AlarmState {
    /// Map a topic action to a state; anything unrecognised is `Unknown`.
    pub fn from_action(action: &str) -> Self {
        match action {
            "armed" => AlarmState::Armed,
            "disarmed" => AlarmState::Disarmed,
            "triggered" => AlarmState::Triggered,
            _ => AlarmState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmState::Armed => "armed",
            AlarmState::Disarmed => "disarmed",
            AlarmState::Triggered => "triggered",
            AlarmState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alarm notification derived from one broker message
///
/// # Examples
/// ```
/// use sensor_hub_client::protocol::{AlarmEvent, AlarmState};
///
/// let event = AlarmEvent::from_raw("pico_w_1", "triggered", "motion in hallway");
/// assert_eq!(event.state, AlarmState::Triggered);
/// assert_eq!(event.raw_message.as_deref(), Some("motion in hallway"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmEvent {
    /// Sensor or device that caused the event, from the payload
    pub triggered_by: Option<String>,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub state: AlarmState,
    /// Action segment of the topic, verbatim
    pub action: String,
    /// Free-text message, or the raw payload when it could not be decoded
    pub raw_message: Option<String>,
    /// Device segment of the topic
    pub device: Option<String>,
}

impl AlarmEvent {
    /// Event for a payload that did not decode as a structured alarm body
    pub fn from_raw(device: &str, action: &str, raw_payload: &str) -> Self {
        Self {
            triggered_by: None,
            timestamp: now_millis(),
            state: AlarmState::from_action(action),
            action: action.to_string(),
            raw_message: Some(raw_payload.to_string()),
            device: Some(device.to_string()),
        }
    }

    /// Last-resort event when nothing about the message could be trusted
    pub fn generic(raw_payload: String) -> Self {
        Self {
            triggered_by: None,
            timestamp: now_millis(),
            state: AlarmState::Unknown,
            action: AlarmState::Unknown.as_str().to_string(),
            raw_message: Some(raw_payload),
            device: None,
        }
    }
}

/// Structured alarm payload; every field is optional on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmBody {
    #[serde(default)]
    pub triggered_by: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Device reply to a command, published on `<root>/<device>/cmd/response`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub status: String,
    pub message: String,
    pub command: String,
    pub timestamp: i64,
    /// Device segment of the topic; not part of the payload
    #[serde(skip)]
    pub device: Option<String>,
}

/// Commands a device accepts on `<root>/<device>/cmd`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceCommand {
    Arm,
    Disarm,
    Reset,
    Status,
}

impl DeviceCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceCommand::Arm => "arm",
            DeviceCommand::Disarm => "disarm",
            DeviceCommand::Reset => "reset",
            DeviceCommand::Status => "status",
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arm" => Ok(DeviceCommand::Arm),
            "disarm" => Ok(DeviceCommand::Disarm),
            "reset" => Ok(DeviceCommand::Reset),
            "status" => Ok(DeviceCommand::Status),
            other => Err(format!(
                "unknown command '{other}', expected one of arm, disarm, reset, status"
            )),
        }
    }
}

/// Outbound command payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: DeviceCommand,
    pub source: String,
}

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
