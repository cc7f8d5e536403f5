//! Topic construction, wildcard matching and topic-shape parsing
//!
//! Sensor hub topics follow `<root>/<device>/<category>/<action>`:
//!
//! - `sensor_hub/pico_w_1/alarm/triggered` - alarm state change
//! - `sensor_hub/pico_w_1/cmd` - command to a device
//! - `sensor_hub/pico_w_1/cmd/response` - device reply to a command

use thiserror::Error;

pub const DEFAULT_TOPIC_ROOT: &str = "sensor_hub";

/// Category segment of alarm topics
pub const ALARM_CATEGORY: &str = "alarm";

/// Builds every topic and subscription filter for one topic root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBuilder {
    root: String,
}

impl TopicBuilder {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// `<root>/+/alarm/+`
    pub fn alarm_subscription(&self) -> String {
        format!("{}/+/{ALARM_CATEGORY}/+", self.root)
    }

    /// `<root>/+/cmd/response`
    pub fn command_response_subscription(&self) -> String {
        format!("{}/+/cmd/response", self.root)
    }

    /// `<root>/<device>/cmd`
    pub fn command_topic(&self, device: &str) -> String {
        format!("{}/{device}/cmd", self.root)
    }

    /// All filters the client subscribes to after connecting
    pub fn subscriptions(&self) -> Vec<String> {
        vec![
            self.alarm_subscription(),
            self.command_response_subscription(),
        ]
    }

    pub fn is_command_response(&self, topic: &str) -> bool {
        topic_matches(&self.command_response_subscription(), topic)
    }
}

impl Default for TopicBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_ROOT)
    }
}

/// MQTT filter matching: `+` matches exactly one level, a trailing `#`
/// matches any number of remaining levels (including none).
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// A topic split into the `<root>/<device>/<category>/<action>` shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicAddress {
    pub root: String,
    pub device: String,
    pub category: String,
    pub action: String,
}

impl TopicAddress {
    /// Minimum number of levels for a device-scoped message
    pub const MIN_SEGMENTS: usize = 4;

    /// Parse a topic; levels beyond the fourth are ignored.
    pub fn parse(topic: &str) -> Result<Self, TopicShapeError> {
        let segments: Vec<&str> = topic.split('/').collect();
        if segments.len() < Self::MIN_SEGMENTS {
            return Err(TopicShapeError::TooFewSegments {
                found: segments.len(),
                topic: topic.to_string(),
            });
        }

        Ok(Self {
            root: segments[0].to_string(),
            device: segments[1].to_string(),
            category: segments[2].to_string(),
            action: segments[3].to_string(),
        })
    }

    pub fn is_alarm(&self) -> bool {
        self.category == ALARM_CATEGORY
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TopicShapeError {
    #[error("topic '{topic}' has {found} segments, expected at least 4")]
    TooFewSegments { found: usize, topic: String },
}

/// Topic validation errors
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Topic level cannot be empty")]
    EmptyLevel,
    #[error("Topic level contains reserved character: '{0}'")]
    ReservedChar(char),
}

/// Validate a single topic level (topic root or device name)
fn validate_topic_level(level: &str) -> Result<(), ValidationError> {
    if level.trim().is_empty() {
        return Err(ValidationError::EmptyLevel);
    }

    match level.chars().find(|c| matches!(c, '/' | '+' | '#')) {
        Some(ch) => Err(ValidationError::ReservedChar(ch)),
        None => Ok(()),
    }
}

pub fn validate_topic_root(root: &str) -> Result<(), ValidationError> {
    validate_topic_level(root)
}

pub fn validate_device_name(device: &str) -> Result<(), ValidationError> {
    validate_topic_level(device)
}
