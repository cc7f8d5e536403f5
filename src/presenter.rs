//! Mapping from domain events to user-facing notifications
//!
//! The mapping is pure; [`LogPresenter`] is the observer the CLI shell
//! attaches to render notifications through tracing.

use crate::broadcast::ConnectionObserver;
use crate::protocol::{AlarmEvent, AlarmState, CommandResponse};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Notification priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Ongoing status indicator
    Low,
    Default,
    /// Alarm: sound and vibration
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub severity: Severity,
}

pub const STATUS_TITLE: &str = "Home Security Monitor";

impl Notification {
    fn new(title: &str, body: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.to_string(),
            body: body.into(),
            severity,
        }
    }

    pub fn for_alarm(event: &AlarmEvent) -> Self {
        match event.state {
            AlarmState::Triggered => Self::new(
                "ALARM TRIGGERED!",
                match &event.triggered_by {
                    Some(source) => format!("Triggered by: {source}"),
                    None => "Security alarm has been triggered".to_string(),
                },
                Severity::High,
            ),
            AlarmState::Armed => Self::new(
                "System Armed",
                "Security system is now armed and monitoring",
                Severity::Default,
            ),
            AlarmState::Disarmed => Self::new(
                "System Disarmed",
                "Security system has been disarmed",
                Severity::Default,
            ),
            AlarmState::Unknown => Self::new(
                "Security Alert",
                event
                    .raw_message
                    .clone()
                    .unwrap_or_else(|| "Security system state changed".to_string()),
                Severity::Default,
            ),
        }
    }

    /// Low-priority ongoing status indicator
    pub fn for_connection_status(connected: bool) -> Self {
        let body = if connected {
            "Connected to security system"
        } else {
            "Disconnected - attempting to reconnect"
        };
        Self::new(STATUS_TITLE, body, Severity::Low)
    }

    /// One-shot message for a command that could not be sent
    pub fn for_publish_failure(command: &str, error: &dyn std::error::Error) -> Self {
        Self::new(
            "Command failed",
            format!("Failed to send {command} command: {error}"),
            Severity::Default,
        )
    }

    pub fn for_command_response(response: &CommandResponse) -> Self {
        let device = response.device.as_deref().unwrap_or("device");
        Self::new(
            "Command response",
            format!(
                "{device}: {} ({}) - {}",
                response.command, response.status, response.message
            ),
            Severity::Low,
        )
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.body)
    }
}

/// Renders every broadcast event as a log line
#[derive(Debug, Default, Clone)]
pub struct LogPresenter;

impl LogPresenter {
    fn render(notification: &Notification) {
        match notification.severity {
            Severity::High => warn!(
                title = %notification.title,
                severity = ?notification.severity,
                "{}", notification.body
            ),
            Severity::Default | Severity::Low => info!(
                title = %notification.title,
                severity = ?notification.severity,
                "{}", notification.body
            ),
        }
    }
}

impl ConnectionObserver for LogPresenter {
    fn on_connection_status_changed(&self, connected: bool) {
        Self::render(&Notification::for_connection_status(connected));
    }

    fn on_alarm_event(&self, event: &AlarmEvent) {
        Self::render(&Notification::for_alarm(event));
    }

    fn on_command_response(&self, response: &CommandResponse) {
        Self::render(&Notification::for_command_response(response));
    }
}
