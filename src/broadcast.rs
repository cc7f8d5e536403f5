//! Status and event fan-out to observers
//!
//! The connection worker is the only writer; observers may attach and detach
//! from any thread at any time. Delivery takes a snapshot of the registry so
//! an observer can detach itself (or attach another) from inside a callback.

use crate::protocol::{AlarmEvent, CommandResponse};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Receives connection status changes and parsed domain events.
///
/// Every method has an empty default so observers implement only what they
/// care about. Callbacks run on the connection worker and must not block.
pub trait ConnectionObserver: Send + Sync {
    fn on_connection_status_changed(&self, _connected: bool) {}

    fn on_alarm_event(&self, _event: &AlarmEvent) {}

    fn on_command_response(&self, _response: &CommandResponse) {}
}

/// Handle returned by [`EventBroadcaster::attach`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type ObserverEntry = (ObserverId, Arc<dyn ConnectionObserver>);

/// Ordered observer registry
#[derive(Default)]
pub struct EventBroadcaster {
    observers: RwLock<Vec<ObserverEntry>>,
    next_id: AtomicU64,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, observer: Arc<dyn ConnectionObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((id, observer));
        debug!(observer = id.0, "Observer attached");
        id
    }

    /// Remove an observer; returns false if it was not attached
    pub fn detach(&self, id: ObserverId) -> bool {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(entry_id, _)| *entry_id != id);
        before != observers.len()
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn notify_connection_status(&self, connected: bool) {
        self.deliver("connection_status", |observer| {
            observer.on_connection_status_changed(connected)
        });
    }

    pub fn notify_alarm(&self, event: &AlarmEvent) {
        self.deliver("alarm_event", |observer| observer.on_alarm_event(event));
    }

    pub fn notify_command_response(&self, response: &CommandResponse) {
        self.deliver("command_response", |observer| {
            observer.on_command_response(response)
        });
    }

    fn snapshot(&self) -> Vec<ObserverEntry> {
        self.observers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// A panicking observer is logged and skipped; the rest still run.
    fn deliver<F>(&self, kind: &'static str, callback: F)
    where
        F: Fn(&dyn ConnectionObserver),
    {
        for (id, observer) in self.snapshot() {
            let result = catch_unwind(AssertUnwindSafe(|| callback(observer.as_ref())));
            if result.is_err() {
                error!(observer = id.0, kind, "Observer panicked during delivery");
            }
        }
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// Owned copy of one broadcast event
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    ConnectionStatus(bool),
    Alarm(AlarmEvent),
    CommandResponse(CommandResponse),
}

/// Observer that forwards every event into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<HubEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HubEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

// A closed receiver just means nobody is listening any more
impl ConnectionObserver for ChannelObserver {
    fn on_connection_status_changed(&self, connected: bool) {
        let _ = self.sender.send(HubEvent::ConnectionStatus(connected));
    }

    fn on_alarm_event(&self, event: &AlarmEvent) {
        let _ = self.sender.send(HubEvent::Alarm(event.clone()));
    }

    fn on_command_response(&self, response: &CommandResponse) {
        let _ = self.sender.send(HubEvent::CommandResponse(response.clone()));
    }
}
