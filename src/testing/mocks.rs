//! Mock implementations for testing
//!
//! [`MockTransport`] stands in for the broker: connect attempts can be
//! scripted to fail or stall, and the test can inject inbound messages or a
//! connection loss into the most recent session. [`RecordingObserver`]
//! captures everything the broadcaster delivers.

use crate::broadcast::ConnectionObserver;
use crate::protocol::{AlarmEvent, CommandResponse};
use crate::transport::{
    BrokerSession, BrokerTransport, ConnectError, ConnectParams, PublishError, SessionHandle,
    TransportEvent,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

pub type PublishedMessage = (String, Vec<u8>);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct MockState {
    open_calls: AtomicUsize,
    disconnects: AtomicUsize,
    failures_remaining: AtomicUsize,
    connect_delay: Mutex<Option<Duration>>,
    opened_with: Mutex<Vec<ConnectParams>>,
    subscriptions: Mutex<Vec<String>>,
    published_messages: Mutex<Vec<PublishedMessage>>,
    sessions: Mutex<Vec<mpsc::UnboundedSender<TransportEvent>>>,
}

/// Scriptable in-memory broker transport
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connect attempt fails
    pub fn with_failure() -> Self {
        let transport = Self::new();
        transport.fail_next(usize::MAX);
        transport
    }

    /// Fail the next `count` connect attempts
    pub fn fail_next(&self, count: usize) {
        self.state.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Delay every connect attempt, to observe the Connecting state
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        *lock(&self.state.connect_delay) = delay;
    }

    pub fn open_count(&self) -> usize {
        self.state.open_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    pub fn last_params(&self) -> Option<ConnectParams> {
        lock(&self.state.opened_with).last().cloned()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        lock(&self.state.subscriptions).clone()
    }

    pub fn published_messages(&self) -> Vec<PublishedMessage> {
        lock(&self.state.published_messages).clone()
    }

    /// Event sender of the most recent session, kept even after release
    pub fn session_events(&self) -> Option<mpsc::UnboundedSender<TransportEvent>> {
        lock(&self.state.sessions).last().cloned()
    }

    /// Deliver a message on the most recent session; false if nobody listens
    pub fn inject_message(&self, topic: &str, payload: impl Into<Bytes>) -> bool {
        self.send_event(TransportEvent::MessageArrived {
            topic: topic.to_string(),
            payload: payload.into(),
        })
    }

    /// Report a connection loss on the most recent session
    pub fn drop_connection(&self, reason: &str) -> bool {
        self.send_event(TransportEvent::ConnectionLost(reason.to_string()))
    }

    fn send_event(&self, event: TransportEvent) -> bool {
        self.session_events()
            .map(|sender| sender.send(event).is_ok())
            .unwrap_or(false)
    }

    fn take_failure(&self) -> bool {
        self.state
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                match remaining {
                    0 => None,
                    usize::MAX => Some(usize::MAX),
                    n => Some(n - 1),
                }
            })
            .is_ok()
    }
}

#[async_trait]
impl BrokerTransport for MockTransport {
    async fn open(&self, params: ConnectParams) -> Result<BrokerSession, ConnectError> {
        self.state.open_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.state.opened_with).push(params);

        let delay = *lock(&self.state.connect_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.take_failure() {
            return Err(ConnectError::Transport("mock connection refused".to_string()));
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        lock(&self.state.sessions).push(event_tx);

        Ok(BrokerSession {
            handle: Box::new(MockSession {
                state: Arc::clone(&self.state),
            }),
            events: event_rx,
        })
    }
}

struct MockSession {
    state: Arc<MockState>,
}

#[async_trait]
impl SessionHandle for MockSession {
    async fn subscribe(&self, filters: &[String]) -> Result<(), ConnectError> {
        lock(&self.state.subscriptions).extend(filters.iter().cloned());
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        lock(&self.state.published_messages).push((topic.to_string(), payload));
        Ok(())
    }

    async fn disconnect(&self) {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Observer that records every delivery
#[derive(Debug, Default)]
pub struct RecordingObserver {
    statuses: Mutex<Vec<bool>>,
    alarms: Mutex<Vec<AlarmEvent>>,
    responses: Mutex<Vec<CommandResponse>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn statuses(&self) -> Vec<bool> {
        lock(&self.statuses).clone()
    }

    pub fn alarms(&self) -> Vec<AlarmEvent> {
        lock(&self.alarms).clone()
    }

    pub fn responses(&self) -> Vec<CommandResponse> {
        lock(&self.responses).clone()
    }
}

impl ConnectionObserver for RecordingObserver {
    fn on_connection_status_changed(&self, connected: bool) {
        lock(&self.statuses).push(connected);
    }

    fn on_alarm_event(&self, event: &AlarmEvent) {
        lock(&self.alarms).push(event.clone());
    }

    fn on_command_response(&self, response: &CommandResponse) {
        lock(&self.responses).push(response.clone());
    }
}
