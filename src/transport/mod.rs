//! Broker transport abstraction
//!
//! The connection manager talks to the broker only through
//! [`BrokerTransport`] and the [`SessionHandle`] it returns, so the whole
//! connection lifecycle can be driven by a scripted mock in tests. Transport
//! callbacks are delivered as [`TransportEvent`]s on a channel owned by the
//! session; dropping the session drops that channel.

use crate::settings::ConnectionSettings;
use crate::tls::SecureTransport;
use bytes::Bytes;
use std::fmt;
use tokio::sync::mpsc;

pub mod error;
pub mod mqtt;

pub use error::{ConnectError, PublishError};

/// Connection state owned by exactly one connection manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(label)
    }
}

/// How the socket is secured
#[derive(Debug, Clone)]
pub enum TransportSecurity {
    /// Plain TCP
    Plain,
    /// TLS trusting the platform's root certificates
    PlatformRoots,
    /// TLS with an explicit CA bundle and optional client identity
    Tls(SecureTransport),
}

/// Everything needed for one connect attempt
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub settings: ConnectionSettings,
    pub security: TransportSecurity,
    pub client_id: String,
}

/// Events raised by a live session
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    MessageArrived { topic: String, payload: Bytes },
    ConnectionLost(String),
}

/// An established broker session and its event stream
pub struct BrokerSession {
    pub handle: Box<dyn SessionHandle>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl fmt::Debug for BrokerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerSession").finish_non_exhaustive()
    }
}

/// Opens broker sessions
#[async_trait::async_trait]
pub trait BrokerTransport: Send + Sync {
    /// Connect and wait for the broker's acknowledgement
    async fn open(&self, params: ConnectParams) -> Result<BrokerSession, ConnectError>;
}

/// Operations on an open session
#[async_trait::async_trait]
pub trait SessionHandle: Send + Sync {
    /// Subscribe to each filter at QoS 1
    async fn subscribe(&self, filters: &[String]) -> Result<(), ConnectError>;

    /// Publish at QoS 1, not retained
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError>;

    /// Close the session; no events are raised afterwards
    async fn disconnect(&self);
}
