//! Transport errors
//!
//! Connect errors never reach callers of the connection manager; they are
//! logged and turned into a scheduled reconnect. Publish errors are returned
//! to the caller and never retried.

use super::ConnectionState;
use crate::tls::IdentityError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("TLS setup failed: {0}")]
    Identity(#[from] IdentityError),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid connection settings: {0}")]
    Settings(String),
    #[error("Connection failed: {0}")]
    Transport(String),
    #[error("No connection acknowledgement within {0:?}")]
    Timeout(Duration),
    #[error("Subscription to {filter} failed: {reason}")]
    Subscribe { filter: String, reason: String },
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Not connected - current state: {state}")]
    NotConnected { state: ConnectionState },
    #[error("Publishing failed: {0}")]
    SendFailed(String),
    #[error("Serialization error")]
    Serialization(#[source] serde_json::Error),
    #[error("Invalid device name: {0}")]
    InvalidDevice(String),
    #[error("Connection manager has shut down")]
    ManagerStopped,
}
