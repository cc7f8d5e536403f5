//! Sensor Hub Client
//!
//! The connectivity core of a home-security client: it keeps one MQTT
//! session to the sensor hub broker alive, turns alarm and command-response
//! messages into typed events, fans them out to any number of observers and
//! publishes device commands.
//!
//! # Overview
//!
//! - [`tls`] - CA bundle and client identity loading (PKCS#1 or PKCS#8 keys)
//! - [`transport`] - broker session abstraction and the rumqttc implementation
//! - [`manager`] - connection lifecycle with fixed-delay reconnect
//! - [`routing`] / [`protocol`] - topic classification and payload codec
//! - [`broadcast`] / [`presenter`] - observer registry and notification text
//! - [`settings`] / [`config`] - persisted broker settings and static config
//! - [`directory`] - read-only device list from the hub's REST API
//!
//! # Quick Start
//!
//! ```rust
//! use sensor_hub_client::protocol::TopicBuilder;
//! use sensor_hub_client::routing::{RouteOutcome, TopicRouter};
//!
//! let router = TopicRouter::new(TopicBuilder::new("sensor_hub"));
//! let outcome = router.route(
//!     "sensor_hub/pico_w_1/alarm/triggered",
//!     br#"{"triggered_by":"pico_w_1","timestamp":1000}"#,
//! );
//!
//! match outcome {
//!     RouteOutcome::Alarm(event) => {
//!         assert_eq!(event.triggered_by.as_deref(), Some("pico_w_1"));
//!         assert_eq!(event.timestamp, 1000);
//!     }
//!     other => panic!("unexpected outcome: {other:?}"),
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod directory;
pub mod error;
pub mod manager;
pub mod observability;
pub mod presenter;
pub mod protocol;
pub mod routing;
pub mod settings;
pub mod testing;
pub mod tls;
pub mod transport;

pub use broadcast::{ConnectionObserver, EventBroadcaster, ObserverId};
pub use config::{AppConfig, ConfigError};
pub use error::{HubError, HubResult};
pub use manager::{ConnectionManager, ManagerConfig, SettingsUpdate};
pub use protocol::{AlarmEvent, AlarmState, CommandResponse, DeviceCommand};
pub use settings::{ConnectionSettings, SettingsStore};
pub use transport::ConnectionState;
