//! MQTT 3.1.1 transport built on rumqttc
//!
//! The module separates pure functions from I/O:
//!
//! - [`connection`] - settings to `MqttOptions` mapping
//! - [`message_handler`] - eventloop event classification
//! - [`client`] - connect, event pump, publish/subscribe/disconnect
//!
//! # Usage
//!
//! ```rust,no_run
//! use sensor_hub_client::settings::ConnectionSettings;
//! use sensor_hub_client::transport::mqtt::RumqttTransport;
//! use sensor_hub_client::transport::{BrokerTransport, ConnectParams, TransportSecurity};
//!
//! # tokio_test::block_on(async {
//! let settings = ConnectionSettings {
//!     host: "localhost".to_string(),
//!     port: 1883,
//!     use_secure_transport: false,
//!     ..Default::default()
//! };
//! let client_id = settings.client_id.clone();
//! let session = RumqttTransport::new()
//!     .open(ConnectParams { settings, security: TransportSecurity::Plain, client_id })
//!     .await?;
//! session.handle.subscribe(&["sensor_hub/+/alarm/+".to_string()]).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::RumqttTransport;
pub use connection::configure_mqtt_options;
pub use message_handler::{EventRoute, MessageHandler};
