//! Pure MQTT option construction
//!
//! Separated from the I/O in [`super::client`] so the mapping from settings
//! to `MqttOptions` can be tested without a broker.

use crate::transport::{ConnectError, ConnectParams, TransportSecurity};
use rumqttc::{MqttOptions, TlsConfiguration, Transport as RumqttcTransport};
use url::Url;

/// Capacity of the rumqttc request channel
pub const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Build `MqttOptions` for one connect attempt.
///
/// Clean session is always on; nothing from a previous session is resumed.
pub fn configure_mqtt_options(params: &ConnectParams) -> Result<MqttOptions, ConnectError> {
    let settings = &params.settings;
    settings
        .validate()
        .map_err(|e| ConnectError::Settings(e.to_string()))?;
    if params.client_id.is_empty() || params.client_id.starts_with(' ') {
        return Err(ConnectError::Settings(format!(
            "client id '{}' is not usable",
            params.client_id
        )));
    }

    let broker_url = settings.broker_url();
    let url = Url::parse(&broker_url)
        .map_err(|_| ConnectError::InvalidBrokerUrl(broker_url.clone()))?;
    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| ConnectError::InvalidBrokerUrl(broker_url.clone()))?;
    let port = url.port().unwrap_or(settings.port);

    let mut mqtt_options = MqttOptions::new(&params.client_id, host, port);
    mqtt_options.set_clean_session(true);
    mqtt_options.set_keep_alive(settings.keep_alive());

    if let Some((username, password)) = settings.credentials() {
        mqtt_options.set_credentials(username, password);
    }

    match &params.security {
        TransportSecurity::Plain => {}
        TransportSecurity::PlatformRoots => {
            mqtt_options.set_transport(RumqttcTransport::tls_with_default_config());
        }
        TransportSecurity::Tls(secure) => {
            mqtt_options.set_transport(RumqttcTransport::tls_with_config(
                TlsConfiguration::Rustls(secure.client_config()),
            ));
        }
    }

    Ok(mqtt_options)
}
