//! Broker connection settings.
//!
//! Every field has a default matching the historical deployment
//! (`mqttserver.internal:1883`, client id `rtl433_2_<hostname>`, topics under
//! `rtl433/<hostname>`), so an empty `[transport]` table is a working
//! configuration. Constraints are enforced with `validator` after parsing.

use rumqttc::QoS;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::error::TransferError;

/// MQTT connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Namespace prepended to every published topic, ahead of the hostname.
    ///
    /// Leading and trailing slashes are ignored when topics are built.
    #[validate(length(max = 255, message = "Base topic must not exceed 255 characters"))]
    pub base_topic: String,

    /// Broker hostname or IP address.
    #[validate(length(
        min = 1,
        max = 255,
        message = "Host must be between 1 and 255 characters"
    ))]
    pub host: String,

    /// Broker port.
    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Prefix of the client identifier; the local hostname is appended.
    ///
    /// Two bridges on the same host share an identity and will knock each
    /// other off the broker.
    #[validate(length(max = 64, message = "Client id prefix must not exceed 64 characters"))]
    pub client_id_prefix: String,

    /// Keep-alive interval in seconds.
    #[validate(range(
        min = 5,
        max = 3600,
        message = "Keep alive must be between 5 and 3600 seconds"
    ))]
    pub keep_alive: u64,

    /// Whether to request a clean session from the broker.
    pub clean_session: bool,

    /// Seconds to wait for a successful CONNACK.
    #[validate(range(
        min = 1,
        max = 300,
        message = "Connection timeout must be between 1 and 300 seconds"
    ))]
    pub connection_timeout: u64,

    /// Seconds to wait for a single publish to complete.
    ///
    /// For QoS 0 completion means the packet was written to the socket,
    /// for QoS 1 the PUBACK, for QoS 2 the PUBCOMP.
    #[validate(range(
        min = 1,
        max = 300,
        message = "Publish timeout must be between 1 and 300 seconds"
    ))]
    pub publish_timeout: u64,

    /// Milliseconds granted to flush DISCONNECT at the end of a cycle.
    #[validate(range(max = 10000, message = "Disconnect timeout must not exceed 10000 ms"))]
    pub disconnect_timeout_ms: u64,

    /// Quality of service for readings: 0, 1 or 2.
    #[validate(range(max = 2, message = "Invalid QoS value, must be 0, 1, or 2"))]
    pub qos: u8,

    /// Whether the broker should retain published readings.
    pub retain: bool,

    /// Capacity of the client's request queue.
    #[validate(range(min = 1, message = "Request channel capacity must be at least 1"))]
    pub request_channel_capacity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_topic: "rtl433".to_string(),
            host: "mqttserver.internal".to_string(),
            port: 1883,
            client_id_prefix: "rtl433_2_".to_string(),
            keep_alive: 60,
            clean_session: true,
            connection_timeout: 30,
            publish_timeout: 10,
            disconnect_timeout_ms: 250,
            qos: 0,
            retain: false,
            request_channel_capacity: 10,
        }
    }
}

impl Config {
    /// Client identifier for this host.
    pub fn client_id(&self, hostname: &str) -> String {
        format!("{}{}", self.client_id_prefix, hostname)
    }

    /// Topic namespace for this host: `{base_topic}/{hostname}`.
    pub fn topic_prefix(&self, hostname: &str) -> String {
        let base = self.base_topic.trim_matches('/');
        if base.is_empty() {
            hostname.to_string()
        } else {
            format!("{}/{}", base, hostname)
        }
    }

    /// Converts the numeric QoS into the protocol enum.
    pub fn qos(&self) -> Result<QoS, TransferError> {
        match self.qos {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(TransferError::InvalidMetadata(format!(
                "Invalid QoS value {}, must be 0, 1, or 2",
                other
            ))),
        }
    }
}
