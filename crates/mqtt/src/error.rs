//! Error type shared by every broker operation.
//!
//! `TransferError` gathers configuration, connection and publish failures
//! into one enum so the bridge can log a cycle's problems uniformly and move
//! on to the next cycle.

use std::time::Duration;

use rumqttc::ConnectReturnCode;
use thiserror::Error;

/// The unified error type for MQTT operations.
#[derive(Debug, Error)]
pub enum TransferError {
    /// A configured value cannot be mapped onto the protocol.
    ///
    /// Currently raised for a QoS outside `0..=2`.
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Configuration validation failed.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] validator::ValidationErrors),

    /// The local client could not queue a request for the event loop.
    #[error("Client transfer error: {0}")]
    ClientTransfer(#[from] rumqttc::ClientError),

    /// The connection to the broker failed or was lost.
    ///
    /// Boxed to keep the enum small.
    #[error("Client connection error: {0}")]
    ClientConnection(#[from] Box<rumqttc::ConnectionError>),

    /// The broker answered CONNECT with a non-success return code.
    #[error("Connection refused by broker: {0:?}")]
    ConnectionRefused(ConnectReturnCode),

    /// An operation did not complete within its configured bound.
    #[error("Timed out after {after:?} waiting for {operation}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl From<rumqttc::ConnectionError> for TransferError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        match err {
            // rumqttc surfaces a rejected CONNACK as a poll error.
            rumqttc::ConnectionError::ConnectionRefused(code) => {
                TransferError::ConnectionRefused(code)
            }
            err => TransferError::ClientConnection(Box::new(err)),
        }
    }
}
