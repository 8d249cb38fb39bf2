//! Short-lived broker sessions.
//!
//! The bridge opens one session per capture cycle and closes it when the
//! cycle's readings are published. A session owns its event loop and only
//! polls it from inside `connect`, `publish` and `disconnect`, so every
//! wait is bounded by an explicit timeout and nothing runs in the background
//! between calls.
//!
//! ```text
//! MqttBroker::open_session ──(CONNACK)──> MqttSession
//!                                            │ publish * n
//!                                            ▼
//!                                        disconnect
//! ```

use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Outgoing, Packet, QoS};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use super::{client::ClientBuilder, config::Config, error::TransferError};

/// Factory for per-cycle sessions with a fixed identity.
#[derive(Debug, Clone)]
pub struct MqttBroker {
    config: Config,
    client_id: String,
    qos: QoS,
}

impl MqttBroker {
    /// Creates a broker handle for this host.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or names an unsupported QoS.
    pub fn new(config: Config, hostname: &str) -> Result<Self, TransferError> {
        validator::Validate::validate(&config)?;
        let qos = config.qos()?;
        let client_id = config.client_id(hostname);

        Ok(Self {
            config,
            client_id,
            qos,
        })
    }

    /// Client identifier used for every session.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Connection configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Connects to the broker and waits for a successful CONNACK.
    ///
    /// # Errors
    ///
    /// * `TransferError::ConnectionRefused` if the broker rejects the client
    /// * `TransferError::ClientConnection` on network failures
    /// * `TransferError::Timeout` if no CONNACK arrives within
    ///   `connection_timeout`
    pub async fn open_session(&self) -> Result<MqttSession, TransferError> {
        let (client, mut event_loop) =
            ClientBuilder::from_config(&self.config, &self.client_id)?.build();

        let limit = Duration::from_secs(self.config.connection_timeout);
        debug!(
            "Connecting to {}:{} as '{}'",
            self.config.host, self.config.port, self.client_id
        );

        timeout(limit, wait_for_connack(&mut event_loop))
            .await
            .map_err(|_| TransferError::Timeout {
                operation: "CONNACK",
                after: limit,
            })??;

        info!(
            "Connected to {}:{} as '{}'",
            self.config.host, self.config.port, self.client_id
        );

        Ok(MqttSession {
            client,
            event_loop,
            qos: self.qos,
            retain: self.config.retain,
            publish_timeout: Duration::from_secs(self.config.publish_timeout),
            disconnect_timeout: Duration::from_millis(self.config.disconnect_timeout_ms),
        })
    }
}

/// An established connection, valid for one capture cycle.
pub struct MqttSession {
    client: AsyncClient,
    event_loop: EventLoop,
    qos: QoS,
    retain: bool,
    publish_timeout: Duration,
    disconnect_timeout: Duration,
}

impl MqttSession {
    /// Publishes a text payload and waits until the broker side of the
    /// exchange completes for the configured QoS.
    ///
    /// # Errors
    ///
    /// Returns the queueing, connection or timeout error that stopped the
    /// publish. The session should not be reused after a connection error.
    pub async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransferError> {
        self.client
            .publish(topic, self.qos, self.retain, payload.as_bytes().to_vec())
            .await?;

        let limit = self.publish_timeout;
        timeout(limit, wait_for_publish(&mut self.event_loop, self.qos))
            .await
            .map_err(|_| TransferError::Timeout {
                operation: "publish completion",
                after: limit,
            })??;

        debug!("Published '{}' to '{}'", payload, topic);
        Ok(())
    }

    /// Sends DISCONNECT and gives the event loop a short window to flush it.
    ///
    /// Failures are logged, never returned: the connection is discarded
    /// either way.
    pub async fn disconnect(&mut self) {
        if let Err(e) = self.client.disconnect().await {
            warn!("Error queueing disconnect packet: {}", e);
            return;
        }

        let flushed = timeout(self.disconnect_timeout, async {
            loop {
                match self.event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                    Ok(event) => trace!("Event while disconnecting: {:?}", event),
                    Err(e) => {
                        debug!("Event loop closed while disconnecting: {}", e);
                        break;
                    }
                }
            }
        })
        .await;

        match flushed {
            Ok(()) => debug!("Disconnected from broker"),
            Err(_) => warn!(
                "Disconnect not flushed within {:?}, dropping connection",
                self.disconnect_timeout
            ),
        }
    }
}

/// Polls until the handshake finishes.
///
/// A refused CONNACK arrives as a poll error and is converted by
/// `From<ConnectionError>`; the match arm below covers clients that yield it
/// as an event instead.
async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), TransferError> {
    loop {
        match event_loop.poll().await? {
            Event::Incoming(Packet::ConnAck(ack)) => {
                return match ack.code {
                    ConnectReturnCode::Success => Ok(()),
                    code => Err(TransferError::ConnectionRefused(code)),
                };
            }
            event => trace!("Event while connecting: {:?}", event),
        }
    }
}

/// Polls until the queued publish is complete for `qos`.
async fn wait_for_publish(event_loop: &mut EventLoop, qos: QoS) -> Result<(), TransferError> {
    loop {
        let event = event_loop.poll().await?;
        if publish_completed(&event, qos) {
            return Ok(());
        }
        trace!("Event while publishing: {:?}", event);
    }
}

/// Whether `event` finishes a publish at `qos`.
fn publish_completed(event: &Event, qos: QoS) -> bool {
    matches!(
        (event, qos),
        (Event::Outgoing(Outgoing::Publish(_)), QoS::AtMostOnce)
            | (Event::Incoming(Packet::PubAck(_)), QoS::AtLeastOnce)
            | (Event::Incoming(Packet::PubComp(_)), QoS::ExactlyOnce)
    )
}
