//! # rtl433-bridge-mqtt: per-cycle MQTT sessions
//!
//! A thin layer over `rumqttc` for a publisher that connects, sends a batch
//! of small text messages and disconnects again:
//!
//! - [`Config`]: validated broker settings with working defaults
//! - [`ClientBuilder`]: builds the `AsyncClient` / `EventLoop` pair
//! - [`MqttBroker`]: opens sessions under a fixed client identity
//! - [`MqttSession`]: bounded-time publish and disconnect
//! - [`TransferError`]: every failure mode in one enum
//!
//! ```ignore
//! let broker = MqttBroker::new(Config::default(), "weatherpi")?;
//! let mut session = broker.open_session().await?;
//! session.publish("rtl433/weatherpi/TFA_9_2_temp", "20.0").await?;
//! session.disconnect().await;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod session;

pub use client::ClientBuilder;
pub use config::Config;
pub use error::TransferError;
pub use session::{MqttBroker, MqttSession};

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, TransferError>;
