//! Construction of `rumqttc` clients.
//!
//! `ClientBuilder` turns a validated [`Config`] into the `AsyncClient` /
//! `EventLoop` pair. The two must be used together: the client queues
//! requests, the event loop performs the network I/O for them.

use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions};

use super::{config::Config, error::TransferError};

/// Fluent builder for an MQTT client and its event loop.
pub struct ClientBuilder {
    opts: MqttOptions,
    cap: usize,
}

impl ClientBuilder {
    /// Creates a builder with protocol defaults.
    ///
    /// `cap` bounds how many requests may be queued before the event loop
    /// picks them up.
    pub fn new(
        client_id: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        cap: usize,
    ) -> Self {
        Self {
            opts: MqttOptions::new(client_id, host, port),
            cap,
        }
    }

    /// Creates a builder from configuration and a resolved client id.
    ///
    /// # Errors
    ///
    /// Returns `TransferError::ConfigError` if the configuration does not
    /// pass validation.
    pub fn from_config(config: &Config, client_id: &str) -> Result<Self, TransferError> {
        validator::Validate::validate(config)?;

        let builder = Self::new(
            client_id,
            config.host.clone(),
            config.port,
            config.request_channel_capacity as usize,
        )
        .keep_alive(config.keep_alive)
        .clean_session(config.clean_session);

        Ok(builder)
    }

    /// Sets the keep-alive interval in seconds.
    pub fn keep_alive(mut self, secs: u64) -> Self {
        self.opts.set_keep_alive(Duration::from_secs(secs));
        self
    }

    /// Requests a clean (or persistent) session.
    pub fn clean_session(mut self, clean: bool) -> Self {
        self.opts.set_clean_session(clean);
        self
    }

    /// Returns the options that will be used to connect.
    pub fn options(&self) -> &MqttOptions {
        &self.opts
    }

    /// Builds the client and its event loop. No network I/O happens until
    /// the event loop is polled.
    pub fn build(self) -> (AsyncClient, EventLoop) {
        AsyncClient::new(self.opts, self.cap)
    }
}
