//! rtl433-bridge: forwards 433 MHz weather sensor readings to MQTT
//!
//! Each cycle runs the `rtl_433` capture tool for a bounded time, decodes
//! the JSON lines it prints, keeps the readings of known sensor families and
//! publishes every field as its own small text message under
//! `{base_topic}/{hostname}/{model}_{discriminators}_{field}`.
//!
//! ## Modules
//!
//! * `config` - TOML configuration with validation via the `validator` crate
//!   and defaults that work without any file.
//!
//! * `core` - The runtime pieces:
//!   - capture adapter around the external tool
//!   - report parser and reading model
//!   - per-family normalizer and payload values
//!   - cycle executor driving capture and publishing
//!
//! * `logger` - `tracing` initialization with console output (compact,
//!   pretty or JSON) and optional systemd journald output.

pub mod config;
pub mod core;
pub mod logger;
