//! Application configuration loading and validation.
//!
//! `Config` aggregates the logging, capture, transport and bridge sections.
//! It is read from a TOML file when one is present and otherwise falls back
//! to built-in defaults, which reproduce the historical hard-coded
//! deployment. The configuration is loaded once at startup and is immutable
//! afterwards.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::{bridge::BridgeConfig, capture::CaptureConfig, logger::LoggerConfig};

pub mod bridge;
pub mod capture;
pub mod logger;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "RTL433_BRIDGE_CONFIG";

/// Configuration file consulted when `RTL433_BRIDGE_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rtl433-bridge/config.toml";

/// Prints a timestamped, colored line to stdout.
///
/// Used before the tracing subscriber exists; prefer `print_info!`,
/// `print_warn!` and `print_error!`.
#[macro_export]
macro_rules! print_line {
    ($label:expr, $($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_default()
            ).dim(),
            $label,
            format_args!($($arg)*)
        )
    };
}

#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        $crate::print_line!(console::style(" INFO").green(), $($arg)*)
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        $crate::print_line!(console::style(" WARN").yellow(), $($arg)*)
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        $crate::print_line!(console::style("ERROR").red(), $($arg)*)
    };
}

/// Errors raised while locating, parsing or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error while reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error while reading configuration: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Broker settings; provided by the transport crate.
pub type TransportConfig = rtl433_bridge_mqtt::Config;

/// Top-level application configuration.
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Logging subsystem.
    #[validate(nested)]
    pub logger: LoggerConfig,

    /// Capture tool invocation.
    #[validate(nested)]
    pub capture: CaptureConfig,

    /// Broker connection.
    #[validate(nested)]
    pub transport: TransportConfig,

    /// Cycle scheduling.
    #[validate(nested)]
    pub bridge: BridgeConfig,
}

impl Config {
    /// Loads the configuration for this process.
    ///
    /// Lookup order:
    /// 1. the file named by `RTL433_BRIDGE_CONFIG` (must exist)
    /// 2. `/etc/rtl433-bridge/config.toml`, if present
    /// 3. built-in defaults
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a selected file cannot be read, parsed or
    /// validated.
    pub fn new() -> Result<Self, ConfigError> {
        match Self::config_path(std::env::var(CONFIG_ENV).ok(), Path::new(DEFAULT_CONFIG_PATH)) {
            Some(path) => Self::load(&path),
            None => {
                print_warn!("No configuration file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Picks the configuration file, if any.
    fn config_path(from_env: Option<String>, fallback: &Path) -> Option<PathBuf> {
        if let Some(path) = from_env {
            let path = PathBuf::from(path);
            print_info!("Using config from {}: {}", CONFIG_ENV, path.display());
            return Some(path);
        }

        if fallback.exists() {
            print_info!("Using default config path: {}", fallback.display());
            return Some(fallback.to_path_buf());
        }

        None
    }

    /// Loads and validates configuration from `path`.
    ///
    /// # Errors
    ///
    /// Propagates IO, parsing and validation failures as `ConfigError`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        print_info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let config_str = fs::read_to_string(path)?;
        let config = Self::from_toml(&config_str)?;

        print_info!("Successfully loaded config from: {}", path.display());
        Ok(config)
    }

    /// Parses and validates configuration text.
    pub fn from_toml(text: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        Ok(config)
    }
}
