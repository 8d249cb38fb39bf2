//! Capture tool invocation settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// How to run the radio capture tool for one cycle.
///
/// The defaults run `rtl_433` with every decoder enabled, JSON-lines output
/// and a 60 second capture window.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CaptureConfig {
    /// Executable name or path.
    #[validate(length(min = 1, message = "Capture command must not be empty"))]
    pub command: String,

    /// Arguments passed verbatim.
    pub args: Vec<String>,

    /// Upper bound for one run, in seconds. Should exceed the tool's own
    /// capture window; the process is killed when it elapses.
    #[validate(range(
        min = 1,
        max = 3600,
        message = "Capture timeout must be between 1 and 3600 seconds"
    ))]
    pub timeout_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            command: "rtl_433".to_string(),
            args: ["-G", "-F", "json", "-T", "60"]
                .into_iter()
                .map(String::from)
                .collect(),
            timeout_secs: 75,
        }
    }
}

impl CaptureConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
