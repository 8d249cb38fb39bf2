//! The decoded form of one capture line.

use serde::{Deserialize, Serialize};

/// One weather-sensor record as emitted by the capture tool.
///
/// The struct is the union of every supported model's fields. Keys a model
/// does not send keep their zero value, so a `0` here may mean either a real
/// reading of zero or an absent field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorReading {
    /// Timestamp as reported by the tool; not interpreted.
    pub time: String,
    /// Device model. Whitespace-free after parsing, see [`canonical_model`].
    pub model: String,
    pub brand: String,
    pub sid: i64,
    pub id: i64,
    pub channel: i64,
    pub battery: String,
    #[serde(rename = "temperature_C")]
    pub temperature_c: f64,
    #[serde(rename = "temperature_F")]
    pub temperature_f: f64,
    /// Accumulated rainfall.
    pub rain: f64,
    /// Relative humidity in percent.
    pub humidity: i64,
}

impl SensorReading {
    /// Replaces `model` with its canonical key.
    pub fn canonicalize(mut self) -> Self {
        self.model = canonical_model(&self.model);
        self
    }
}

/// Removes every Unicode whitespace character from a model name.
///
/// `"Acurite Rain Gauge"` and `" Acurite\tRain Gauge\n"` both become
/// `"AcuriteRainGauge"`.
pub fn canonical_model(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}
