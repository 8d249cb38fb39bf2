//! Per-model field selection and unit normalization.
//!
//! Each supported sensor family publishes a fixed set of fields under a
//! device key built from the canonical model and the family's
//! discriminators:
//!
//! | model key                          | discriminators | fields               |
//! |------------------------------------|----------------|----------------------|
//! | `AcuriteRainGauge`                 | id             | rain                 |
//! | `OSv1TemperatureSensor`            | sid, channel   | temp, batt           |
//! | `inFactorysensor`                  | id             | temp (from °F)       |
//! | `Inovalley*`                       | id             | rain, temp           |
//! | `AlectoV1TemperatureSensor`        | id             | temp, batt           |
//! | `TFA*`                             | id, channel    | temp, batt, humid    |
//!
//! Families are tried in table order and the first match wins. Readings of
//! any other model produce nothing.

use super::{reading::SensorReading, value::Value};

/// A supported sensor family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    AcuriteRainGauge,
    OregonScientificV1,
    InFactory,
    Inovalley,
    AlectoV1,
    Tfa,
}

/// A published field, identified by its topic suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Rain,
    Temperature,
    Battery,
    Humidity,
}

impl Field {
    pub fn suffix(self) -> &'static str {
        match self {
            Field::Rain => "rain",
            Field::Temperature => "temp",
            Field::Battery => "batt",
            Field::Humidity => "humid",
        }
    }
}

/// One normalized value ready to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Topic leaf below the host namespace, e.g. `AcuriteRainGauge_136_rain`.
    pub topic: String,
    pub value: Value,
}

impl ModelFamily {
    /// Matches a canonical model key against the supported families.
    pub fn detect(model: &str) -> Option<Self> {
        match model {
            "AcuriteRainGauge" => Some(Self::AcuriteRainGauge),
            "OSv1TemperatureSensor" => Some(Self::OregonScientificV1),
            "inFactorysensor" => Some(Self::InFactory),
            m if m.starts_with("Inovalley") => Some(Self::Inovalley),
            "AlectoV1TemperatureSensor" => Some(Self::AlectoV1),
            m if m.starts_with("TFA") => Some(Self::Tfa),
            _ => None,
        }
    }

    /// Fields published for this family, in publish order.
    pub fn fields(self) -> &'static [Field] {
        match self {
            Self::AcuriteRainGauge => &[Field::Rain],
            Self::OregonScientificV1 => &[Field::Temperature, Field::Battery],
            Self::InFactory => &[Field::Temperature],
            Self::Inovalley => &[Field::Rain, Field::Temperature],
            Self::AlectoV1 => &[Field::Temperature, Field::Battery],
            Self::Tfa => &[Field::Temperature, Field::Battery, Field::Humidity],
        }
    }

    /// `{model}_{discriminators}` for the reading's device.
    pub fn device_key(self, reading: &SensorReading) -> String {
        match self {
            Self::OregonScientificV1 => {
                format!("{}_{}_{}", reading.model, reading.sid, reading.channel)
            }
            Self::Tfa => format!("{}_{}_{}", reading.model, reading.id, reading.channel),
            _ => format!("{}_{}", reading.model, reading.id),
        }
    }

    /// Temperature in °C. inFactory sensors report °F only.
    fn celsius(self, reading: &SensorReading) -> f64 {
        match self {
            Self::InFactory => fahrenheit_to_celsius(reading.temperature_f),
            _ => reading.temperature_c,
        }
    }

    fn value(self, field: Field, reading: &SensorReading) -> Value {
        match field {
            Field::Rain => Value::Number(reading.rain),
            Field::Temperature => Value::Number(round1(self.celsius(reading))),
            Field::Battery => Value::Text(reading.battery.clone()),
            Field::Humidity => Value::Integer(reading.humidity),
        }
    }
}

/// Maps a reading onto the measurements its family publishes.
///
/// `reading.model` must already be canonical.
pub fn normalize(reading: &SensorReading) -> Vec<Measurement> {
    let Some(family) = ModelFamily::detect(&reading.model) else {
        return Vec::new();
    };

    let device = family.device_key(reading);
    family
        .fields()
        .iter()
        .map(|&field| Measurement {
            topic: format!("{}_{}", device, field.suffix()),
            value: family.value(field, reading),
        })
        .collect()
}

/// Rounds to one decimal place, halves away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) / 1.8
}
