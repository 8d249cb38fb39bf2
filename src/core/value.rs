//! Publishable field values.

use std::fmt;

/// A single published value.
///
/// Closed set: every value the normalizer produces is one of these, and each
/// variant has exactly one payload encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Published verbatim.
    Text(String),
    /// Published with exactly one fractional digit.
    Number(f64),
    /// Published as a plain decimal integer.
    Integer(i64),
}

impl Value {
    /// Encodes the value as an MQTT payload.
    pub fn to_payload(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{:.1}", n),
            Value::Integer(i) => write!(f, "{}", i),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}
