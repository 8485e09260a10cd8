//! Series model and InfluxDB line-protocol rendering.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ------------------------------------------------------------------ //
//  Precision                                                          //
// ------------------------------------------------------------------ //

/// Timestamp precision shared by the unpacker and the `/write` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    Ns,
    Us,
    Ms,
    S,
}

impl Precision {
    pub fn as_str(self) -> &'static str {
        match self {
            Precision::Ns => "ns",
            Precision::Us => "us",
            Precision::Ms => "ms",
            Precision::S => "s",
        }
    }

    /// Current wall-clock time expressed in this precision.
    pub fn now(self) -> i64 {
        let now = Utc::now();
        match self {
            // Saturates past 2262, the end of the i64 nanosecond range.
            Precision::Ns => now.timestamp_nanos_opt().unwrap_or(i64::MAX),
            Precision::Us => now.timestamp_micros(),
            Precision::Ms => now.timestamp_millis(),
            Precision::S => now.timestamp(),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ------------------------------------------------------------------ //
//  Scalar                                                             //
// ------------------------------------------------------------------ //

/// A tag or field value, restricted to the types line protocol can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl Scalar {
    /// Coerce a JSON value. `null`, arrays and objects have no scalar form.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Scalar::String(s.clone())),
            Value::Bool(b) => Some(Scalar::Boolean(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Scalar::Integer)
                .or_else(|| n.as_f64().map(Scalar::Float)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Field-value encoding. `None` for floats line protocol cannot express.
    fn to_field_value(&self) -> Option<String> {
        match self {
            Scalar::String(s) => Some(format!(
                "\"{}\"",
                s.replace('\\', "\\\\").replace('"', "\\\"")
            )),
            Scalar::Integer(i) => Some(format!("{i}i")),
            Scalar::Float(f) if f.is_finite() => Some(f.to_string()),
            Scalar::Float(_) => None,
            Scalar::Boolean(b) => Some(b.to_string()),
        }
    }
}

/// Textual form, used for tag values and the series name.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => f.write_str(s),
            Scalar::Integer(i) => write!(f, "{i}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Integer(i)
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Scalar::Float(f)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Boolean(b)
    }
}

// ------------------------------------------------------------------ //
//  Columns                                                            //
// ------------------------------------------------------------------ //

/// Insertion-ordered key/value set. Re-inserting a key replaces its value
/// without moving it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Columns(Vec<(String, Scalar)>);

impl Columns {
    pub fn insert(&mut self, key: impl Into<String>, value: Scalar) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ------------------------------------------------------------------ //
//  Series                                                             //
// ------------------------------------------------------------------ //

/// One named, timestamped metric record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub name: String,
    /// In the precision the series was unpacked with; 0 means unset.
    pub timestamp: i64,
    pub tags: Columns,
    pub fields: Columns,
}

impl Series {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Render as one line of line protocol:
    /// `measurement,tag=v field=v timestamp`.
    ///
    /// Returns `None` when the name is not encodable or no field is,
    /// since InfluxDB rejects such points. Tags and fields whose key (or
    /// tag value) is not encodable are dropped.
    pub fn to_line_protocol(&self) -> Option<String> {
        if !encodable(&self.name) {
            return None;
        }

        let fields: Vec<String> = self
            .fields
            .iter()
            .filter(|(k, _)| encodable(k))
            .filter_map(|(k, v)| Some(format!("{}={}", escape_lp(k), v.to_field_value()?)))
            .collect();
        if fields.is_empty() {
            return None;
        }

        let tags: String = self
            .tags
            .iter()
            .map(|(k, v)| (k, v.to_string()))
            .filter(|(k, v)| encodable(k) && encodable(v))
            .map(|(k, v)| format!(",{}={}", escape_lp(k), escape_lp(&v)))
            .collect();

        let mut line = format!(
            "{}{} {}",
            escape_measurement(&self.name),
            tags,
            fields.join(",")
        );
        if self.timestamp != 0 {
            line.push(' ');
            line.push_str(&self.timestamp.to_string());
        }
        Some(line)
    }
}

/// Whether a name, key or tag value survives line-protocol escaping.
/// Line breaks would split the point, and a trailing `\` would escape the
/// separator that follows it.
fn encodable(s: &str) -> bool {
    !s.is_empty() && !s.contains(['\n', '\r']) && !s.ends_with('\\')
}

fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_lp(s: &str) -> String {
    s.replace(' ', "\\ ").replace(',', "\\,").replace('=', "\\=")
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
