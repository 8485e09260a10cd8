//! Metric unpacking.
//!
//! Turns an arbitrary JSON metric object into a [`Series`] by classifying
//! each top-level key:
//!
//! | Key (case-insensitive) | Effect                                      |
//! |------------------------|---------------------------------------------|
//! | `name`                 | series name                                 |
//! | `timestamp`            | series timestamp, when a JSON integer       |
//! | `metadata`             | every entry of the nested object is a tag   |
//! | `value` / `values`     | every entry of the nested object is a field |
//! | `*_t`                  | tag, suffix removed                         |
//! | `*_f`                  | field, suffix removed                       |
//!
//! Anything else is ignored. Entries that do not fit are skipped, never
//! failing the whole metric.

use serde_json::Value;
use tracing::debug;

use crate::series::{Columns, Precision, Scalar, Series};

/// Role of a top-level metric key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass<'a> {
    Name,
    Timestamp,
    Metadata,
    Value,
    /// Carries the key with its `_t` suffix removed.
    TagSuffix(&'a str),
    /// Carries the key with its `_f` suffix removed.
    FieldSuffix(&'a str),
    Unknown,
}

impl<'a> KeyClass<'a> {
    pub fn of(key: &'a str) -> Self {
        if key.eq_ignore_ascii_case("name") {
            KeyClass::Name
        } else if key.eq_ignore_ascii_case("timestamp") {
            KeyClass::Timestamp
        } else if key.eq_ignore_ascii_case("metadata") {
            KeyClass::Metadata
        } else if key.eq_ignore_ascii_case("value") || key.eq_ignore_ascii_case("values") {
            KeyClass::Value
        } else if let Some(stem) = strip_suffix_ignore_case(key, "_t") {
            KeyClass::TagSuffix(stem)
        } else if let Some(stem) = strip_suffix_ignore_case(key, "_f") {
            KeyClass::FieldSuffix(stem)
        } else {
            KeyClass::Unknown
        }
    }
}

/// Bounds-checked suffix match: keys shorter than the suffix never match.
fn strip_suffix_ignore_case<'a>(key: &'a str, suffix: &str) -> Option<&'a str> {
    let split = key.len().checked_sub(suffix.len())?;
    if !key.is_char_boundary(split) {
        return None;
    }
    let (stem, tail) = key.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(stem)
}

/// Unpack one metric object into a fresh [`Series`].
///
/// A missing, zero or non-integer `timestamp` is replaced with the current
/// time in `precision`.
pub fn unpack_metric(metric: &Value, precision: Precision) -> Series {
    let mut series = Series::default();
    unpack_into(metric, &mut series, precision);
    series
}

/// Populate `series` from `metric`. Existing tags and fields are kept;
/// the name and timestamp are overwritten when the metric carries them.
pub fn unpack_into(metric: &Value, series: &mut Series, precision: Precision) {
    match metric.as_object() {
        Some(object) => {
            for (key, value) in object {
                apply(series, key, value);
            }
        }
        None => debug!(kind = json_kind(metric), "metric is not an object, nothing to unpack"),
    }

    if series.timestamp == 0 {
        series.timestamp = precision.now();
    }
}

fn apply(series: &mut Series, key: &str, value: &Value) {
    match KeyClass::of(key) {
        KeyClass::Name => match value {
            Value::String(s) => series.name = s.clone(),
            Value::Null => debug!(key, "null metric name ignored"),
            other => series.name = other.to_string(),
        },
        KeyClass::Timestamp => {
            series.timestamp = value.as_i64().unwrap_or(0);
        }
        KeyClass::Metadata => unpack_nested(&mut series.tags, key, value),
        KeyClass::Value => unpack_nested(&mut series.fields, key, value),
        KeyClass::TagSuffix(stem) => push(&mut series.tags, stem, key, value),
        KeyClass::FieldSuffix(stem) => push(&mut series.fields, stem, key, value),
        KeyClass::Unknown => {}
    }
}

fn unpack_nested(columns: &mut Columns, key: &str, value: &Value) {
    let Some(object) = value.as_object() else {
        debug!(key, kind = json_kind(value), "expected an object, skipping");
        return;
    };
    for (inner, v) in object {
        push(columns, inner, inner, v);
    }
}

fn push(columns: &mut Columns, column: &str, key: &str, value: &Value) {
    if column.is_empty() {
        debug!(key, "empty column name, skipping");
        return;
    }
    match Scalar::from_json(value) {
        Some(scalar) => columns.insert(column, scalar),
        None => debug!(key, kind = json_kind(value), "value has no scalar form, skipping"),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
