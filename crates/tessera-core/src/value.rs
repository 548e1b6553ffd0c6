//! Stored attribute values.

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::fmt;

/// Date format for `date` fields.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A coerced attribute value.
///
/// Values only enter records through the coercer, so every variant already
/// matches the field's declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null.
    Null,
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    /// Id of a record of the field's target entity.
    Ref(String),
    Array(Vec<Value>),
}

impl Value {
    /// Check for null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow string-like content (strings and reference ids).
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Ref(s) => Some(s),
            _ => None,
        }
    }

    /// Reference id, if this is a reference.
    pub fn as_ref_id(&self) -> Option<&str> {
        match self {
            Value::Ref(id) => Some(id),
            _ => None,
        }
    }

    /// Numeric view for ordering comparisons.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// True if this value is, or contains, a reference to `id`.
    pub fn references(&self, id: &str) -> bool {
        match self {
            Value::Ref(r) => r == id,
            Value::Array(items) => items.iter().any(|v| v.references(id)),
            _ => false,
        }
    }

    /// Canonical string form, used for uniqueness and sorting.
    ///
    /// Datetimes always carry nine fractional digits so keys of one offset
    /// sort chronologically.
    pub fn to_key(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) | Value::Ref(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Date(d) => d.format(DATE_FORMAT).to_string(),
            Value::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::Nanos, true),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(Value::to_key).collect();
                format!("[{}]", parts.join(","))
            }
        }
    }

    /// Convert into plain JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            other => serde_json::Value::String(other.to_key()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            other => f.write_str(&other.to_key()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::String(s) | Value::Ref(s) => serializer.serialize_str(s),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Date(_) | Value::DateTime(_) => serializer.serialize_str(&self.to_key()),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
