//! Strict type coercion from submitted JSON to stored values.
//!
//! No silent conversion between numbers and strings. Dates, datetimes and
//! the canonical boolean words are the only strings that are parsed.

use crate::catalog::{FieldDef, FieldType, ScalarType};
use crate::error::FieldError;
use crate::value::{Value, DATE_FORMAT};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::Value as Json;

/// Parse a canonical boolean word.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" => Some(true),
        "false" | "0" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a calendar-valid `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let b = s.as_bytes();
    if b.len() != 10 || b[4] != b'-' || b[7] != b'-' {
        return None;
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

/// Parse an RFC 3339 timestamp with offset.
pub fn parse_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s.trim()).ok()
}

/// Coerce a non-null JSON value to a scalar type.
pub fn coerce_scalar(scalar: ScalarType, raw: &Json) -> Option<Value> {
    match (scalar, raw) {
        (ScalarType::String, Json::String(s)) => Some(Value::String(s.clone())),
        (ScalarType::Int, Json::Number(n)) => match n.as_i64() {
            Some(i) => Some(Value::Int(i)),
            // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound.
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| Value::Int(f as i64)),
        },
        (ScalarType::Float, Json::Number(n)) => n.as_f64().map(Value::Float),
        (ScalarType::Bool, Json::Bool(b)) => Some(Value::Bool(*b)),
        (ScalarType::Bool, Json::String(s)) => parse_bool(s).map(Value::Bool),
        (ScalarType::Date, Json::String(s)) => parse_date(s).map(Value::Date),
        (ScalarType::DateTime, Json::String(s)) => parse_datetime(s).map(Value::DateTime),
        _ => None,
    }
}

/// Coerce one non-array element.
fn coerce_element(field_type: &FieldType, raw: &Json) -> Option<Value> {
    match field_type {
        FieldType::Scalar(s) | FieldType::ArrayScalar(s) => coerce_scalar(*s, raw),
        FieldType::Enum { .. } | FieldType::ArrayEnum { .. } => match raw {
            Json::String(s) => Some(Value::String(s.clone())),
            _ => None,
        },
        FieldType::Ref { .. } | FieldType::ArrayRef { .. } => match raw {
            Json::String(s) if !s.trim().is_empty() => Some(Value::Ref(s.trim().to_string())),
            _ => None,
        },
    }
}

/// Coerce a non-null JSON value to the field's declared type.
pub fn coerce_value(field: &FieldDef, raw: &Json) -> Result<Value, FieldError> {
    let field_type = &field.field_type;

    if !field_type.is_array() {
        return coerce_element(field_type, raw)
            .ok_or_else(|| FieldError::type_mismatch(&field.name, &field_type.describe()));
    }

    let Json::Array(items) = raw else {
        return Err(FieldError::type_mismatch(&field.name, &field_type.describe()));
    };

    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match coerce_element(field_type, item) {
            Some(value) => out.push(value),
            None => {
                return Err(FieldError::type_mismatch(
                    &field.name,
                    &format!("{} (element at index {})", field_type.describe(), index),
                ))
            }
        }
    }
    Ok(Value::Array(out))
}
