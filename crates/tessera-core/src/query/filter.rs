//! Filter evaluation for list queries.
//!
//! This module provides the `FilterEvaluator` that evaluates field conditions
//! and the free-text filter against stored records.

use crate::catalog::{EntityDef, FieldType, ScalarType};
use crate::constraint::{parse_bool, parse_date, parse_datetime};
use crate::error::Error;
use crate::storage::Record;
use crate::value::Value;
use chrono::{DateTime, FixedOffset, NaiveDate};
use std::cmp::Ordering;
use std::str::FromStr;

/// Query parameter keys that are never field conditions.
pub const RESERVED_PARAMS: [&str; 6] = ["limit", "offset", "sort", "q", "nulls", "order"];

/// Comparison operator of a field condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    In,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    /// Check if this operator orders values.
    pub fn is_ordering(&self) -> bool {
        matches!(self, FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte)
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            FilterOp::Eq | FilterOp::In => ordering.is_eq(),
            FilterOp::Gt => ordering.is_gt(),
            FilterOp::Gte => ordering.is_ge(),
            FilterOp::Lt => ordering.is_lt(),
            FilterOp::Lte => ordering.is_le(),
        }
    }
}

impl FromStr for FilterOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(FilterOp::Eq),
            "in" => Ok(FilterOp::In),
            "gt" => Ok(FilterOp::Gt),
            "gte" => Ok(FilterOp::Gte),
            "lt" => Ok(FilterOp::Lt),
            "lte" => Ok(FilterOp::Lte),
            other => Err(Error::InvalidQuery(format!("unknown operator {:?}", other))),
        }
    }
}

/// A single field condition. Operands stay textual until compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub op: FilterOp,
    pub values: Vec<String>,
}

/// Field conditions (all must hold) plus an optional free-text filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub conditions: Vec<Condition>,
    pub text: Option<String>,
}

impl FilterSpec {
    /// Create an empty filter matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single-operand condition.
    pub fn with(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<String>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op,
            values: vec![value.into()],
        });
        self
    }

    /// Add an equality condition.
    pub fn eq(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(field, FilterOp::Eq, value)
    }

    /// Add a membership condition.
    pub fn one_of(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op: FilterOp::In,
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Set the free-text filter.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text = (!text.trim().is_empty()).then_some(text);
        self
    }

    /// Parse textual `(key, value)` parameters.
    ///
    /// `key` is `field` or `field__op`; a value prefixed `in:` forces `in`;
    /// `in` operands are comma-separated. `q` sets the free-text filter and the
    /// other reserved keys are ignored.
    pub fn from_params<K, V>(params: impl IntoIterator<Item = (K, V)>) -> Result<Self, Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut spec = FilterSpec::new();

        for (key, value) in params {
            let key = key.as_ref().trim();
            let value = value.as_ref();
            if key == "q" {
                spec = spec.with_text(value);
                continue;
            }
            if key.is_empty() || RESERVED_PARAMS.contains(&key) {
                continue;
            }

            let (field, mut op) = match key.rsplit_once("__") {
                Some((field, op)) => (field, op.parse::<FilterOp>()?),
                None => (key, FilterOp::Eq),
            };

            let mut value = value;
            if let Some(rest) = value.strip_prefix("in:") {
                op = FilterOp::In;
                value = rest;
            }

            let values = if op == FilterOp::In {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(String::from)
                    .collect()
            } else {
                vec![value.trim().to_string()]
            };

            spec.conditions.push(Condition {
                field: field.to_string(),
                op,
                values,
            });
        }

        Ok(spec)
    }

    /// Check if the filter has no conditions and no text.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.text.is_none()
    }
}

/// How values of a field are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Numeric,
    Date,
    DateTime,
    Bool,
    Text,
}

impl Comparison {
    fn for_field(entity: &EntityDef, field: &str) -> Option<Self> {
        match field {
            "id" => return Some(Comparison::Text),
            "version" => return Some(Comparison::Numeric),
            "created_at" | "updated_at" => return Some(Comparison::DateTime),
            _ => {}
        }
        let def = entity.get_field(field)?;
        Some(match def.field_type {
            FieldType::Scalar(s) | FieldType::ArrayScalar(s) => match s {
                ScalarType::Int | ScalarType::Float => Comparison::Numeric,
                ScalarType::Date => Comparison::Date,
                ScalarType::DateTime => Comparison::DateTime,
                ScalarType::Bool => Comparison::Bool,
                ScalarType::String => Comparison::Text,
            },
            _ => Comparison::Text,
        })
    }
}

fn operand_date(s: &str) -> Option<NaiveDate> {
    parse_date(s).or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))
}

fn operand_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    parse_datetime(s).or_else(|| {
        parse_date(s)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().fixed_offset())
    })
}

/// Evaluates filters against records.
pub struct FilterEvaluator;

impl FilterEvaluator {
    /// Check whether `record` satisfies every condition and the text filter.
    pub fn matches(spec: &FilterSpec, entity: &EntityDef, record: &Record) -> bool {
        spec.conditions
            .iter()
            .all(|c| Self::condition_matches(c, entity, record))
            && spec
                .text
                .as_deref()
                .map_or(true, |text| Self::text_matches(text, record))
    }

    /// Evaluate one condition. Undeclared fields and null values never match.
    pub fn condition_matches(condition: &Condition, entity: &EntityDef, record: &Record) -> bool {
        let Some(comparison) = Comparison::for_field(entity, &condition.field) else {
            return false;
        };
        let Some(value) = record.field_value(&condition.field) else {
            return false;
        };

        match value {
            Value::Null => false,
            Value::Array(items) => {
                !condition.op.is_ordering()
                    && items
                        .iter()
                        .any(|item| Self::value_matches(comparison, condition, item))
            }
            single => Self::value_matches(comparison, condition, &single),
        }
    }

    fn value_matches(comparison: Comparison, condition: &Condition, value: &Value) -> bool {
        condition
            .values
            .iter()
            .any(|operand| Self::compare(comparison, condition.op, value, operand))
    }

    fn compare(comparison: Comparison, op: FilterOp, value: &Value, operand: &str) -> bool {
        let ordering = match (comparison, value) {
            (Comparison::Numeric, v) => match (v.as_f64(), operand.trim().parse::<f64>().ok()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
            (Comparison::Date, Value::Date(d)) => operand_date(operand).map(|o| d.cmp(&o)),
            (Comparison::DateTime, Value::DateTime(dt)) => {
                operand_datetime(operand).map(|o| dt.cmp(&o))
            }
            (Comparison::Bool, Value::Bool(b)) if !op.is_ordering() => {
                parse_bool(operand).map(|o| b.cmp(&o))
            }
            (Comparison::Text, v) if !op.is_ordering() => {
                Some(if v.to_key().to_lowercase() == operand.trim().to_lowercase() {
                    Ordering::Equal
                } else {
                    Ordering::Less
                })
            }
            _ => None,
        };
        ordering.is_some_and(|o| op.accepts(o))
    }

    /// Case-insensitive substring match over string-valued attributes.
    pub fn text_matches(text: &str, record: &Record) -> bool {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        record.attributes.values().any(|v| match v {
            Value::String(s) => s.to_lowercase().contains(&needle),
            Value::Array(items) => items
                .iter()
                .filter_map(|i| match i {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .any(|s| s.to_lowercase().contains(&needle)),
            _ => false,
        })
    }
}
