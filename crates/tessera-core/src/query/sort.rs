//! Multi-key record sorting.
//!
//! Non-null values compare lexically by their string form. Null placement is
//! decided before direction is applied, so `nulls=last` holds for both
//! ascending and descending keys.

use crate::error::Error;
use crate::storage::Record;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Where records lacking a sort value go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullsOrder {
    First,
    #[default]
    Last,
}

impl FromStr for NullsOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(NullsOrder::First),
            "last" => Ok(NullsOrder::Last),
            other => Err(Error::InvalidQuery(format!(
                "nulls must be first or last, got {:?}",
                other
            ))),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    /// Ascending key.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Descending key.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Parse `-amount,name` into keys; a leading `-` means descending.
    pub fn parse_list(spec: &str) -> Vec<SortKey> {
        spec.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| match s.strip_prefix('-') {
                Some(field) if !field.trim().is_empty() => Some(SortKey::desc(field.trim())),
                Some(_) => None,
                None => Some(SortKey::asc(s.trim_start_matches('+'))),
            })
            .collect()
    }
}

fn sort_value(record: &Record, field: &str) -> Option<String> {
    match record.field_value(field) {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.to_key()),
    }
}

/// Compare two records by `keys`, left to right.
pub fn compare_records(a: &Record, b: &Record, keys: &[SortKey], nulls: NullsOrder) -> Ordering {
    for key in keys {
        let ordering = match (sort_value(a, &key.field), sort_value(b, &key.field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => match nulls {
                NullsOrder::First => Ordering::Less,
                NullsOrder::Last => Ordering::Greater,
            },
            (Some(_), None) => match nulls {
                NullsOrder::First => Ordering::Greater,
                NullsOrder::Last => Ordering::Less,
            },
            (Some(x), Some(y)) => match key.direction {
                SortDirection::Asc => x.cmp(&y),
                SortDirection::Desc => y.cmp(&x),
            },
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Stable in-place sort.
pub fn sort_records(records: &mut [&Record], keys: &[SortKey], nulls: NullsOrder) {
    if keys.is_empty() {
        return;
    }
    records.sort_by(|a, b| compare_records(a, b, keys, nulls));
}
