//! Stored records.

use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Attribute map keyed by declared field name.
pub type Attributes = BTreeMap<String, Value>;

/// Field names managed by the store itself.
pub const SYSTEM_FIELDS: [&str; 4] = ["id", "version", "created_at", "updated_at"];

/// Check whether `name` is a store-managed field.
pub fn is_system_field(name: &str) -> bool {
    SYSTEM_FIELDS.contains(&name)
}

/// A stored record of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Record id, unique within the entity and never reused.
    pub id: String,
    /// Fully-qualified entity name.
    pub entity: String,
    /// Version counter, starting at 1.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete flag.
    pub deleted: bool,
    /// Coerced attribute values.
    pub attributes: Attributes,
}

impl Record {
    /// Create a fresh record at version 1.
    pub fn new(
        entity: impl Into<String>,
        id: impl Into<String>,
        attributes: Attributes,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            entity: entity.into(),
            version: 1,
            created_at: now,
            updated_at: now,
            deleted: false,
            attributes,
        }
    }

    /// Check that the record is not soft-deleted.
    pub fn is_live(&self) -> bool {
        !self.deleted
    }

    /// Get an attribute value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Get any field, including system fields, as a value.
    pub fn field_value(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(Value::String(self.id.clone())),
            "version" => Some(Value::Int(self.version as i64)),
            "created_at" => Some(Value::DateTime(self.created_at.fixed_offset())),
            "updated_at" => Some(Value::DateTime(self.updated_at.fixed_offset())),
            _ => self.attributes.get(field).cloned(),
        }
    }

    /// Record an accepted mutation: bump the version by one and refresh the update time.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record() {
        let now = Utc::now();
        let mut attrs = Attributes::new();
        attrs.insert("amount".into(), Value::Int(10));

        let record = Record::new("billing.Invoice", "01A", attrs, now);
        assert_eq!(record.version, 1);
        assert_eq!(record.created_at, record.updated_at);
        assert!(record.is_live());
        assert_eq!(record.get("amount"), Some(&Value::Int(10)));
    }

    #[test]
    fn test_touch() {
        let now = Utc::now();
        let mut record = Record::new("billing.Invoice", "01A", Attributes::new(), now);
        let later = now + chrono::Duration::seconds(5);
        record.touch(later);

        assert_eq!(record.version, 2);
        assert_eq!(record.updated_at, later);
        assert_eq!(record.created_at, now);
    }

    #[test]
    fn test_system_field_values() {
        let record = Record::new("billing.Invoice", "01A", Attributes::new(), Utc::now());
        assert_eq!(record.field_value("id"), Some(Value::String("01A".into())));
        assert_eq!(record.field_value("version"), Some(Value::Int(1)));
        assert!(matches!(record.field_value("created_at"), Some(Value::DateTime(_))));
        assert_eq!(record.field_value("amount"), None);
        assert!(is_system_field("updated_at"));
        assert!(!is_system_field("amount"));
    }
}
