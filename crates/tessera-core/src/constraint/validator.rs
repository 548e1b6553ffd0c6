//! Payload and integrity validation.
//!
//! Validation runs in two stages. Payload checks (protected fields, required,
//! type coercion, enum membership) need only the schema. Integrity checks
//! (reference existence, uniqueness, parent chains) read other records and
//! are re-run under the write lock when the store changed in between.

use super::coerce::coerce_value;
use super::tree::check_parent;
use crate::catalog::{EntityDef, SchemaBundle};
use crate::error::{Error, ErrorCode, FieldError};
use crate::storage::{is_system_field, Attributes, StoreConfig, StoreState};
use crate::value::Value;
use serde_json::{Map, Value as Json};
use tracing::debug;

/// Payload to validate.
pub type Payload = Map<String, Json>;

/// Kind of write being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// New record: defaults apply, every required field must be present.
    Create,
    /// Full replacement of an existing record.
    Replace,
    /// Merge-patch: only submitted fields are checked.
    Patch,
}

/// Validates writes to one entity.
pub struct Validator<'a> {
    schema: &'a SchemaBundle,
    entity: &'a EntityDef,
    fqn: String,
}

impl<'a> Validator<'a> {
    /// Create a validator for an entity of `schema`.
    pub fn new(schema: &'a SchemaBundle, entity: &'a EntityDef) -> Self {
        Self {
            schema,
            entity,
            fqn: entity.fqn(),
        }
    }

    /// Reject system and readonly fields, strip the `version` hint.
    ///
    /// Returns the hint if it was a non-negative integer (or a numeric string).
    pub fn check_protected(&self, payload: &mut Payload) -> Result<Option<u64>, Error> {
        let hint = payload.remove("version").and_then(|v| match v {
            Json::Number(n) => n.as_u64(),
            Json::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        });

        let mut errors: Vec<FieldError> = payload
            .keys()
            .filter(|k| is_system_field(k))
            .map(FieldError::readonly)
            .collect();

        errors.extend(
            self.entity
                .fields
                .iter()
                .filter(|f| f.options.readonly && payload.contains_key(&f.name))
                .map(|f| FieldError::readonly(&f.name)),
        );

        if errors.is_empty() {
            Ok(hint)
        } else {
            Err(Error::Validation(errors))
        }
    }

    /// Check required fields, coerce types and enum membership.
    ///
    /// Returns the coerced attributes for the declared fields present in the
    /// payload (plus applied defaults on create). For a patch, `current`
    /// supplies the stored attributes the patch is merged onto.
    pub fn validate_payload(
        &self,
        payload: &Payload,
        mode: WriteMode,
        current: Option<&Attributes>,
    ) -> Result<Attributes, Error> {
        let mut working = payload.clone();
        if mode == WriteMode::Create {
            self.apply_defaults(&mut working);
        }

        let undeclared: Vec<&String> = working
            .keys()
            .filter(|k| self.entity.get_field(k).is_none())
            .collect();
        if !undeclared.is_empty() {
            debug!(entity = %self.fqn, fields = ?undeclared, "dropping undeclared fields");
        }

        let mut errors = Vec::new();

        for field in self.entity.fields.iter().filter(|f| f.options.required) {
            let missing = match working.get(&field.name) {
                Some(Json::Null) => true,
                Some(_) => false,
                None => match mode {
                    WriteMode::Patch => current
                        .and_then(|c| c.get(&field.name))
                        .map_or(true, Value::is_null),
                    _ => true,
                },
            };
            if missing {
                errors.push(FieldError::required(&field.name));
            }
        }

        let mut attrs = Attributes::new();
        for field in &self.entity.fields {
            if errors.iter().any(|e| e.field == field.name) {
                continue;
            }
            let Some(raw) = working.get(&field.name) else {
                continue;
            };
            if raw.is_null() {
                attrs.insert(field.name.clone(), Value::Null);
                continue;
            }
            match coerce_value(field, raw) {
                Ok(value) => {
                    attrs.insert(field.name.clone(), value);
                }
                Err(e) => errors.push(e),
            }
        }

        for (name, value) in &attrs {
            if let Some(e) = self.check_membership(name, value) {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(attrs)
        } else {
            Err(Error::Validation(errors))
        }
    }

    /// Check references, uniqueness and the parent chain against store state.
    ///
    /// `attrs` are the coerced payload attributes; `own_id` is the record being
    /// written (excluded from uniqueness scans).
    pub fn check_integrity(
        &self,
        state: &StoreState,
        config: &StoreConfig,
        own_id: Option<&str>,
        attrs: &Attributes,
    ) -> Result<(), Error> {
        let mut errors = Vec::new();

        self.check_references(state, attrs, &mut errors);
        self.check_unique(state, own_id, attrs, &mut errors);
        self.check_composite(state, own_id, attrs, &mut errors);

        if let Some(e) = check_parent(state, config, self.entity, own_id, attrs) {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errors))
        }
    }

    /// Field and composite uniqueness only.
    pub fn check_uniqueness(
        &self,
        state: &StoreState,
        own_id: Option<&str>,
        attrs: &Attributes,
    ) -> Result<(), Error> {
        let mut errors = Vec::new();
        self.check_unique(state, own_id, attrs, &mut errors);
        self.check_composite(state, own_id, attrs, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errors))
        }
    }

    fn apply_defaults(&self, working: &mut Payload) {
        for field in &self.entity.fields {
            if field.field_type.is_reference() {
                continue;
            }
            let Some(default) = &field.options.default else {
                continue;
            };
            if !working.get(&field.name).map_or(true, Json::is_null) {
                continue;
            }
            if coerce_value(field, default).is_ok() {
                working.insert(field.name.clone(), default.clone());
            } else {
                debug!(entity = %self.fqn, field = %field.name, "ignoring default that fails coercion");
            }
        }
    }

    fn check_membership(&self, name: &str, value: &Value) -> Option<FieldError> {
        let field = self.entity.get_field(name)?;
        let elements: Vec<&Value> = match value {
            Value::Null => return None,
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        if let Some(values) = field.field_type.enum_values().filter(|v| !v.is_empty()) {
            if elements
                .iter()
                .any(|e| !values.iter().any(|allowed| *allowed == e.to_key()))
            {
                return Some(invalid_value(name));
            }
        }

        if let Some(catalog_name) = field.catalog_name() {
            let Some(catalog) = self.schema.catalog(&catalog_name) else {
                return Some(FieldError::new(
                    name,
                    ErrorCode::EnumInvalid,
                    format!("unknown catalog '{}'", catalog_name),
                ));
            };
            if elements.iter().any(|e| !catalog.contains(&e.to_key())) {
                return Some(invalid_value(name));
            }
        }

        None
    }

    fn check_references(&self, state: &StoreState, attrs: &Attributes, errors: &mut Vec<FieldError>) {
        for field in self.entity.reference_fields() {
            let Some(value) = attrs.get(&field.name).filter(|v| !v.is_null()) else {
                continue;
            };
            let target = field
                .field_type
                .ref_target()
                .and_then(|t| self.schema.resolve_target(&self.entity.namespace, t));
            let Some(target) = target else {
                errors.push(FieldError::new(
                    &field.name,
                    ErrorCode::RefNotFound,
                    "reference target not found",
                ));
                continue;
            };

            match value {
                Value::Array(items) => {
                    for (index, item) in items.iter().enumerate() {
                        let live = item
                            .as_ref_id()
                            .is_some_and(|id| state.get_live(&target, id).is_some());
                        if !live {
                            errors.push(FieldError::new(
                                &field.name,
                                ErrorCode::RefNotFound,
                                format!("referenced id at index {} not found", index),
                            ));
                        }
                    }
                }
                single => {
                    let live = single
                        .as_ref_id()
                        .is_some_and(|id| state.get_live(&target, id).is_some());
                    if !live {
                        errors.push(FieldError::new(
                            &field.name,
                            ErrorCode::RefNotFound,
                            "referenced id not found",
                        ));
                    }
                }
            }
        }
    }

    fn check_unique(
        &self,
        state: &StoreState,
        own_id: Option<&str>,
        attrs: &Attributes,
        errors: &mut Vec<FieldError>,
    ) {
        for field in self.entity.unique_fields() {
            let Some(needle) = attrs.get(&field.name).filter(|v| !v.is_null()) else {
                continue;
            };
            let needle = needle.to_key();
            let taken = state
                .live_records(&self.fqn)
                .filter(|r| Some(r.id.as_str()) != own_id)
                .any(|r| {
                    r.get(&field.name)
                        .is_some_and(|v| !v.is_null() && v.to_key() == needle)
                });
            if taken {
                errors.push(FieldError::new(
                    &field.name,
                    ErrorCode::UniqueViolation,
                    "value must be unique",
                ));
            }
        }
    }

    fn check_composite(
        &self,
        state: &StoreState,
        own_id: Option<&str>,
        attrs: &Attributes,
        errors: &mut Vec<FieldError>,
    ) {
        for set in &self.entity.unique_together {
            let Some(keys) = composite_key(set, |f| attrs.get(f)) else {
                continue;
            };
            let taken = state
                .live_records(&self.fqn)
                .filter(|r| Some(r.id.as_str()) != own_id)
                .any(|r| composite_key(set, |f| r.get(f)).as_ref() == Some(&keys));
            if taken {
                errors.push(FieldError::new(
                    set[0].as_str(),
                    ErrorCode::UniqueViolation,
                    format!("combination of ({}) must be unique", set.join(", ")),
                ));
            }
        }
    }
}

/// Stringified values of every member, or `None` if any is missing or null.
fn composite_key<'v>(
    set: &[String],
    lookup: impl Fn(&str) -> Option<&'v Value>,
) -> Option<Vec<String>> {
    if set.is_empty() {
        return None;
    }
    set.iter()
        .map(|f| lookup(f).filter(|v| !v.is_null()).map(Value::to_key))
        .collect()
}

fn invalid_value(field: &str) -> FieldError {
    FieldError::new(
        field,
        ErrorCode::EnumInvalid,
        format!("invalid value for '{}'", field),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EnumCatalog, FieldDef, ScalarType};
    use crate::storage::Record;
    use chrono::Utc;
    use serde_json::json;

    fn schema() -> SchemaBundle {
        SchemaBundle::new(1)
            .with_entity(
                EntityDef::new("billing", "Invoice")
                    .with_field(FieldDef::scalar("number", ScalarType::String).unique())
                    .with_field(FieldDef::scalar("amount", ScalarType::Int).required())
                    .with_field(FieldDef::enumeration("status", ["Draft", "Booked"]))
                    .with_field(
                        FieldDef::scalar("currency", ScalarType::String)
                            .with_catalog("Currencies")
                            .with_default(json!("USD")),
                    )
                    .with_field(FieldDef::scalar("paid", ScalarType::Bool).with_default(json!("nope")))
                    .with_field(FieldDef::scalar("locked", ScalarType::Bool).readonly())
                    .with_field(FieldDef::reference("customer", "crm.Customer"))
                    .with_unique_together(["number", "customer"]),
            )
            .with_entity(EntityDef::new("crm", "Customer"))
            .with_catalog(EnumCatalog::new("currencies").with_item("USD", "US Dollar"))
    }

    fn payload(value: Json) -> Payload {
        match value {
            Json::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    fn codes(err: Error) -> Vec<(String, ErrorCode)> {
        err.field_errors()
            .into_iter()
            .map(|e| (e.field, e.code))
            .collect()
    }

    #[test]
    fn test_protected_fields() {
        let schema = schema();
        let v = Validator::new(&schema, schema.get_entity("billing.Invoice").unwrap());

        let mut p = payload(json!({"amount": 1, "version": 3}));
        assert_eq!(v.check_protected(&mut p).unwrap(), Some(3));
        assert!(!p.contains_key("version"));

        let mut p = payload(json!({"version": "7"}));
        assert_eq!(v.check_protected(&mut p).unwrap(), Some(7));

        let mut p = payload(json!({"id": "x", "locked": true, "created_at": "now"}));
        let err = v.check_protected(&mut p).unwrap_err();
        assert_eq!(
            codes(err),
            vec![
                ("created_at".to_string(), ErrorCode::ReadonlyField),
                ("id".to_string(), ErrorCode::ReadonlyField),
                ("locked".to_string(), ErrorCode::ReadonlyField),
            ]
        );
    }

    #[test]
    fn test_create_applies_defaults() {
        let schema = schema();
        let v = Validator::new(&schema, schema.get_entity("billing.Invoice").unwrap());

        let attrs = v
            .validate_payload(&payload(json!({"amount": 5, "extra": 1})), WriteMode::Create, None)
            .unwrap();
        assert_eq!(attrs.get("currency"), Some(&Value::String("USD".into())));
        assert!(attrs.get("paid").is_none());
        assert!(attrs.get("extra").is_none());
    }

    #[test]
    fn test_payload_errors_accumulate() {
        let schema = schema();
        let v = Validator::new(&schema, schema.get_entity("billing.Invoice").unwrap());

        let err = v
            .validate_payload(
                &payload(json!({"status": "Paid", "currency": "EUR", "number": 7})),
                WriteMode::Replace,
                None,
            )
            .unwrap_err();
        assert_eq!(
            codes(err),
            vec![
                ("amount".to_string(), ErrorCode::Required),
                ("number".to_string(), ErrorCode::TypeMismatch),
                ("currency".to_string(), ErrorCode::EnumInvalid),
                ("status".to_string(), ErrorCode::EnumInvalid),
            ]
        );
    }

    #[test]
    fn test_patch_required_uses_current() {
        let schema = schema();
        let v = Validator::new(&schema, schema.get_entity("billing.Invoice").unwrap());
        let mut current = Attributes::new();
        current.insert("amount".into(), Value::Int(10));

        let attrs = v
            .validate_payload(&payload(json!({"status": "Booked"})), WriteMode::Patch, Some(&current))
            .unwrap();
        assert_eq!(attrs.len(), 1);

        let err = v
            .validate_payload(&payload(json!({"amount": null})), WriteMode::Patch, Some(&current))
            .unwrap_err();
        assert_eq!(codes(err), vec![("amount".to_string(), ErrorCode::Required)]);
    }

    #[test]
    fn test_integrity_checks() {
        let schema = schema();
        let entity = schema.get_entity("billing.Invoice").unwrap();
        let v = Validator::new(&schema, entity);
        let config = StoreConfig::default();

        let mut state = StoreState::new(schema.clone());
        state.insert(Record::new("crm.Customer", "C1", Attributes::new(), Utc::now()));
        let mut existing = Attributes::new();
        existing.insert("number".into(), Value::String("INV-1".into()));
        existing.insert("customer".into(), Value::Ref("C1".into()));
        state.insert(Record::new("billing.Invoice", "I1", existing.clone(), Utc::now()));

        // Same record is excluded from its own uniqueness scan.
        assert!(v.check_integrity(&state, &config, Some("I1"), &existing).is_ok());

        let err = v.check_integrity(&state, &config, None, &existing).unwrap_err();
        assert_eq!(
            codes(err),
            vec![
                ("number".to_string(), ErrorCode::UniqueViolation),
                ("number".to_string(), ErrorCode::UniqueViolation),
            ]
        );

        let mut dangling = Attributes::new();
        dangling.insert("customer".into(), Value::Ref("nope".into()));
        let err = v.check_integrity(&state, &config, None, &dangling).unwrap_err();
        assert_eq!(codes(err), vec![("customer".to_string(), ErrorCode::RefNotFound)]);
    }
}
