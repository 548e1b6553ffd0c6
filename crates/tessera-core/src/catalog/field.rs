//! Field definitions for entities.

use super::relation::DeleteBehavior;
use super::types::{FieldType, ScalarType};
use serde::{Deserialize, Serialize};

/// Per-field option bag.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldOptions {
    /// Missing or null values are rejected.
    pub required: bool,
    /// No two live records may share a value.
    pub unique: bool,
    /// Clients may never set the field.
    pub readonly: bool,
    /// Default applied on create when the value is missing or null.
    pub default: Option<serde_json::Value>,
    /// Name of an external enum catalog the value must belong to.
    pub catalog: Option<String>,
}

/// A field definition within an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field data type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Declared on-delete policy for reference fields.
    #[serde(default)]
    pub on_delete: Option<DeleteBehavior>,
    /// Field options.
    #[serde(flatten)]
    pub options: FieldOptions,
}

impl FieldDef {
    /// Create a new optional field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            on_delete: None,
            options: FieldOptions::default(),
        }
    }

    /// Create a scalar field.
    pub fn scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::new(name, FieldType::Scalar(scalar))
    }

    /// Create an inline enum field.
    pub fn enumeration(
        name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::new(name, FieldType::enum_type(values))
    }

    /// Create a single reference field.
    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, FieldType::reference(target))
    }

    /// Create an array of references field.
    pub fn array_ref(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, FieldType::array_ref(target))
    }

    /// Mark as required.
    pub fn required(mut self) -> Self {
        self.options.required = true;
        self
    }

    /// Mark as unique.
    pub fn unique(mut self) -> Self {
        self.options.unique = true;
        self
    }

    /// Mark as readonly.
    pub fn readonly(mut self) -> Self {
        self.options.readonly = true;
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.options.default = Some(default);
        self
    }

    /// Bind the field to an external enum catalog.
    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.options.catalog = Some(catalog.into());
        self
    }

    /// Set the on-delete policy.
    pub fn with_on_delete(mut self, on_delete: DeleteBehavior) -> Self {
        self.on_delete = Some(on_delete);
        self
    }

    /// The on-delete policy in effect (declared, else restrict).
    pub fn effective_on_delete(&self) -> DeleteBehavior {
        self.on_delete.unwrap_or_default()
    }

    /// Check if this field has a default value.
    pub fn has_default(&self) -> bool {
        self.options.default.is_some()
    }

    /// Catalog name, normalized for lookup.
    pub fn catalog_name(&self) -> Option<String> {
        self.options
            .catalog
            .as_deref()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_def_builder() {
        let field = FieldDef::scalar("code", ScalarType::String)
            .required()
            .unique()
            .with_default(serde_json::json!("N-000"));

        assert_eq!(field.name, "code");
        assert!(field.options.required);
        assert!(field.options.unique);
        assert!(!field.options.readonly);
        assert!(field.has_default());
    }

    #[test]
    fn test_reference_policy_defaults_to_restrict() {
        let field = FieldDef::reference("customer", "Customer");
        assert_eq!(field.effective_on_delete(), DeleteBehavior::Restrict);

        let field = field.with_on_delete(DeleteBehavior::SetNull);
        assert_eq!(field.effective_on_delete(), DeleteBehavior::SetNull);
    }

    #[test]
    fn test_catalog_name_normalized() {
        let field = FieldDef::scalar("currency", ScalarType::String).with_catalog(" Currencies ");
        assert_eq!(field.catalog_name().as_deref(), Some("currencies"));
    }

    #[test]
    fn test_flat_json_shape() {
        let field: FieldDef = serde_json::from_str(
            r#"{"name":"owner","type":{"ref":{"target":"User"}},"on_delete":"set_null","required":false}"#,
        )
        .unwrap();
        assert_eq!(field.field_type, FieldType::reference("User"));
        assert_eq!(field.on_delete, Some(DeleteBehavior::SetNull));
        assert!(!field.options.required);
    }
}
