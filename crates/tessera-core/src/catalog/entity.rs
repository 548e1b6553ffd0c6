//! Entity definitions.

use super::field::FieldDef;
use serde::{Deserialize, Serialize};

/// An entity definition (collection schema).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity name (unique within its namespace).
    pub name: String,
    /// Owning namespace.
    pub namespace: String,
    /// Field definitions, in declaration order.
    pub fields: Vec<FieldDef>,
    /// Composite uniqueness sets.
    #[serde(default)]
    pub unique_together: Vec<Vec<String>>,
}

impl EntityDef {
    /// Create a new entity definition.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            fields: Vec::new(),
            unique_together: Vec::new(),
        }
    }

    /// Add a field to the entity.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a composite uniqueness set.
    pub fn with_unique_together(
        mut self,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.unique_together
            .push(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Fully-qualified name (`namespace.name`).
    pub fn fqn(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields carrying the `unique` option.
    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.options.unique)
    }

    /// Reference fields (single or array).
    pub fn reference_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.field_type.is_reference())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ScalarType;

    #[test]
    fn test_entity_builder() {
        let entity = EntityDef::new("billing", "Invoice")
            .with_field(FieldDef::scalar("number", ScalarType::String).unique())
            .with_field(FieldDef::scalar("amount", ScalarType::Int).required())
            .with_field(FieldDef::reference("customer", "Customer"))
            .with_unique_together(["number", "customer"]);

        assert_eq!(entity.fqn(), "billing.Invoice");
        assert_eq!(entity.fields.len(), 3);
        assert_eq!(entity.unique_fields().count(), 1);
        assert_eq!(entity.reference_fields().count(), 1);
        assert_eq!(entity.unique_together, vec![vec!["number", "customer"]]);
    }

    #[test]
    fn test_get_field() {
        let entity = EntityDef::new("billing", "Invoice")
            .with_field(FieldDef::scalar("amount", ScalarType::Int));

        assert!(entity.get_field("amount").is_some());
        assert!(entity.get_field("nonexistent").is_none());
    }
}
