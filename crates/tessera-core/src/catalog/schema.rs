//! Schema bundle - immutable snapshot of every entity and enum catalog.

use super::relation::IncomingRef;
use super::{EntityDef, EnumCatalog};
use std::collections::BTreeMap;

/// An immutable snapshot of the entire schema.
///
/// A bundle is never edited in place once handed to a store; reloading swaps
/// in a whole new bundle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaBundle {
    /// Schema version (monotonically increasing across swaps).
    pub version: u64,
    /// Entity definitions keyed by fully-qualified name.
    pub entities: BTreeMap<String, EntityDef>,
    /// Enum catalogs keyed by lowercase name.
    pub catalogs: BTreeMap<String, EnumCatalog>,
}

impl SchemaBundle {
    /// Create an empty schema bundle.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            entities: BTreeMap::new(),
            catalogs: BTreeMap::new(),
        }
    }

    /// Add an entity to the schema.
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.insert(entity.fqn(), entity);
        self
    }

    /// Add an enum catalog to the schema.
    pub fn with_catalog(mut self, catalog: EnumCatalog) -> Self {
        self.catalogs
            .insert(catalog.name.trim().to_lowercase(), catalog);
        self
    }

    /// Get an entity by fully-qualified name.
    pub fn get_entity(&self, fqn: &str) -> Option<&EntityDef> {
        self.entities.get(fqn)
    }

    /// Get a catalog by name (case-insensitive).
    pub fn catalog(&self, name: &str) -> Option<&EnumCatalog> {
        self.catalogs.get(&name.trim().to_lowercase())
    }

    /// List all entity names.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.keys().map(|s| s.as_str()).collect()
    }

    /// Resolve a possibly-partial entity name to its fully-qualified name.
    ///
    /// With a namespace: exact match first, then case-insensitive. Without a
    /// namespace (or with a dotted `name`): the short name must be unique
    /// across all namespaces.
    pub fn resolve(&self, namespace: &str, name: &str) -> Option<String> {
        let namespace = namespace.trim();
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        if namespace.is_empty() {
            if let Some((ns, short)) = name.split_once('.') {
                if !ns.is_empty() {
                    return self.resolve(ns, short);
                }
            }
        } else {
            let exact = format!("{}.{}", namespace, name);
            if self.entities.contains_key(&exact) {
                return Some(exact);
            }
            return self
                .entities
                .values()
                .find(|e| {
                    e.namespace.eq_ignore_ascii_case(namespace) && e.name.eq_ignore_ascii_case(name)
                })
                .map(|e| e.fqn());
        }

        let mut found = None;
        for entity in self.entities.values() {
            if entity.name.eq_ignore_ascii_case(name) {
                if found.is_some() {
                    return None;
                }
                found = Some(entity.fqn());
            }
        }
        found
    }

    /// Resolve a reference target declared on an entity of `owner_namespace`.
    ///
    /// Short targets are looked up in the owner's namespace before falling back
    /// to a unique match across the schema.
    pub fn resolve_target(&self, owner_namespace: &str, target: &str) -> Option<String> {
        let target = target.trim();
        if target.contains('.') {
            return self.resolve("", target);
        }
        self.resolve(owner_namespace, target)
            .or_else(|| self.resolve("", target))
    }

    /// All fields, across the schema, whose reference target is `target_fqn`.
    pub fn incoming_refs(&self, target_fqn: &str) -> Vec<IncomingRef> {
        let mut refs = Vec::new();
        for (fqn, entity) in &self.entities {
            for field in entity.reference_fields() {
                let Some(target) = field.field_type.ref_target() else {
                    continue;
                };
                if self.resolve_target(&entity.namespace, target).as_deref() != Some(target_fqn) {
                    continue;
                }
                refs.push(IncomingRef {
                    from_entity: fqn.clone(),
                    field: field.name.clone(),
                    on_delete: field.effective_on_delete(),
                });
            }
        }
        refs
    }
}
