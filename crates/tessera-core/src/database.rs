//! Database facade combining the storage engine, schema and executors.
//!
//! Entity names may be given as `namespace.Name` or as a short name that is
//! unique across namespaces.

use std::sync::Arc;

use tracing::info;

use crate::cascade::{find_references, Reference};
use crate::catalog::SchemaBundle;
use crate::constraint::Payload;
use crate::error::{Error, Result};
use crate::mutation::{entity_def, DeleteOutcome, MutationExecutor};
use crate::query::{FilterSpec, ListQuery, LookupItem, QueryExecutor, QueryResult};
use crate::storage::{IdGenerator, Record, StorageEngine, StoreConfig};

/// One item of a bulk patch.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchItem {
    /// Record to patch.
    pub id: String,
    /// Expected version; takes priority over a `version` key in the patch.
    pub version: Option<u64>,
    /// Merge-patch body.
    pub patch: Payload,
}

impl PatchItem {
    /// Create a patch item.
    pub fn new(id: impl Into<String>, version: Option<u64>, patch: Payload) -> Self {
        Self {
            id: id.into(),
            version,
            patch,
        }
    }
}

/// The record store.
///
/// `Database` is `Send + Sync`; share it behind an `Arc`.
#[derive(Debug)]
pub struct Database {
    engine: StorageEngine,
    config: StoreConfig,
}

impl Database {
    /// Open an empty store for `schema` with default configuration.
    pub fn new(schema: SchemaBundle) -> Result<Self> {
        Self::with_config(schema, StoreConfig::default())
    }

    /// Open an empty store with a configuration.
    pub fn with_config(schema: SchemaBundle, config: StoreConfig) -> Result<Self> {
        lint(&schema)?;
        Ok(Self {
            engine: StorageEngine::new(schema),
            config,
        })
    }

    /// Open an empty store with a custom id source.
    pub fn with_id_generator(
        schema: SchemaBundle,
        config: StoreConfig,
        ids: Box<dyn IdGenerator>,
    ) -> Result<Self> {
        lint(&schema)?;
        Ok(Self {
            engine: StorageEngine::with_id_generator(schema, ids),
            config,
        })
    }

    /// Store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Current schema.
    pub fn schema(&self) -> Arc<SchemaBundle> {
        self.engine.schema()
    }

    /// Resolve an entity name to its fully-qualified form.
    pub fn resolve(&self, entity: &str) -> Result<String> {
        self.engine
            .schema()
            .resolve("", entity)
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))
    }

    fn mutations(&self) -> MutationExecutor<'_> {
        MutationExecutor::new(&self.engine, &self.config)
    }

    /// Create a record.
    pub fn create(&self, entity: &str, attrs: Payload) -> Result<Record> {
        let fqn = self.resolve(entity)?;
        self.mutations().create(&fqn, attrs)
    }

    /// Get a live record. Soft-deleted records yield `Error::Deleted`.
    pub fn get(&self, entity: &str, id: &str) -> Result<Record> {
        let fqn = self.resolve(entity)?;
        let state = self.engine.read();
        match state.get(&fqn, id) {
            Some(record) if record.is_live() => Ok(record.clone()),
            Some(_) => Err(Error::Deleted { entity: fqn, id: id.to_string() }),
            None => Err(Error::NotFound { entity: fqn, id: id.to_string() }),
        }
    }

    /// Filter, sort and paginate live records.
    pub fn list(&self, entity: &str, query: &ListQuery) -> Result<QueryResult> {
        let fqn = self.resolve(entity)?;
        let state = self.engine.read();
        let def = entity_def(&state.schema, &fqn)?;
        Ok(QueryExecutor::new(&state, &self.config).list(def, query))
    }

    /// Count live records matching a filter.
    pub fn count(&self, entity: &str, filter: &FilterSpec) -> Result<usize> {
        let fqn = self.resolve(entity)?;
        let state = self.engine.read();
        let def = entity_def(&state.schema, &fqn)?;
        Ok(QueryExecutor::new(&state, &self.config).count(def, filter))
    }

    /// Autocomplete over a label field (the display field when `field` is unset).
    pub fn lookup(
        &self,
        entity: &str,
        field: Option<&str>,
        q: &str,
        limit: Option<usize>,
    ) -> Result<Vec<LookupItem>> {
        let fqn = self.resolve(entity)?;
        let state = self.engine.read();
        let def = entity_def(&state.schema, &fqn)?;
        Ok(QueryExecutor::new(&state, &self.config).lookup(def, field, q, limit))
    }

    /// Replace all attributes. `expected` falls back to the payload `version`.
    pub fn replace(&self, entity: &str, id: &str, expected: Option<u64>, attrs: Payload) -> Result<Record> {
        let fqn = self.resolve(entity)?;
        self.mutations().replace(&fqn, id, expected, attrs)
    }

    /// Merge-patch attributes. `expected` falls back to the payload `version`.
    pub fn merge_patch(&self, entity: &str, id: &str, expected: Option<u64>, patch: Payload) -> Result<Record> {
        let fqn = self.resolve(entity)?;
        self.mutations().patch(&fqn, id, expected, patch)
    }

    /// Soft-delete a record; `expected` is checked when given.
    pub fn soft_delete(&self, entity: &str, id: &str, expected: Option<u64>) -> Result<DeleteOutcome> {
        let fqn = self.resolve(entity)?;
        self.mutations().delete(&fqn, id, expected)
    }

    /// Restore a soft-deleted record.
    pub fn restore(&self, entity: &str, id: &str) -> Result<Record> {
        let fqn = self.resolve(entity)?;
        self.mutations().restore(&fqn, id)
    }

    /// Create each item independently.
    pub fn bulk_create(&self, entity: &str, items: Vec<Payload>) -> Result<Vec<Result<Record>>> {
        let fqn = self.resolve(entity)?;
        let exec = self.mutations();
        Ok(items.into_iter().map(|attrs| exec.create(&fqn, attrs)).collect())
    }

    /// Patch each item independently.
    pub fn bulk_patch(&self, entity: &str, items: Vec<PatchItem>) -> Result<Vec<Result<Record>>> {
        let fqn = self.resolve(entity)?;
        let exec = self.mutations();
        Ok(items
            .into_iter()
            .map(|item| exec.patch(&fqn, &item.id, item.version, item.patch))
            .collect())
    }

    /// Soft-delete each id independently.
    pub fn bulk_delete<I, S>(&self, entity: &str, ids: I) -> Result<Vec<Result<DeleteOutcome>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fqn = self.resolve(entity)?;
        let exec = self.mutations();
        Ok(ids
            .into_iter()
            .map(|id| exec.delete(&fqn, id.as_ref(), None))
            .collect())
    }

    /// Restore each id independently.
    pub fn bulk_restore<I, S>(&self, entity: &str, ids: I) -> Result<Vec<Result<Record>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fqn = self.resolve(entity)?;
        let exec = self.mutations();
        Ok(ids.into_iter().map(|id| exec.restore(&fqn, id.as_ref())).collect())
    }

    /// Every live record referencing a record.
    pub fn incoming_references(&self, entity: &str, id: &str) -> Result<Vec<Reference>> {
        let fqn = self.resolve(entity)?;
        let state = self.engine.read();
        if state.get(&fqn, id).is_none() {
            return Err(Error::NotFound { entity: fqn, id: id.to_string() });
        }
        Ok(find_references(&state, &fqn, id))
    }

    /// Lint and atomically swap in a new schema. Records are kept as stored.
    ///
    /// The new bundle's version is raised above the current one if needed.
    pub fn reload_schema(&self, mut schema: SchemaBundle) -> Result<u64> {
        lint(&schema)?;
        let mut state = self.engine.write();
        if schema.version <= state.schema.version {
            schema.version = state.schema.version + 1;
        }
        let version = schema.version;
        state.replace_schema(schema);
        info!(schema_version = version, entities = state.schema.entities.len(), "schema reloaded");
        Ok(version)
    }
}

fn lint(schema: &SchemaBundle) -> Result<()> {
    let issues = schema.lint();
    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::SchemaLint(issues))
    }
}
