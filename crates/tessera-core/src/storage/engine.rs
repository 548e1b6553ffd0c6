//! In-memory storage engine.
//!
//! All state (schema, per-entity tables, commit epoch) sits behind one
//! reader-writer lock. Readers share it; a writer holds it only while applying
//! an already-validated mutation.

use super::id::{IdGenerator, UlidGenerator};
use super::record::Record;
use crate::catalog::SchemaBundle;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Records of one entity keyed by id. Ids sort by creation time.
pub type Table = BTreeMap<String, Record>;

/// Everything guarded by the store lock.
#[derive(Debug)]
pub struct StoreState {
    /// Current schema.
    pub schema: Arc<SchemaBundle>,
    /// Per-entity tables keyed by fully-qualified name.
    pub tables: HashMap<String, Table>,
    /// Bumped on every committed write and every schema swap.
    pub epoch: u64,
}

impl StoreState {
    /// Create an empty state for a schema.
    pub fn new(schema: SchemaBundle) -> Self {
        Self {
            schema: Arc::new(schema),
            tables: HashMap::new(),
            epoch: 0,
        }
    }

    /// Look up a record regardless of its delete flag.
    pub fn get(&self, entity: &str, id: &str) -> Option<&Record> {
        self.tables.get(entity).and_then(|t| t.get(id))
    }

    /// Mutable record lookup.
    pub fn get_mut(&mut self, entity: &str, id: &str) -> Option<&mut Record> {
        self.tables.get_mut(entity).and_then(|t| t.get_mut(id))
    }

    /// Look up a live record.
    pub fn get_live(&self, entity: &str, id: &str) -> Option<&Record> {
        self.get(entity, id).filter(|r| r.is_live())
    }

    /// All records of an entity in id order.
    pub fn records<'a>(&'a self, entity: &str) -> impl Iterator<Item = &'a Record> + 'a {
        self.tables.get(entity).into_iter().flat_map(|t| t.values())
    }

    /// Live records of an entity in id order.
    pub fn live_records<'a>(&'a self, entity: &str) -> impl Iterator<Item = &'a Record> + 'a {
        self.records(entity).filter(|r| r.is_live())
    }

    /// Insert a new record.
    pub fn insert(&mut self, record: Record) {
        self.tables
            .entry(record.entity.clone())
            .or_default()
            .insert(record.id.clone(), record);
    }

    /// Mark a committed write.
    pub fn commit(&mut self) {
        self.epoch += 1;
    }

    /// Swap in a new schema.
    pub fn replace_schema(&mut self, schema: SchemaBundle) {
        self.schema = Arc::new(schema);
        self.epoch += 1;
    }
}

/// Lock-guarded store state plus the id source.
pub struct StorageEngine {
    state: RwLock<StoreState>,
    ids: Box<dyn IdGenerator>,
}

impl StorageEngine {
    /// Create an empty engine using ULID ids.
    pub fn new(schema: SchemaBundle) -> Self {
        Self::with_id_generator(schema, Box::new(UlidGenerator::new()))
    }

    /// Create an empty engine with a custom id source.
    pub fn with_id_generator(schema: SchemaBundle, ids: Box<dyn IdGenerator>) -> Self {
        Self {
            state: RwLock::new(StoreState::new(schema)),
            ids,
        }
    }

    /// Shared access.
    pub fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read()
    }

    /// Exclusive access.
    pub fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write()
    }

    /// Current schema snapshot.
    pub fn schema(&self) -> Arc<SchemaBundle> {
        self.state.read().schema.clone()
    }

    /// Current commit epoch.
    pub fn epoch(&self) -> u64 {
        self.state.read().epoch
    }

    /// Generate a new record id.
    pub fn generate_id(&self) -> String {
        self.ids.next_id()
    }
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("epoch", &self.epoch())
            .finish_non_exhaustive()
    }
}
