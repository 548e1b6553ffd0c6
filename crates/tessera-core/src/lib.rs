//! Tessera Core - schema-driven in-memory record store.
//!
//! This crate provides validation and coercion against a schema, referential
//! integrity on soft delete, optimistic concurrency, and filtered, sorted,
//! paginated queries over arbitrary entity collections.

pub mod cascade;
pub mod catalog;
pub mod constraint;
pub mod database;
pub mod error;
pub mod mutation;
pub mod query;
pub mod storage;
pub mod value;

pub use cascade::{CascadeResult, Reference, MAX_CASCADE_DEPTH};
pub use catalog::{
    DeleteBehavior, EntityDef, EnumCatalog, EnumItem, FieldDef, FieldOptions, FieldType,
    SchemaBundle, SchemaIssue, ScalarType,
};
pub use constraint::Payload;
pub use database::{Database, PatchItem};
pub use error::{CascadeError, Error, ErrorCode, FieldError, Result};
pub use mutation::DeleteOutcome;
pub use query::{FilterOp, FilterSpec, ListQuery, LookupItem, NullsOrder, QueryResult, SortKey};
pub use storage::{IdGenerator, Record, StoreConfig, UlidGenerator};
pub use value::Value;
