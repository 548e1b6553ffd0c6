//! Schema registry for Tessera.
//!
//! The catalog describes entities, their fields, reference policies and the
//! external enum catalogs fields may be bound to.

mod entity;
mod enums;
mod field;
mod lint;
mod relation;
mod schema;
mod types;

pub use entity::EntityDef;
pub use enums::{EnumCatalog, EnumItem};
pub use field::{FieldDef, FieldOptions};
pub use lint::SchemaIssue;
pub use relation::{DeleteBehavior, IncomingRef};
pub use schema::SchemaBundle;
pub use types::{FieldType, ScalarType};
