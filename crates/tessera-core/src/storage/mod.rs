//! Storage layer for Tessera.
//!
//! This module provides the in-memory record store: records, id generation,
//! store configuration and the lock-guarded engine.

mod config;
mod engine;
mod id;
mod record;

pub use config::StoreConfig;
pub use engine::{StorageEngine, StoreState, Table};
pub use id::{IdGenerator, UlidGenerator};
pub use record::{is_system_field, Attributes, Record, SYSTEM_FIELDS};
