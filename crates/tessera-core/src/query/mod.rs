//! Query engine for Tessera.
//!
//! Operator-based filtering with type-aware comparison, multi-key sorting
//! and pagination over the live records of one entity.

mod executor;
mod filter;
mod sort;

pub use executor::{display_field, ListQuery, LookupItem, QueryExecutor, QueryResult};
pub use filter::{Condition, FilterEvaluator, FilterOp, FilterSpec, RESERVED_PARAMS};
pub use sort::{compare_records, sort_records, NullsOrder, SortDirection, SortKey};
