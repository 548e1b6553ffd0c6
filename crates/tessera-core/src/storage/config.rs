//! Store configuration.

use crate::query::NullsOrder;
use serde::{Deserialize, Serialize};

/// Configuration for the record store and its query engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Page size when a query does not set a limit.
    pub default_limit: usize,

    /// Upper bound on any requested page size.
    pub max_limit: usize,

    /// Result count for lookups without an explicit limit.
    pub lookup_limit: usize,

    /// Upper bound on lookup result counts.
    pub max_lookup_limit: usize,

    /// Null placement for sorts that do not specify one.
    pub default_nulls: NullsOrder,

    /// Name of the self-referencing parent pointer field.
    pub parent_field: String,

    /// Maximum number of parent links followed when checking for cycles.
    pub max_parent_depth: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 1000,
            lookup_limit: 10,
            max_lookup_limit: 100,
            default_nulls: NullsOrder::Last,
            parent_field: "parent_id".to_string(),
            max_parent_depth: 2048,
        }
    }
}

impl StoreConfig {
    /// Set the default page size.
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    /// Set the page size bound.
    pub fn with_max_limit(mut self, limit: usize) -> Self {
        self.max_limit = limit;
        self
    }

    /// Set the default and maximum lookup sizes.
    pub fn with_lookup_limits(mut self, default: usize, max: usize) -> Self {
        self.lookup_limit = default;
        self.max_lookup_limit = max;
        self
    }

    /// Set the default null placement.
    pub fn with_default_nulls(mut self, nulls: NullsOrder) -> Self {
        self.default_nulls = nulls;
        self
    }

    /// Set the parent pointer field name.
    pub fn with_parent_field(mut self, field: impl Into<String>) -> Self {
        self.parent_field = field.into();
        self
    }

    /// Set the parent chain walk bound.
    pub fn with_max_parent_depth(mut self, depth: usize) -> Self {
        self.max_parent_depth = depth;
        self
    }

    /// Clamp a requested page size. Zero or missing means the default.
    pub fn page_limit(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(n) if n > 0 => n.min(self.max_limit),
            _ => self.default_limit.min(self.max_limit),
        }
    }

    /// Clamp a requested lookup size.
    pub fn lookup_size(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(n) if n > 0 => n.min(self.max_lookup_limit),
            _ => self.lookup_limit.min(self.max_lookup_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.default_limit, 50);
        assert_eq!(config.max_limit, 1000);
        assert_eq!(config.parent_field, "parent_id");
        assert_eq!(config.max_parent_depth, 2048);
        assert_eq!(config.default_nulls, NullsOrder::Last);
    }

    #[test]
    fn test_limit_clamping() {
        let config = StoreConfig::default();
        assert_eq!(config.page_limit(None), 50);
        assert_eq!(config.page_limit(Some(0)), 50);
        assert_eq!(config.page_limit(Some(20)), 20);
        assert_eq!(config.page_limit(Some(5000)), 1000);

        assert_eq!(config.lookup_size(None), 10);
        assert_eq!(config.lookup_size(Some(500)), 100);
    }

    #[test]
    fn test_builder_and_partial_json() {
        let config = StoreConfig::default()
            .with_max_limit(200)
            .with_parent_field("parent");
        assert_eq!(config.max_limit, 200);
        assert_eq!(config.parent_field, "parent");

        let parsed: StoreConfig = serde_json::from_str(r#"{"default_limit": 25}"#).unwrap();
        assert_eq!(parsed.default_limit, 25);
        assert_eq!(parsed.max_limit, 1000);
    }
}
