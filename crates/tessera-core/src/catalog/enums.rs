//! External enum catalogs (named code lists).

use serde::{Deserialize, Serialize};

/// A single catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumItem {
    /// Stored code.
    pub code: String,
    /// Human-readable display name.
    #[serde(default)]
    pub name: String,
}

/// A named, ordered list of codes referenced by fields through the `catalog` option.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnumCatalog {
    /// Catalog name.
    #[serde(default)]
    pub name: String,
    /// Entries in display order.
    #[serde(default)]
    pub items: Vec<EnumItem>,
}

impl EnumCatalog {
    /// Create an empty catalog.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    /// Add an entry.
    pub fn with_item(mut self, code: impl Into<String>, name: impl Into<String>) -> Self {
        self.items.push(EnumItem {
            code: code.into(),
            name: name.into(),
        });
        self
    }

    /// Check code membership (exact match).
    pub fn contains(&self, code: &str) -> bool {
        self.items.iter().any(|item| item.code == code)
    }
}
