//! Reference relationships between entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Behavior when a referenced record is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteBehavior {
    /// Prevent deletion while live references exist.
    #[default]
    Restrict,
    /// Clear the reference (null for single refs, element removal for arrays).
    SetNull,
    /// Soft-delete the referencing records as well.
    Cascade,
}

impl DeleteBehavior {
    /// Policy name as written in schemas.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteBehavior::Restrict => "restrict",
            DeleteBehavior::SetNull => "set_null",
            DeleteBehavior::Cascade => "cascade",
        }
    }
}

impl fmt::Display for DeleteBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeleteBehavior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "restrict" => Ok(DeleteBehavior::Restrict),
            "set_null" => Ok(DeleteBehavior::SetNull),
            "cascade" => Ok(DeleteBehavior::Cascade),
            other => Err(format!(
                "unknown on_delete policy {:?} (allowed: restrict|set_null|cascade)",
                other
            )),
        }
    }
}

/// A field somewhere in the schema that points at a given entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingRef {
    /// Fully-qualified name of the referencing entity.
    pub from_entity: String,
    /// Name of the reference field on the referencing entity.
    pub field: String,
    /// Effective on-delete policy.
    pub on_delete: DeleteBehavior,
}
