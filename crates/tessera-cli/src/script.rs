//! Operation scripts.
//!
//! A script is a JSON array of operations run in order against one store:
//!
//! ```json
//! [
//!   {"op": "create", "entity": "Invoice", "data": {"amount": 100}},
//!   {"op": "list", "entity": "Invoice", "params": {"amount__gte": "50", "sort": "-amount"}}
//! ]
//! ```
//!
//! Every operation yields one outcome; a failing operation does not stop the
//! script.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tessera_core::{
    CascadeResult, Database, Error as CoreError, ErrorCode, FieldError, FilterSpec, ListQuery,
    LookupItem, Payload, Record, Reference,
};
use tracing::{debug, warn};

use crate::error::Result;

/// Operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Create,
    Get,
    List,
    Count,
    Lookup,
    Replace,
    Patch,
    Delete,
    Restore,
    Refs,
}

/// One scripted operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Operation {
    pub op: OpKind,
    pub entity: String,
    #[serde(default)]
    pub id: Option<String>,
    /// Expected version for replace, patch and delete.
    #[serde(default)]
    pub version: Option<u64>,
    /// Payload for create, replace and patch.
    #[serde(default)]
    pub data: Option<Payload>,
    /// Query parameters for list, count and lookup.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Result of one operation, printed as a JSON line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub op: OpKind,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Record>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<LookupItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<Reference>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cascade: Option<CascadeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl Outcome {
    fn success(op: OpKind) -> Self {
        Self {
            op,
            ok: true,
            record: None,
            records: None,
            total: None,
            items: None,
            references: None,
            cascade: None,
            errors: None,
        }
    }

    fn failure(op: OpKind, error: &CoreError) -> Self {
        Self {
            ok: false,
            errors: Some(error.field_errors()),
            ..Self::success(op)
        }
    }

    fn with_record(mut self, record: Record) -> Self {
        self.record = Some(record);
        self
    }
}

/// Parse a script document.
pub fn parse_script(text: &str) -> Result<Vec<Operation>> {
    Ok(serde_json::from_str(text)?)
}

/// Read and parse a script file.
pub fn load_script(path: &Path) -> Result<Vec<Operation>> {
    let text = std::fs::read_to_string(path)?;
    parse_script(&text)
}

/// Run every operation in order.
pub fn run_script(db: &Database, operations: Vec<Operation>) -> Vec<Outcome> {
    operations
        .into_iter()
        .enumerate()
        .map(|(index, operation)| {
            let op = operation.op;
            match execute(db, operation) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(index, ?op, error = %e, "operation failed");
                    Outcome::failure(op, &e)
                }
            }
        })
        .collect()
}

fn require_id(operation: &Operation) -> std::result::Result<&str, CoreError> {
    operation
        .id
        .as_deref()
        .ok_or_else(|| CoreError::field("id", ErrorCode::Required, "operation needs an id"))
}

/// Execute one operation.
pub fn execute(db: &Database, operation: Operation) -> std::result::Result<Outcome, CoreError> {
    let op = operation.op;
    let entity = operation.entity.as_str();
    debug!(?op, entity, id = ?operation.id, "executing operation");

    let outcome = match op {
        OpKind::Create => {
            let record = db.create(entity, operation.data.clone().unwrap_or_default())?;
            Outcome::success(op).with_record(record)
        }
        OpKind::Get => Outcome::success(op).with_record(db.get(entity, require_id(&operation)?)?),
        OpKind::List => {
            let query = ListQuery::from_params(&operation.params)?;
            let page = db.list(entity, &query)?;
            Outcome {
                records: Some(page.records),
                total: Some(page.total),
                ..Outcome::success(op)
            }
        }
        OpKind::Count => {
            let filter = FilterSpec::from_params(&operation.params)?;
            Outcome {
                total: Some(db.count(entity, &filter)?),
                ..Outcome::success(op)
            }
        }
        OpKind::Lookup => {
            let params = &operation.params;
            let limit = params
                .get("limit")
                .map(|v| {
                    v.trim()
                        .parse::<usize>()
                        .map_err(|_| CoreError::InvalidQuery("limit must be a non-negative integer".into()))
                })
                .transpose()?;
            let q = params.get("q").map(String::as_str).unwrap_or_default();
            let items = db.lookup(entity, params.get("field").map(String::as_str), q, limit)?;
            Outcome {
                items: Some(items),
                ..Outcome::success(op)
            }
        }
        OpKind::Replace => {
            let id = require_id(&operation)?;
            let data = operation.data.clone().unwrap_or_default();
            Outcome::success(op).with_record(db.replace(entity, id, operation.version, data)?)
        }
        OpKind::Patch => {
            let id = require_id(&operation)?;
            let data = operation.data.clone().unwrap_or_default();
            Outcome::success(op).with_record(db.merge_patch(entity, id, operation.version, data)?)
        }
        OpKind::Delete => {
            let deleted = db.soft_delete(entity, require_id(&operation)?, operation.version)?;
            Outcome {
                cascade: Some(deleted.cascade),
                ..Outcome::success(op).with_record(deleted.record)
            }
        }
        OpKind::Restore => {
            Outcome::success(op).with_record(db.restore(entity, require_id(&operation)?)?)
        }
        OpKind::Refs => Outcome {
            references: Some(db.incoming_references(entity, require_id(&operation)?)?),
            ..Outcome::success(op)
        },
    };
    Ok(outcome)
}
