//! Referential integrity on soft delete.
//!
//! Deleting a record resolves every live reference to it:
//! - RESTRICT: abort the delete while a live record points at the target
//! - SET NULL: clear single references, prune the id from reference arrays
//! - CASCADE: soft-delete the referencing record too, recursively
//!
//! Planning only reads store state. The resulting plan is applied in one
//! write-lock unit, so readers never see a half-applied cascade.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::catalog::DeleteBehavior;
use crate::error::{CascadeError, Error};
use crate::storage::{Record, StoreState};
use crate::value::Value;

/// Maximum cascade depth to prevent runaway recursion.
pub const MAX_CASCADE_DEPTH: usize = 100;

/// Records affected by a delete besides the target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeResult {
    /// `(entity, id)` of records soft-deleted by cascade.
    pub deleted_entities: Vec<(String, String)>,
    /// `(entity, id, field)` of references cleared or pruned.
    pub nullified_fields: Vec<(String, String, String)>,
}

impl CascadeResult {
    /// Create an empty cascade result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the total number of affected records.
    pub fn affected_count(&self) -> usize {
        self.deleted_entities.len() + self.nullified_fields.len()
    }
}

/// A live reference to some record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// Referencing entity.
    pub entity: String,
    /// Reference field on the referencing entity.
    pub field: String,
    /// Referencing record id.
    pub id: String,
    /// Effective policy of the field.
    #[serde(skip)]
    pub on_delete: DeleteBehavior,
}

/// A checked delete, ready to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePlan {
    /// Target entity.
    pub entity: String,
    /// Target id.
    pub id: String,
    /// Everything else the delete touches.
    pub cascade: CascadeResult,
}

/// Every live record referencing `(entity, id)`, in schema and id order.
pub fn find_references(state: &StoreState, entity: &str, id: &str) -> Vec<Reference> {
    let mut found = Vec::new();
    for incoming in state.schema.incoming_refs(entity) {
        for record in state.live_records(&incoming.from_entity) {
            if record.get(&incoming.field).is_some_and(|v| v.references(id)) {
                found.push(Reference {
                    entity: incoming.from_entity.clone(),
                    field: incoming.field.clone(),
                    id: record.id.clone(),
                    on_delete: incoming.on_delete,
                });
            }
        }
    }
    found
}

/// Plans and applies deletes.
pub struct CascadeExecutor<'a> {
    state: &'a StoreState,
}

impl<'a> CascadeExecutor<'a> {
    /// Create a new cascade executor over a store snapshot.
    pub fn new(state: &'a StoreState) -> Self {
        Self { state }
    }

    /// Work out everything a delete of `(entity, id)` does, or why it cannot happen.
    #[instrument(skip(self), level = "debug")]
    pub fn plan_delete(&self, entity: &str, id: &str) -> Result<DeletePlan, Error> {
        let mut visited = HashSet::new();
        let mut deleted = Vec::new();
        self.collect_cascade(entity, id, 0, &mut visited, &mut deleted)?;

        let mut cascade = CascadeResult::new();
        let mut seen_nulls = HashSet::new();

        for (del_entity, del_id) in &deleted {
            for reference in find_references(self.state, del_entity, del_id) {
                if visited.contains(&(reference.entity.clone(), reference.id.clone())) {
                    continue;
                }
                match reference.on_delete {
                    DeleteBehavior::Restrict => {
                        return Err(Error::Restrict {
                            entity: del_entity.clone(),
                            id: del_id.clone(),
                            referencing_entity: reference.entity,
                            field: reference.field,
                        });
                    }
                    DeleteBehavior::SetNull => {
                        let key = (reference.entity, reference.id, reference.field);
                        if seen_nulls.insert(key.clone()) {
                            cascade.nullified_fields.push(key);
                        }
                    }
                    // Cascade referrers are all in `visited` already.
                    DeleteBehavior::Cascade => {}
                }
            }
        }

        cascade.deleted_entities = deleted.into_iter().skip(1).collect();
        debug!(
            entity,
            id,
            affected = cascade.affected_count(),
            "delete planned"
        );

        Ok(DeletePlan {
            entity: entity.to_string(),
            id: id.to_string(),
            cascade,
        })
    }

    /// Collect the target plus every record reachable through cascade references.
    fn collect_cascade(
        &self,
        entity: &str,
        id: &str,
        depth: usize,
        visited: &mut HashSet<(String, String)>,
        deleted: &mut Vec<(String, String)>,
    ) -> Result<(), Error> {
        // Check for maximum depth
        if depth > MAX_CASCADE_DEPTH {
            return Err(CascadeError::MaxDepthExceeded { depth }.into());
        }

        // Prevent cycles
        let key = (entity.to_string(), id.to_string());
        if !visited.insert(key.clone()) {
            return Ok(());
        }
        deleted.push(key);

        for reference in find_references(self.state, entity, id) {
            if reference.on_delete == DeleteBehavior::Cascade {
                self.collect_cascade(&reference.entity, &reference.id, depth + 1, visited, deleted)?;
            }
        }

        Ok(())
    }

    /// Apply a plan: prune or clear set-null references, flag every deleted
    /// record, bump each touched version once. Returns the updated target.
    pub fn apply(plan: &DeletePlan, state: &mut StoreState, now: DateTime<Utc>) -> Option<Record> {
        let removed: HashSet<&str> = std::iter::once(plan.id.as_str())
            .chain(plan.cascade.deleted_entities.iter().map(|(_, id)| id.as_str()))
            .collect();

        let mut touched = HashSet::new();
        for (entity, id, field) in &plan.cascade.nullified_fields {
            let Some(record) = state.get_mut(entity, id) else {
                continue;
            };
            if let Some(value) = record.attributes.get_mut(field) {
                match value {
                    Value::Array(items) => {
                        items.retain(|item| !item.as_ref_id().is_some_and(|r| removed.contains(r)))
                    }
                    single if single.as_ref_id().is_some_and(|r| removed.contains(r)) => {
                        *single = Value::Null
                    }
                    _ => {}
                }
            }
            if touched.insert((entity.as_str(), id.as_str())) {
                record.touch(now);
            }
        }

        for (entity, id) in &plan.cascade.deleted_entities {
            if let Some(record) = state.get_mut(entity, id) {
                record.deleted = true;
                record.touch(now);
            }
        }

        let target = state.get_mut(&plan.entity, &plan.id)?;
        target.deleted = true;
        target.touch(now);
        let target = target.clone();

        state.commit();
        Some(target)
    }
}
