//! Mutation executor for handling write operations.
//!
//! Every write follows the same optimistic protocol:
//! 1. read the current record, its version, the schema and the commit epoch
//!    under one shared guard
//! 2. compare against the expected version
//! 3. validate the payload without holding the lock against the schema read
//!    in step 1, then run cross-record checks under shared access
//! 4. take exclusive access, re-read and re-compare the version; if anything
//!    committed since step 1, re-run the cross-record checks on locked state
//!    (and re-validate the payload if the schema was swapped)
//! 5. apply, bump the version by one, refresh `updated_at`

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cascade::{CascadeExecutor, CascadeResult, DeletePlan};
use crate::catalog::{EntityDef, SchemaBundle};
use crate::constraint::{Payload, Validator, WriteMode};
use crate::error::{Error, Result};
use crate::storage::{Attributes, Record, StorageEngine, StoreConfig, StoreState};

/// Outcome of a soft delete.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteOutcome {
    /// The deleted target after the write.
    pub record: Record,
    /// Other records the delete touched.
    pub cascade: CascadeResult,
}

/// Look up an entity definition by fully-qualified name.
pub fn entity_def<'s>(schema: &'s SchemaBundle, fqn: &str) -> Result<&'s EntityDef> {
    schema
        .get_entity(fqn)
        .ok_or_else(|| Error::UnknownEntity(fqn.to_string()))
}

/// Schema and epoch read under one guard. Validation runs against this
/// schema; anything committed after `epoch` is re-checked under the write lock.
struct Snapshot {
    schema: Arc<SchemaBundle>,
    epoch: u64,
}

impl Snapshot {
    fn of(state: &StoreState) -> Self {
        Self {
            schema: state.schema.clone(),
            epoch: state.epoch,
        }
    }
}

/// A write being re-checked under the lock.
struct WriteRequest<'r> {
    fqn: &'r str,
    own_id: Option<&'r str>,
    payload: &'r Payload,
    mode: WriteMode,
    current: Option<&'r Attributes>,
}

/// Executes mutation operations against the store.
pub struct MutationExecutor<'a> {
    engine: &'a StorageEngine,
    config: &'a StoreConfig,
}

impl<'a> MutationExecutor<'a> {
    /// Create a new mutation executor.
    pub fn new(engine: &'a StorageEngine, config: &'a StoreConfig) -> Self {
        Self { engine, config }
    }

    /// Insert a new record at version 1.
    pub fn create(&self, fqn: &str, mut payload: Payload) -> Result<Record> {
        let snapshot = Snapshot::of(&self.engine.read());
        let validator = Validator::new(&snapshot.schema, entity_def(&snapshot.schema, fqn)?);
        validator.check_protected(&mut payload)?;
        let attrs = validator.validate_payload(&payload, WriteMode::Create, None)?;

        {
            let state = self.engine.read();
            validator
                .check_integrity(&state, self.config, None, &attrs)
                .inspect_err(|e| warn!(entity = fqn, error = %e, "create rejected"))?;
        }

        let id = self.engine.generate_id();
        let now = Utc::now();

        let mut state = self.engine.write();
        let request = WriteRequest {
            fqn,
            own_id: None,
            payload: &payload,
            mode: WriteMode::Create,
            current: None,
        };
        let attrs = self.recheck(&state, &snapshot, &request, attrs)?;

        let record = Record::new(fqn, id, attrs, now);
        state.insert(record.clone());
        state.commit();

        debug!(entity = fqn, id = %record.id, "record created");
        Ok(record)
    }

    /// Replace every attribute of a record.
    pub fn replace(&self, fqn: &str, id: &str, expected: Option<u64>, payload: Payload) -> Result<Record> {
        self.update(fqn, id, expected, payload, WriteMode::Replace)
    }

    /// Merge a patch into a record.
    pub fn patch(&self, fqn: &str, id: &str, expected: Option<u64>, payload: Payload) -> Result<Record> {
        self.update(fqn, id, expected, payload, WriteMode::Patch)
    }

    fn update(
        &self,
        fqn: &str,
        id: &str,
        expected: Option<u64>,
        mut payload: Payload,
        mode: WriteMode,
    ) -> Result<Record> {
        let (snapshot, current) = {
            let state = self.engine.read();
            let current = live_record(&state, fqn, id).map(|r| (r.version, r.attributes.clone()));
            (Snapshot::of(&state), current)
        };
        let validator = Validator::new(&snapshot.schema, entity_def(&snapshot.schema, fqn)?);
        let hint = validator.check_protected(&mut payload)?;
        let expected = expected.or(hint);

        let (current_version, current) = current?;
        check_version(fqn, id, expected, current_version)?;

        let current_attrs = (mode == WriteMode::Patch).then_some(&current);
        let attrs = validator.validate_payload(&payload, mode, current_attrs)?;

        {
            let state = self.engine.read();
            validator
                .check_integrity(&state, self.config, Some(id), &attrs)
                .inspect_err(|e| warn!(entity = fqn, id, error = %e, "update rejected"))?;
        }

        let now = Utc::now();
        let mut state = self.engine.write();
        let locked_version = live_record(&state, fqn, id)?.version;
        check_version(fqn, id, expected, locked_version)?;

        let request = WriteRequest {
            fqn,
            own_id: Some(id),
            payload: &payload,
            mode,
            current: current_attrs,
        };
        let attrs = self.recheck(&state, &snapshot, &request, attrs)?;

        let record = state
            .get_mut(fqn, id)
            .ok_or_else(|| not_found(fqn, id))?;
        match mode {
            WriteMode::Patch => record.attributes.extend(attrs),
            _ => record.attributes = attrs,
        }
        record.touch(now);
        let record = record.clone();
        state.commit();

        debug!(entity = fqn, id, version = record.version, "record updated");
        Ok(record)
    }

    /// Soft-delete a record, resolving references to it.
    pub fn delete(&self, fqn: &str, id: &str, expected: Option<u64>) -> Result<DeleteOutcome> {
        let (plan, snapshot) = {
            let state = self.engine.read();
            let record = live_record(&state, fqn, id)?;
            if let Some(expected) = expected {
                check_version(fqn, id, Some(expected), record.version)?;
            }
            let plan = plan_delete(&state, fqn, id)?;
            (plan, Snapshot::of(&state))
        };

        let now = Utc::now();
        let mut state = self.engine.write();
        let locked = live_record(&state, fqn, id)?;
        if let Some(expected) = expected {
            check_version(fqn, id, Some(expected), locked.version)?;
        }

        let plan = if state.epoch == snapshot.epoch {
            plan
        } else {
            debug!(entity = fqn, id, "store changed since planning; re-planning delete");
            plan_delete(&state, fqn, id)?
        };

        let record = CascadeExecutor::apply(&plan, &mut state, now).ok_or_else(|| not_found(fqn, id))?;

        debug!(
            entity = fqn,
            id,
            cascaded = plan.cascade.deleted_entities.len(),
            nullified = plan.cascade.nullified_fields.len(),
            "record deleted"
        );
        Ok(DeleteOutcome {
            record,
            cascade: plan.cascade,
        })
    }

    /// Clear the delete flag. Restoring a live record is a no-op.
    pub fn restore(&self, fqn: &str, id: &str) -> Result<Record> {
        let snapshot = {
            let state = self.engine.read();
            let record = state.get(fqn, id).ok_or_else(|| not_found(fqn, id))?;
            if record.is_live() {
                return Ok(record.clone());
            }
            check_restore_unique(&state, fqn, record)?;
            state.epoch
        };

        let now = Utc::now();
        let mut state = self.engine.write();
        let record = state.get(fqn, id).ok_or_else(|| not_found(fqn, id))?;
        if record.is_live() {
            return Ok(record.clone());
        }
        if state.epoch != snapshot {
            check_restore_unique(&state, fqn, record)?;
        }

        let record = state
            .get_mut(fqn, id)
            .ok_or_else(|| not_found(fqn, id))?;
        record.deleted = false;
        record.touch(now);
        let record = record.clone();
        state.commit();

        debug!(entity = fqn, id, version = record.version, "record restored");
        Ok(record)
    }

    /// Re-run checks under the write lock when the store moved since `snapshot`.
    fn recheck(
        &self,
        state: &StoreState,
        snapshot: &Snapshot,
        request: &WriteRequest<'_>,
        attrs: Attributes,
    ) -> Result<Attributes> {
        if state.epoch == snapshot.epoch && Arc::ptr_eq(&state.schema, &snapshot.schema) {
            return Ok(attrs);
        }

        let entity = entity_def(&state.schema, request.fqn)?;
        let validator = Validator::new(&state.schema, entity);

        let attrs = if Arc::ptr_eq(&state.schema, &snapshot.schema) {
            attrs
        } else {
            debug!(entity = request.fqn, "schema swapped during write; revalidating payload");
            validator.validate_payload(request.payload, request.mode, request.current)?
        };

        validator
            .check_integrity(state, self.config, request.own_id, &attrs)
            .inspect_err(|e| warn!(entity = request.fqn, error = %e, "write rejected on recheck"))?;
        Ok(attrs)
    }
}

fn not_found(fqn: &str, id: &str) -> Error {
    Error::NotFound {
        entity: fqn.to_string(),
        id: id.to_string(),
    }
}

/// The record if it exists and is live.
fn live_record<'s>(state: &'s StoreState, fqn: &str, id: &str) -> Result<&'s Record> {
    let record = state.get(fqn, id).ok_or_else(|| not_found(fqn, id))?;
    if record.deleted {
        return Err(Error::Deleted {
            entity: fqn.to_string(),
            id: id.to_string(),
        });
    }
    Ok(record)
}

fn check_version(fqn: &str, id: &str, expected: Option<u64>, current: u64) -> Result<()> {
    if expected == Some(current) {
        return Ok(());
    }
    warn!(entity = fqn, id, ?expected, current, "version conflict");
    Err(Error::VersionConflict {
        entity: fqn.to_string(),
        id: id.to_string(),
        current,
    })
}

fn plan_delete(state: &StoreState, fqn: &str, id: &str) -> Result<DeletePlan> {
    CascadeExecutor::new(state)
        .plan_delete(fqn, id)
        .inspect_err(|e| warn!(entity = fqn, id, error = %e, "delete aborted"))
}

fn check_restore_unique(state: &StoreState, fqn: &str, record: &Record) -> Result<()> {
    let entity = entity_def(&state.schema, fqn)?;
    Validator::new(&state.schema, entity).check_uniqueness(state, Some(&record.id), &record.attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, ScalarType};
    use crate::error::ErrorCode;
    use serde_json::json;

    fn engine() -> StorageEngine {
        StorageEngine::new(
            SchemaBundle::new(1).with_entity(
                EntityDef::new("crm", "Customer")
                    .with_field(FieldDef::scalar("email", ScalarType::String).unique())
                    .with_field(FieldDef::scalar("name", ScalarType::String)),
            ),
        )
    }

    fn payload(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_create_and_patch() {
        let engine = engine();
        let config = StoreConfig::default();
        let exec = MutationExecutor::new(&engine, &config);

        let created = exec.create("crm.Customer", payload(json!({"email": "a@x.io"}))).unwrap();
        assert_eq!(created.version, 1);

        let patched = exec
            .patch("crm.Customer", &created.id, None, payload(json!({"name": "Ann", "version": 1})))
            .unwrap();
        assert_eq!(patched.version, 2);
        assert_eq!(patched.attributes.len(), 2);
    }

    #[test]
    fn test_missing_version_conflicts() {
        let engine = engine();
        let config = StoreConfig::default();
        let exec = MutationExecutor::new(&engine, &config);

        let created = exec.create("crm.Customer", payload(json!({"email": "a@x.io"}))).unwrap();
        let err = exec
            .replace("crm.Customer", &created.id, None, payload(json!({"email": "b@x.io"})))
            .unwrap_err();
        assert_eq!(
            err,
            Error::VersionConflict {
                entity: "crm.Customer".into(),
                id: created.id.clone(),
                current: 1
            }
        );
    }

    #[test]
    fn test_restore_rechecks_uniqueness() {
        let engine = engine();
        let config = StoreConfig::default();
        let exec = MutationExecutor::new(&engine, &config);

        let first = exec.create("crm.Customer", payload(json!({"email": "a@x.io"}))).unwrap();
        exec.delete("crm.Customer", &first.id, None).unwrap();
        exec.create("crm.Customer", payload(json!({"email": "a@x.io"}))).unwrap();

        let err = exec.restore("crm.Customer", &first.id).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UniqueViolation);
    }

    #[test]
    fn test_unknown_entity() {
        let engine = engine();
        let config = StoreConfig::default();
        let exec = MutationExecutor::new(&engine, &config);
        assert!(matches!(
            exec.create("crm.Nope", Payload::new()),
            Err(Error::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_recheck_revalidates_when_schema_swapped_at_same_epoch() {
        let engine = engine();
        let config = StoreConfig::default();
        let exec = MutationExecutor::new(&engine, &config);

        let stale = Snapshot::of(&engine.read());
        let request_payload = payload(json!({"name": "Ann"}));
        let attrs = Validator::new(&stale.schema, entity_def(&stale.schema, "crm.Customer").unwrap())
            .validate_payload(&request_payload, WriteMode::Create, None)
            .unwrap();

        engine.write().replace_schema(
            SchemaBundle::new(2).with_entity(
                EntityDef::new("crm", "Customer")
                    .with_field(FieldDef::scalar("email", ScalarType::String).required())
                    .with_field(FieldDef::scalar("name", ScalarType::String)),
            ),
        );

        let state = engine.read();
        // Same epoch, different schema: the epoch alone must not be trusted.
        let snapshot = Snapshot {
            schema: stale.schema.clone(),
            epoch: state.epoch,
        };
        let request = WriteRequest {
            fqn: "crm.Customer",
            own_id: None,
            payload: &request_payload,
            mode: WriteMode::Create,
            current: None,
        };
        let err = exec.recheck(&state, &snapshot, &request, attrs.clone()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Required);

        let current = Snapshot::of(&state);
        assert_eq!(exec.recheck(&state, &current, &request, attrs.clone()).unwrap(), attrs);
    }

    #[test]
    fn test_recheck_rejects_removed_entity() {
        let engine = engine();
        let config = StoreConfig::default();
        let exec = MutationExecutor::new(&engine, &config);

        let stale = Snapshot::of(&engine.read());
        engine.write().replace_schema(SchemaBundle::new(2));

        let state = engine.read();
        let request_payload = payload(json!({"name": "Ann"}));
        let request = WriteRequest {
            fqn: "crm.Customer",
            own_id: None,
            payload: &request_payload,
            mode: WriteMode::Create,
            current: None,
        };
        assert!(matches!(
            exec.recheck(&state, &stale, &request, Attributes::new()),
            Err(Error::UnknownEntity(_))
        ));
    }
}
