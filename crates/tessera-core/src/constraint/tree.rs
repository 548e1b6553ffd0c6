//! Parent-pointer checks for self-referencing trees.

use crate::catalog::{EntityDef, FieldType};
use crate::error::{ErrorCode, FieldError};
use crate::storage::{Attributes, StoreConfig, StoreState};
use std::collections::HashSet;

/// The entity's parent pointer field, if it declares one.
///
/// A parent pointer is a single reference named `config.parent_field` whose
/// target is the entity itself.
pub fn parent_field<'e>(
    state: &StoreState,
    config: &StoreConfig,
    entity: &'e EntityDef,
) -> Option<&'e str> {
    let field = entity.get_field(&config.parent_field)?;
    let FieldType::Ref { target } = &field.field_type else {
        return None;
    };
    let fqn = entity.fqn();
    (state.schema.resolve_target(&entity.namespace, target).as_deref() == Some(fqn.as_str()))
        .then_some(field.name.as_str())
}

/// Reject a parent pointer naming the record itself, or closing a loop.
pub fn check_parent(
    state: &StoreState,
    config: &StoreConfig,
    entity: &EntityDef,
    own_id: Option<&str>,
    attrs: &Attributes,
) -> Option<FieldError> {
    let field = parent_field(state, config, entity)?;
    let parent = attrs.get(field)?.as_ref_id()?;

    if own_id == Some(parent) {
        return Some(FieldError::new(
            field,
            ErrorCode::SelfParent,
            format!("{} cannot reference the record itself", field),
        ));
    }

    let fqn = entity.fqn();
    let mut seen = HashSet::new();
    let mut current = parent.to_string();

    for _ in 0..config.max_parent_depth {
        if own_id == Some(current.as_str()) || !seen.insert(current.clone()) {
            return Some(cycle(field));
        }
        let next = state
            .get(&fqn, &current)
            .and_then(|r| r.get(field))
            .and_then(|v| v.as_ref_id());
        match next {
            Some(id) => current = id.to_string(),
            None => return None,
        }
    }

    // Chain longer than the walk bound.
    Some(cycle(field))
}

fn cycle(field: &str) -> FieldError {
    FieldError::new(field, ErrorCode::CycleDetected, "parent chain contains a cycle")
}
