//! Schema lint: contradictions that block a schema from being loaded.

use super::{DeleteBehavior, FieldType, SchemaBundle};
use serde::Serialize;
use std::fmt;

/// A blocking problem found in a schema bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaIssue {
    /// Fully-qualified entity name.
    pub entity: String,
    /// Offending field (or first field of a composite set).
    pub field: String,
    /// Machine-readable issue code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {} ({})", self.entity, self.field, self.message, self.code)
    }
}

impl SchemaBundle {
    /// Check the bundle for blocking issues. An empty result means loadable.
    pub fn lint(&self) -> Vec<SchemaIssue> {
        let mut issues = Vec::new();

        for (fqn, entity) in &self.entities {
            let mut issue = |field: &str, code: &'static str, message: String| {
                issues.push(SchemaIssue {
                    entity: fqn.clone(),
                    field: field.to_string(),
                    code,
                    message,
                });
            };

            for field in &entity.fields {
                match &field.field_type {
                    FieldType::Ref { target } | FieldType::ArrayRef { target } => {
                        if target.trim().is_empty() {
                            issue(&field.name, "ref_target_empty", "ref field has an empty target".into());
                        } else if self.resolve_target(&entity.namespace, target).is_none() {
                            issue(
                                &field.name,
                                "ref_target_unresolved",
                                format!("ref target {:?} does not name exactly one entity", target),
                            );
                        }

                        let single = matches!(field.field_type, FieldType::Ref { .. });
                        if single
                            && field.options.required
                            && field.effective_on_delete() == DeleteBehavior::SetNull
                        {
                            issue(
                                &field.name,
                                "required_conflicts_on_delete",
                                "required ref cannot have on_delete=set_null; use restrict or cascade (or make the field optional)".into(),
                            );
                        }
                    }
                    _ => {
                        if field.on_delete.is_some() {
                            issue(
                                &field.name,
                                "on_delete_without_ref",
                                "on_delete is only meaningful on reference fields".into(),
                            );
                        }
                    }
                }

                if let Some(catalog) = field.catalog_name() {
                    if self.catalog(&catalog).is_none() {
                        issue(
                            &field.name,
                            "unknown_catalog",
                            format!("catalog {:?} is not loaded", catalog),
                        );
                    }
                }
            }

            for set in &entity.unique_together {
                let first = set.first().map(String::as_str).unwrap_or("");
                if set.is_empty() {
                    issue(first, "composite_unknown_field", "empty composite unique set".into());
                    continue;
                }
                for member in set {
                    if entity.get_field(member).is_none() {
                        issue(
                            first,
                            "composite_unknown_field",
                            format!("composite unique member {:?} is not a declared field", member),
                        );
                    }
                }
            }
        }

        issues
    }
}
