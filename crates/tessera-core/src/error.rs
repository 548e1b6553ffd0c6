//! Core error types.

use crate::catalog::SchemaIssue;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Machine-readable error codes attached to field errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// A required field is missing or null.
    Required,
    /// The value does not match the declared type.
    TypeMismatch,
    /// The value is not a member of the enum or catalog.
    EnumInvalid,
    /// Another live record already holds the value.
    UniqueViolation,
    /// A referenced id does not resolve to a live record.
    RefNotFound,
    /// A system or readonly field was supplied by the client.
    ReadonlyField,
    /// The expected version does not match the stored version.
    VersionConflict,
    /// The entity or record does not exist.
    NotFound,
    /// The record is soft-deleted.
    Deleted,
    /// A restrict reference blocks the delete.
    FkInUse,
    /// A record names itself as its own parent.
    SelfParent,
    /// The parent chain would loop.
    CycleDetected,
    /// A query parameter could not be interpreted.
    InvalidQuery,
    /// The schema failed lint.
    SchemaInvalid,
    /// A cascade went deeper than allowed.
    CascadeDepthExceeded,
}

impl ErrorCode {
    /// Code as written on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Required => "required",
            ErrorCode::TypeMismatch => "type_mismatch",
            ErrorCode::EnumInvalid => "enum_invalid",
            ErrorCode::UniqueViolation => "unique_violation",
            ErrorCode::RefNotFound => "ref_not_found",
            ErrorCode::ReadonlyField => "readonly_field",
            ErrorCode::VersionConflict => "version_conflict",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Deleted => "deleted",
            ErrorCode::FkInUse => "fk_in_use",
            ErrorCode::SelfParent => "self_parent",
            ErrorCode::CycleDetected => "cycle_detected",
            ErrorCode::InvalidQuery => "invalid_query",
            ErrorCode::SchemaInvalid => "schema_invalid",
            ErrorCode::CascadeDepthExceeded => "cascade_depth_exceeded",
        }
    }

    /// Integrity conflicts depend on the concurrent state of other records.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            ErrorCode::UniqueViolation | ErrorCode::RefNotFound | ErrorCode::FkInUse
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field-scoped validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name (empty for record-level errors).
    pub field: String,
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl FieldError {
    /// Create a new field error.
    pub fn new(field: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
        }
    }

    pub fn required(field: impl Into<String>) -> Self {
        Self::new(field, ErrorCode::Required, "field is required")
    }

    pub fn type_mismatch(field: impl Into<String>, expected: &str) -> Self {
        Self::new(field, ErrorCode::TypeMismatch, format!("expected {}", expected))
    }

    pub fn readonly(field: impl Into<String>) -> Self {
        Self::new(field, ErrorCode::ReadonlyField, "field is read-only")
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "{} ({})", self.message, self.code)
        } else {
            write!(f, "{}: {} ({})", self.field, self.message, self.code)
        }
    }
}

/// Cascade-specific errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CascadeError {
    /// Cascade went deeper than the configured bound.
    #[error("maximum cascade depth exceeded: {depth}")]
    MaxDepthExceeded { depth: usize },
}

/// Core store errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The entity name does not resolve against the current schema.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Record not found.
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    /// Record exists but is soft-deleted.
    #[error("{entity} {id} is deleted")]
    Deleted { entity: String, id: String },

    /// One or more fields failed validation.
    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<FieldError>),

    /// Expected version is missing or stale.
    #[error("version conflict on {entity} {id}: current version is {current}")]
    VersionConflict {
        entity: String,
        id: String,
        current: u64,
    },

    /// A restrict reference blocks the delete.
    #[error("{entity} {id} is referenced by {referencing_entity}.{field}")]
    Restrict {
        entity: String,
        id: String,
        referencing_entity: String,
        field: String,
    },

    /// Cascade failure.
    #[error("cascade error: {0}")]
    Cascade(#[from] CascadeError),

    /// Schema rejected by lint.
    #[error("schema lint failed: {}", join_issues(.0))]
    SchemaLint(Vec<SchemaIssue>),

    /// Malformed query.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_issues(issues: &[SchemaIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Shorthand for a single-error validation failure.
    pub fn field(field: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Error::Validation(vec![FieldError::new(field, code, message)])
    }

    /// The primary machine code of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::UnknownEntity(_) | Error::NotFound { .. } => ErrorCode::NotFound,
            Error::Deleted { .. } => ErrorCode::Deleted,
            Error::Validation(errors) => errors
                .first()
                .map(|e| e.code)
                .unwrap_or(ErrorCode::TypeMismatch),
            Error::VersionConflict { .. } => ErrorCode::VersionConflict,
            Error::Restrict { .. } => ErrorCode::FkInUse,
            Error::Cascade(CascadeError::MaxDepthExceeded { .. }) => {
                ErrorCode::CascadeDepthExceeded
            }
            Error::SchemaLint(_) => ErrorCode::SchemaInvalid,
            Error::InvalidQuery(_) => ErrorCode::InvalidQuery,
        }
    }

    /// True if this is a conflict caused by the state of other records.
    pub fn is_integrity(&self) -> bool {
        match self {
            Error::Validation(errors) => errors.iter().any(|e| e.code.is_integrity()),
            Error::Restrict { .. } => true,
            _ => false,
        }
    }

    /// Flatten into field errors for adapters.
    pub fn field_errors(&self) -> Vec<FieldError> {
        match self {
            Error::Validation(errors) => errors.clone(),
            Error::SchemaLint(issues) => issues
                .iter()
                .map(|issue| {
                    FieldError::new(
                        format!("{}.{}", issue.entity, issue.field),
                        ErrorCode::SchemaInvalid,
                        format!("{} ({})", issue.message, issue.code),
                    )
                })
                .collect(),
            Error::Restrict {
                referencing_entity,
                field,
                ..
            } => vec![FieldError::new(
                "",
                ErrorCode::FkInUse,
                format!("record is referenced by {}.{}", referencing_entity, field),
            )],
            Error::VersionConflict { current, .. } => vec![FieldError::new(
                "version",
                ErrorCode::VersionConflict,
                format!("current version is {}", current),
            )],
            other => vec![FieldError::new("", other.code(), other.to_string())],
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_codes() {
        assert!(ErrorCode::UniqueViolation.is_integrity());
        assert!(ErrorCode::RefNotFound.is_integrity());
        assert!(ErrorCode::FkInUse.is_integrity());
        assert!(!ErrorCode::Required.is_integrity());
        assert!(!ErrorCode::VersionConflict.is_integrity());
    }

    #[test]
    fn test_code_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorCode::CycleDetected).unwrap();
        assert_eq!(json, "\"cycle_detected\"");
        assert_eq!(ErrorCode::FkInUse.as_str(), "fk_in_use");
    }

    #[test]
    fn test_field_errors_flatten() {
        let err = Error::VersionConflict {
            entity: "billing.Invoice".into(),
            id: "01J".into(),
            current: 4,
        };
        let errors = err.field_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::VersionConflict);
        assert!(errors[0].message.contains('4'));

        let err = Error::Restrict {
            entity: "crm.Customer".into(),
            id: "01J".into(),
            referencing_entity: "billing.Invoice".into(),
            field: "customer".into(),
        };
        assert_eq!(err.code(), ErrorCode::FkInUse);
        assert!(err.is_integrity());
        assert_eq!(
            err.field_errors()[0].message,
            "record is referenced by billing.Invoice.customer"
        );
    }

    #[test]
    fn test_validation_display() {
        let err = Error::Validation(vec![
            FieldError::required("amount"),
            FieldError::type_mismatch("due", "date"),
        ]);
        assert_eq!(err.code(), ErrorCode::Required);
        assert_eq!(
            err.to_string(),
            "validation failed: amount: field is required (required); due: expected date (type_mismatch)"
        );
    }
}
