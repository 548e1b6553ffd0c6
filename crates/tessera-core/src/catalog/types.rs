//! Core type definitions for the catalog.

use serde::{Deserialize, Serialize};

/// Primitive data types supported by Tessera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    /// UTF-8 string.
    String,
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point.
    Float,
    /// Boolean value.
    Bool,
    /// Calendar date (`YYYY-MM-DD`).
    Date,
    /// Timestamp with offset (RFC 3339).
    #[serde(rename = "datetime")]
    DateTime,
}

/// Field types - flat representation without recursion.
///
/// Arrays hold one level of elements; nested arrays are not supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// A primitive value.
    Scalar(ScalarType),
    /// An enumeration. An empty `values` list defers membership to the field's catalog.
    Enum {
        /// Allowed values.
        #[serde(default)]
        values: Vec<String>,
    },
    /// A reference to a record of another (or the same) entity.
    Ref {
        /// Target entity, either `Name` or `namespace.Name`.
        target: String,
    },
    /// An array of primitive values.
    ArrayScalar(ScalarType),
    /// An array of enumeration values.
    ArrayEnum {
        /// Allowed values.
        #[serde(default)]
        values: Vec<String>,
    },
    /// An array of references.
    ArrayRef {
        /// Target entity, either `Name` or `namespace.Name`.
        target: String,
    },
}

impl ScalarType {
    /// Name used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Int => "int",
            ScalarType::Float => "float",
            ScalarType::Bool => "bool",
            ScalarType::Date => "date",
            ScalarType::DateTime => "datetime",
        }
    }
}

impl FieldType {
    /// Create a scalar field type.
    pub fn scalar(scalar: ScalarType) -> Self {
        FieldType::Scalar(scalar)
    }

    /// Create an inline enum field type.
    pub fn enum_type(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        FieldType::Enum {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a reference field type.
    pub fn reference(target: impl Into<String>) -> Self {
        FieldType::Ref {
            target: target.into(),
        }
    }

    /// Create an array of scalars field type.
    pub fn array_scalar(scalar: ScalarType) -> Self {
        FieldType::ArrayScalar(scalar)
    }

    /// Create an array of references field type.
    pub fn array_ref(target: impl Into<String>) -> Self {
        FieldType::ArrayRef {
            target: target.into(),
        }
    }

    /// Check if this type is an array.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            FieldType::ArrayScalar(_) | FieldType::ArrayEnum { .. } | FieldType::ArrayRef { .. }
        )
    }

    /// Check if this type holds references (single or array).
    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Ref { .. } | FieldType::ArrayRef { .. })
    }

    /// Get the reference target if this is a reference type.
    pub fn ref_target(&self) -> Option<&str> {
        match self {
            FieldType::Ref { target } | FieldType::ArrayRef { target } => Some(target),
            _ => None,
        }
    }

    /// Get the inner scalar type if this is a scalar-based type.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            FieldType::Scalar(s) | FieldType::ArrayScalar(s) => Some(*s),
            _ => None,
        }
    }

    /// Get the inline enum values if this is an enum-based type.
    pub fn enum_values(&self) -> Option<&[String]> {
        match self {
            FieldType::Enum { values } | FieldType::ArrayEnum { values } => Some(values),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn describe(&self) -> String {
        match self {
            FieldType::Scalar(s) => s.as_str().to_string(),
            FieldType::Enum { .. } => "enum".to_string(),
            FieldType::Ref { target } => format!("ref[{}]", target),
            FieldType::ArrayScalar(s) => format!("array[{}]", s.as_str()),
            FieldType::ArrayEnum { .. } => "array[enum]".to_string(),
            FieldType::ArrayRef { target } => format!("array[ref[{}]]", target),
        }
    }
}
