//! Constraint enforcement module.
//!
//! This module provides validation for Tessera writes:
//! - Strict type coercion of submitted values
//! - Required, enum and catalog checks
//! - Reference existence and uniqueness (single and composite)
//! - Parent-pointer self reference and cycle checks

mod coerce;
mod tree;
mod validator;

pub use coerce::{coerce_scalar, coerce_value, parse_bool, parse_date, parse_datetime};
pub use tree::{check_parent, parent_field};
pub use validator::{Payload, Validator, WriteMode};
