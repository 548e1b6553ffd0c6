//! Tessera CLI - load a schema, lint it, and run operation scripts.

pub mod config;
pub mod error;
pub mod loader;
pub mod script;

pub use config::{Args, CliConfig, Command};
pub use error::{Error, Result};
