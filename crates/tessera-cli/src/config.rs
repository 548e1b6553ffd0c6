//! CLI configuration.
//!
//! Settings come from an optional JSON config file; explicit flags win.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tessera_core::{NullsOrder, StoreConfig};

use crate::error::{Error, Result};

/// Default schema file location.
pub const DEFAULT_SCHEMA_PATH: &str = "./schema.json";

/// Resolved CLI configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    /// Schema JSON file.
    pub schema_path: PathBuf,

    /// Directory of catalog `*.json` files, if any.
    pub catalogs_dir: Option<PathBuf>,

    /// Store settings.
    pub store: StoreConfig,
}

impl CliConfig {
    /// Create a configuration for a schema file with default store settings.
    pub fn new(schema_path: impl Into<PathBuf>) -> Self {
        Self {
            schema_path: schema_path.into(),
            catalogs_dir: None,
            store: StoreConfig::default(),
        }
    }

    /// Set the catalogs directory.
    pub fn with_catalogs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.catalogs_dir = Some(dir.into());
        self
    }

    /// Set the store configuration.
    pub fn with_store_config(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA_PATH)
    }
}

/// On-disk config file. Relative paths resolve against the file's directory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub schema: Option<PathBuf>,
    pub catalogs: Option<PathBuf>,
    pub store: StoreConfig,
}

impl FileConfig {
    /// Read a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config: FileConfig = serde_json::from_str(&text)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.schema = config.schema.map(|p| base.join(p));
        config.catalogs = config.catalogs.map(|p| base.join(p));
        Ok(config)
    }
}

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "tessera")]
#[command(version, about = "Tessera schema-driven record store", long_about = None)]
pub struct Args {
    /// Schema JSON file.
    #[arg(short, long)]
    pub schema: Option<PathBuf>,

    /// Directory of enum catalog JSON files.
    #[arg(long)]
    pub catalogs: Option<PathBuf>,

    /// JSON config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Page size for list operations without a limit.
    #[arg(long)]
    pub default_limit: Option<usize>,

    /// Upper bound on requested page sizes.
    #[arg(long)]
    pub max_limit: Option<usize>,

    /// Default null placement when sorting (first or last).
    #[arg(long)]
    pub nulls: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Check the schema and print every lint issue.
    Lint,

    /// Execute a JSON operation script against a fresh store.
    Run {
        /// Script file: a JSON array of operations.
        #[arg(long)]
        script: PathBuf,
    },
}

impl Args {
    /// Merge the config file (if any) with explicit flags.
    pub fn into_config(self) -> Result<CliConfig> {
        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let schema_path = self
            .schema
            .or(file.schema)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SCHEMA_PATH));

        let mut store = file.store;
        if let Some(limit) = self.default_limit {
            store = store.with_default_limit(limit);
        }
        if let Some(limit) = self.max_limit {
            store = store.with_max_limit(limit);
        }
        if let Some(nulls) = self.nulls {
            let nulls: NullsOrder = nulls
                .parse()
                .map_err(|e: tessera_core::Error| Error::Config(e.to_string()))?;
            store = store.with_default_nulls(nulls);
        }
        if store.default_limit == 0 || store.max_limit == 0 {
            return Err(Error::Config("page limits must be positive".into()));
        }

        let mut config = CliConfig::new(schema_path).with_store_config(store);
        if let Some(dir) = self.catalogs.or(file.catalogs) {
            config = config.with_catalogs_dir(dir);
        }
        Ok(config)
    }
}
