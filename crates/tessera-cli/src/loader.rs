//! Schema and catalog loading.
//!
//! A schema file is `{"version"?, "entities": [...], "catalogs"?: [...]}`. A
//! catalogs directory holds one `*.json` file per catalog, either an object
//! with `name` and `items` or a bare array of items named after the file stem.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tessera_core::{EntityDef, EnumCatalog, EnumItem, SchemaBundle};
use tracing::{debug, info};

use crate::config::CliConfig;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default = "first_version")]
    version: u64,
    entities: Vec<EntityDef>,
    #[serde(default)]
    catalogs: Vec<EnumCatalog>,
}

fn first_version() -> u64 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Items(Vec<EnumItem>),
    Named(EnumCatalog),
}

/// Parse a schema document.
pub fn parse_schema(text: &str) -> Result<SchemaBundle> {
    let file: SchemaFile = serde_json::from_str(text)?;
    let mut schema = SchemaBundle::new(file.version);
    for entity in file.entities {
        let fqn = entity.fqn();
        if schema.entities.contains_key(&fqn) {
            return Err(Error::Config(format!("entity {} is declared twice", fqn)));
        }
        schema = schema.with_entity(entity);
    }
    for catalog in file.catalogs {
        schema = schema.with_catalog(catalog);
    }
    Ok(schema)
}

/// Load every `*.json` catalog in `dir`, in file name order.
pub fn load_catalogs(dir: &Path) -> Result<Vec<EnumCatalog>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut catalogs = Vec::with_capacity(paths.len());
    for path in paths {
        let text = std::fs::read_to_string(&path)?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let catalog = match serde_json::from_str::<CatalogFile>(&text)? {
            CatalogFile::Named(mut catalog) => {
                if catalog.name.trim().is_empty() {
                    catalog.name = stem;
                }
                catalog
            }
            CatalogFile::Items(items) => EnumCatalog { name: stem, items },
        };
        debug!(path = %path.display(), catalog = %catalog.name, items = catalog.items.len(), "catalog loaded");
        catalogs.push(catalog);
    }
    Ok(catalogs)
}

/// Load the schema file plus the catalogs directory. Directory catalogs
/// replace same-named catalogs declared inline.
pub fn load_schema(config: &CliConfig) -> Result<SchemaBundle> {
    let text = std::fs::read_to_string(&config.schema_path)?;
    let mut schema = parse_schema(&text)?;

    if let Some(dir) = &config.catalogs_dir {
        for catalog in load_catalogs(dir)? {
            schema = schema.with_catalog(catalog);
        }
    }

    info!(
        path = %config.schema_path.display(),
        version = schema.version,
        entities = schema.entities.len(),
        catalogs = schema.catalogs.len(),
        "schema loaded"
    );
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{DeleteBehavior, FieldType, ScalarType};

    const SCHEMA: &str = r#"{
        "entities": [
            {
                "namespace": "crm",
                "name": "Customer",
                "fields": [
                    {"name": "name", "type": {"scalar": "string"}, "required": true},
                    {"name": "currency", "type": {"scalar": "string"}, "catalog": "currencies"}
                ]
            },
            {
                "namespace": "billing",
                "name": "Invoice",
                "fields": [
                    {"name": "amount", "type": {"scalar": "int"}},
                    {"name": "status", "type": {"enum": {"values": ["Draft", "Booked"]}}},
                    {"name": "customer", "type": {"ref": {"target": "crm.Customer"}}, "on_delete": "cascade"}
                ],
                "unique_together": [["amount", "customer"]]
            }
        ]
    }"#;

    #[test]
    fn test_parse_schema() {
        let schema = parse_schema(SCHEMA).unwrap();
        assert_eq!(schema.version, 1);
        assert_eq!(schema.entity_names(), vec!["billing.Invoice", "crm.Customer"]);

        let invoice = schema.get_entity("billing.Invoice").unwrap();
        let customer = invoice.get_field("customer").unwrap();
        assert_eq!(customer.effective_on_delete(), DeleteBehavior::Cascade);
        assert_eq!(
            invoice.get_field("amount").unwrap().field_type,
            FieldType::Scalar(ScalarType::Int)
        );
        assert_eq!(invoice.unique_together.len(), 1);

        let name = schema.get_entity("crm.Customer").unwrap().get_field("name").unwrap();
        assert!(name.options.required);
    }

    #[test]
    fn test_duplicate_entity_rejected() {
        let text = r#"{"entities": [
            {"namespace": "crm", "name": "A", "fields": []},
            {"namespace": "crm", "name": "A", "fields": []}
        ]}"#;
        assert!(matches!(parse_schema(text), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_with_catalog_dir() {
        let dir = tempfile::tempdir().unwrap();
        let schema_path = dir.path().join("schema.json");
        std::fs::write(&schema_path, SCHEMA).unwrap();

        let catalogs = dir.path().join("catalogs");
        std::fs::create_dir(&catalogs).unwrap();
        std::fs::write(
            catalogs.join("currencies.json"),
            r#"[{"code": "USD", "name": "US Dollar"}, {"code": "EUR"}]"#,
        )
        .unwrap();
        std::fs::write(
            catalogs.join("regions.json"),
            r#"{"name": "Sales Regions", "items": [{"code": "EMEA"}]}"#,
        )
        .unwrap();
        std::fs::write(catalogs.join("notes.txt"), "ignored").unwrap();

        let config = CliConfig::new(&schema_path).with_catalogs_dir(&catalogs);
        let schema = load_schema(&config).unwrap();

        let currencies = schema.catalog("currencies").unwrap();
        assert!(currencies.contains("EUR"));
        assert_eq!(currencies.items[0].name, "US Dollar");
        assert!(schema.catalog("sales regions").is_some());
        assert!(schema.lint().is_empty());
    }

    #[test]
    fn test_missing_catalog_fails_lint() {
        let schema = parse_schema(SCHEMA).unwrap();
        let issues = schema.lint();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "unknown_catalog");
    }

    #[test]
    fn test_missing_schema_file() {
        let config = CliConfig::new("/nonexistent/schema.json");
        assert!(matches!(load_schema(&config), Err(Error::Io(_))));
    }
}
