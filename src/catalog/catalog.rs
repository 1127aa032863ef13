//! Schema catalog for REIR
//!
//! The catalog is a key-value metadata store holding serialized schemas
//! under `table:global_schema:<name>`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use tracing::{debug, info};

use super::schema::Schema;
use crate::error::{Error, Result};

/// Key namespace of persisted table schemas
pub const SCHEMA_KEY_PREFIX: &str = "table:global_schema:";

/// Catalog key of a table's schema
pub fn schema_key(table: &str) -> String {
    format!("{}{}", SCHEMA_KEY_PREFIX, table)
}

/// Table names must be non-empty identifiers; `:` and `;` delimit key ranges
/// and the serialized schema
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidTableName(name.to_string()))
    }
}

/// A key-value metadata store
pub trait Catalog {
    /// Store `value` under `key`, replacing any previous value
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Fetch the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Persist a table schema
    fn store_schema(&self, schema: &Schema) -> Result<()> {
        validate_table_name(schema.name())?;
        info!(table = schema.name(), "persisting schema");
        self.put(&schema_key(schema.name()), &schema.serialize())
    }

    /// Load a table schema
    fn load_schema(&self, table: &str) -> Result<Schema> {
        match self.get(&schema_key(table))? {
            Some(serialized) => Schema::deserialize(&serialized),
            None => Err(Error::TableNotFound(table.to_string())),
        }
    }
}

/// In-memory catalog with JSON snapshots
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// List all table names with a persisted schema
    pub fn list_tables(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .keys()
            .filter_map(|k| k.strip_prefix(SCHEMA_KEY_PREFIX))
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Save catalog to disk
    pub fn save_to_disk(&self, path: &Path) -> Result<()> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let json = serde_json::to_string_pretty(&*entries)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), entries = entries.len(), "catalog saved");
        Ok(())
    }

    /// Load catalog from disk
    pub fn load_from_disk(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let entries: BTreeMap<String, String> = serde_json::from_str(&json)?;
        info!(path = %path.display(), entries = entries.len(), "catalog loaded");
        Ok(Self {
            entries: RwLock::new(entries),
        })
    }
}

impl Catalog for MemoryCatalog {
    fn put(&self, key: &str, value: &str) -> Result<()> {
        debug!(key, "catalog put");
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }
}
