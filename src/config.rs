//! Driver configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::executor::DEFAULT_SEED;

/// Settings for compiling and running programs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Seed of the generator behind `rand`
    pub rand_seed: u64,
    /// Abort programs that execute more instructions than this
    pub max_steps: Option<u64>,
    /// Store schemas of defined tables in the catalog
    pub persist_schemas: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            rand_seed: DEFAULT_SEED,
            max_steps: None,
            persist_schemas: true,
        }
    }
}

impl DriverConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rand_seed(mut self, seed: u64) -> Self {
        self.rand_seed = seed;
        self
    }

    pub fn max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn persist_schemas(mut self, persist: bool) -> Self {
        self.persist_schemas = persist;
        self
    }

    /// Load a config from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
