//! Storage-related configuration

use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use super::error::ConfigError;

/// Storage-related configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the redb database file
    pub db_path: PathBuf,
}

impl StorageConfig {
    /// Apply overrides from a variable lookup
    pub fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(val) = lookup("VTFS_DB_PATH") {
            self.db_path = val.into();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("storage.db_path", "", "must not be empty"));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "./data/vtfs.redb".into(),
        }
    }
}
