//! Centralized application configuration
//!
//! Layered loading: hardcoded defaults, then an optional TOML file, then
//! environment variables (which always win).
//!
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0"
//! port = 8080
//! request_timeout_ms = 10000
//! shutdown_timeout_ms = 5000
//!
//! [storage]
//! db_path = "./data/vtfs.redb"
//!
//! [logging]
//! filter = "info"
//! ```

pub mod error;
pub mod logging;
pub mod server;
pub mod storage;

use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

pub use error::ConfigError;
pub use logging::LoggingConfig;
pub use server::ServerConfig;
pub use storage::StorageConfig;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.display().to_string(),
            reason: format!("Failed to read file: {}", e),
        })?;

        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::File { reason, .. } => ConfigError::File {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::File {
            path: "<inline>".to_string(),
            reason: format!("Failed to parse TOML: {}", e),
        })
    }

    /// Load configuration with layered approach:
    /// 1. Start with defaults
    /// 2. Load from the TOML file if one was given
    /// 3. Override with `VTFS_*` environment variables
    ///
    /// Not validated: callers apply their own overrides first, then call
    /// [`AppConfig::validate`]. Runs before logging is set up, so it logs nothing.
    pub fn load_with_layers(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_layers_from(path, |key| std::env::var(key).ok())
    }

    /// [`AppConfig::load_with_layers`] with an arbitrary override lookup
    pub fn load_with_layers_from(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides_from(lookup)?;
        Ok(config)
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        self.server.apply_overrides(&lookup)?;
        self.storage.apply_overrides(&lookup)?;
        self.logging.apply_overrides(&lookup)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.listen_addr(), "0.0.0.0:8080");
        assert_eq!(config.storage.db_path, PathBuf::from("./data/vtfs.redb"));
        assert_eq!(config.logging.filter, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str("[server]\nport = 9000\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.request_timeout_ms, 10_000);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_env_overrides_win_over_file() {
        let mut config = AppConfig::from_toml_str("[server]\nport = 9000\n[storage]\ndb_path = \"/a\"\n").unwrap();
        config
            .apply_overrides_from(lookup(&[("VTFS_PORT", "9100"), ("VTFS_DB_PATH", "/b"), ("VTFS_LOG", "debug")]))
            .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.storage.db_path, PathBuf::from("/b"));
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn test_bad_env_value_is_rejected() {
        let mut config = AppConfig::default();
        let err = config.apply_overrides_from(lookup(&[("VTFS_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "VTFS_PORT"));
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.request_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.storage.db_path = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(AppConfig::from_toml_str("[server\nport = "), Err(ConfigError::File { .. })));
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vtfs.toml");
        std::fs::write(&path, "[logging]\nfilter = \"vtfs=trace\"\n").unwrap();
        let config = AppConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.logging.filter, "vtfs=trace");

        let missing = AppConfig::from_toml_file(dir.path().join("nope.toml")).unwrap_err();
        assert!(missing.to_string().contains("nope.toml"));
    }

    #[test]
    fn test_later_layer_can_repair_file_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vtfs.toml");
        std::fs::write(&path, "[server]\nport = 0\n").unwrap();

        let mut config = AppConfig::load_with_layers_from(Some(path.as_path()), |_| None).unwrap();
        assert_eq!(config.server.port, 0);
        assert!(config.validate().is_err());

        config.server.port = 9000;
        assert!(config.validate().is_ok());

        let config = AppConfig::load_with_layers_from(Some(path.as_path()), lookup(&[("VTFS_PORT", "9100")])).unwrap();
        assert_eq!(config.server.port, 9100);
        assert!(config.validate().is_ok());
    }
}
