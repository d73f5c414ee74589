//! Configuration error types

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// A configuration value is invalid
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    /// The configuration file could not be read or parsed
    File {
        path: String,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: impl ToString, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue { key, value, reason } => {
                write!(f, "Invalid configuration for {}: '{}' ({})", key, value, reason)
            }
            ConfigError::File { path, reason } => {
                write!(f, "Failed to load configuration file {}: {}", path, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
