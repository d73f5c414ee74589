//! HTTP server configuration

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::error::ConfigError;

/// HTTP listener and request handling configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to
    pub bind_addr: String,
    /// HTTP listener port
    pub port: u16,
    /// Operations running longer than this are logged as slow, in milliseconds
    pub request_timeout_ms: u64,
    /// Time allowed for in-flight requests to drain on shutdown, in milliseconds
    pub shutdown_timeout_ms: u64,
}

impl ServerConfig {
    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(val) = lookup("VTFS_BIND_ADDR") {
            self.bind_addr = val;
        }
        if let Some(val) = lookup("VTFS_PORT") {
            self.port = val
                .parse()
                .map_err(|e| ConfigError::invalid("VTFS_PORT", &val, format!("must be a valid port number: {}", e)))?;
        }
        if let Some(val) = lookup("VTFS_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = val
                .parse()
                .map_err(|e| ConfigError::invalid("VTFS_REQUEST_TIMEOUT_MS", &val, format!("must be milliseconds: {}", e)))?;
        }
        if let Some(val) = lookup("VTFS_SHUTDOWN_TIMEOUT_MS") {
            self.shutdown_timeout_ms = val
                .parse()
                .map_err(|e| ConfigError::invalid("VTFS_SHUTDOWN_TIMEOUT_MS", &val, format!("must be milliseconds: {}", e)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::invalid("server.port", self.port, "must be non-zero"));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::invalid("server.request_timeout_ms", 0, "must be non-zero"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// `bind_addr:port`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_ms: 10_000,
            shutdown_timeout_ms: 5_000,
        }
    }
}
