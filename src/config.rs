//! Service configuration, read once at startup from a JSON file.
//!
//! ```json
//! {
//!   "deadline": "2026-06-10T22:00:00Z",
//!   "parse_server_url": "https://parseapi.back4app.com",
//!   "parse_app_id": "...",
//!   "parse_js_key": "...",
//!   "allowed_origin": "https://sporttag.b4a.app",
//!   "request_timeout_secs": 10,
//!   "bind": "0.0.0.0:8080"
//! }
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_ORIGIN: &str = "https://sporttag.b4a.app";
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Registrations after this instant are refused. Compared in UTC.
    pub deadline: DateTime<Utc>,
    #[serde(default)]
    pub parse_server_url: String,
    #[serde(default)]
    pub parse_app_id: String,
    #[serde(default)]
    pub parse_js_key: String,
    #[serde(default = "default_origin")]
    pub allowed_origin: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Config {
    /// Read and parse the config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Replace the port of `bind` with `port` (the `PORT` variable most
    /// hosting platforms set).
    pub fn apply_port(&mut self, port: &str) -> Result<(), ConfigError> {
        let port: u16 = port
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("PORT is not a port number: {port:?}")))?;
        let mut addr = self.bind_addr()?;
        addr.set_port(port);
        self.bind = addr.to_string();
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("bind is not a socket address: {:?}", self.bind)))
    }

    /// Check the settings the service cannot run without. The Parse
    /// settings are only required when the remote store is used.
    pub fn validate(&self, require_store: bool) -> Result<(), ConfigError> {
        if require_store {
            let missing: Vec<&str> = [
                ("parse_server_url", &self.parse_server_url),
                ("parse_app_id", &self.parse_app_id),
                ("parse_js_key", &self.parse_js_key),
            ]
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
            if !missing.is_empty() {
                return Err(ConfigError::Invalid(format!("missing {}", missing.join(", "))));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be positive".into()));
        }
        if self.allowed_origin.trim().is_empty() {
            return Err(ConfigError::Invalid("allowed_origin is empty".into()));
        }
        self.bind_addr()?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
