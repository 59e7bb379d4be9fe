//! Client configuration
//!
//! Loaded from TOML or built in code. Every field has a default so a config
//! file only needs to name the robot.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MistyClientError, Result};

/// Default request timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
/// Default connection timeout
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
/// Default event debounce, matching the robot's own default
pub const DEFAULT_DEBOUNCE_MS: u32 = 250;

/// Connection settings for one robot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Robot network address, `host` or `host:port` (e.g. "192.168.1.96")
    pub address: String,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// TCP connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Debounce used by convenience registrations (`add_imu`, ...)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_debounce_ms() -> u32 {
    DEFAULT_DEBOUNCE_MS
}

impl ClientConfig {
    /// Config for `address` with default timeouts
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| MistyClientError::Parse(e.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
