//! Server and client configuration
//!
//! Both structs can be read from a JSON file; every field is optional and
//! falls back to its default. Command-line flags are applied on top by the
//! binaries.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::protocol::{DEFAULT_PORT, DISPLAY_LINE_LEN};

/// Server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the listener to
    pub bind: String,
    pub port: u16,
    /// Maximum number of registered sessions
    pub capacity: usize,
    /// Stop the server when the last registered session leaves
    pub shutdown_on_empty: bool,
    /// Upper bound on any blocking wait before the shutdown flag is re-read
    pub poll_interval_ms: u64,
    /// How long a leaving session may take to flush its queued output
    pub drain_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            capacity: 10,
            shutdown_on_empty: true,
            poll_interval_ms: 100,
            drain_timeout_ms: 1000,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_json(path)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Display name sent at registration
    pub user: String,
    /// Server hostname or IP address
    pub server: String,
    pub port: u16,
    /// Rows in the message pane before it wraps
    pub display_height: usize,
    /// Columns of the message pane, box included
    pub display_width: usize,
    pub poll_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user: "guest".to_string(),
            server: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            display_height: 20,
            display_width: DISPLAY_LINE_LEN + 2,
            poll_interval_ms: 100,
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_json(path)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
