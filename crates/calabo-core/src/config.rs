//! Controller configuration
//!
//! All link timing lives here so nothing about the serial line is hard-coded.
//! Stored as JSON; missing fields take their defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{
    DEFAULT_BAUD_RATE, DEFAULT_EOL, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_MS, MAX_STATUS_LEN,
};

/// Errors loading or saving a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid configuration JSON
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Connection and protocol timing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Serial port name
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Line ending appended to each command
    pub write_eol: String,
    /// How long a read waits for data, in milliseconds
    pub read_timeout_ms: u64,
    /// Interval between polls of the port, in milliseconds
    pub poll_interval_ms: u64,
    /// How long to listen for unsolicited messages after the boot banner
    pub boot_settle_ms: u64,
    /// Interval between status polls while waiting to write a setting
    pub guard_poll_interval_ms: u64,
    /// Status polls before a settings write gives up
    pub guard_max_polls: u32,
    /// Longest accepted status report
    pub status_max_len: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            write_eol: DEFAULT_EOL.to_string(),
            read_timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            boot_settle_ms: 100,
            guard_poll_interval_ms: 100,
            guard_max_polls: 50,
            status_max_len: MAX_STATUS_LEN,
        }
    }
}

impl ControllerConfig {
    /// Default configuration for `port_name`
    pub fn for_port(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded controller config");
        Ok(config)
    }

    /// Save as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// [`read_timeout_ms`](Self::read_timeout_ms) as a duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// [`poll_interval_ms`](Self::poll_interval_ms) as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// [`boot_settle_ms`](Self::boot_settle_ms) as a duration
    pub fn boot_settle(&self) -> Duration {
        Duration::from_millis(self.boot_settle_ms)
    }

    /// [`guard_poll_interval_ms`](Self::guard_poll_interval_ms) as a duration
    pub fn guard_poll_interval(&self) -> Duration {
        Duration::from_millis(self.guard_poll_interval_ms)
    }
}
