use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::access::{
    MonitorSettings, DEFAULT_BAUD_RATE, DEFAULT_POLL_INTERVAL_MS, DEFAULT_READ_TIMEOUT_MS,
    DEFAULT_SETTLE_DELAY_MS,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Connection and polling parameters for one monitoring session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub port: Option<String>,
    pub baud_rate: u32,
    pub poll_interval_ms: u64,
    pub read_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub read_chunk: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            read_chunk: 256,
        }
    }
}

impl MonitorConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check the values a session cannot start without
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.port.as_deref() {
            None | Some("") => return Err(ConfigError::Invalid("no serial port configured".to_string())),
            _ => {}
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud_rate must be non-zero".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be non-zero".to_string()));
        }
        if self.read_chunk == 0 {
            return Err(ConfigError::Invalid("read_chunk must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            read_chunk: self.read_chunk,
        }
    }
}
