//! Daemon configuration file.
//!
//! Read from `<config_dir>/reclaim-focus/rfd.toml` when present. Every
//! field is optional; `RF_SOCKET` and `RF_STORE` override the socket and
//! store paths after the file is read.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::engine::EngineConfig;

/// Default socket path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/reclaim-focus.sock";

const APP_DIR: &str = "reclaim-focus";

pub const SOCKET_ENV: &str = "RF_SOCKET";
pub const STORE_ENV: &str = "RF_STORE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub socket_path: PathBuf,
    pub store_path: PathBuf,
    pub tick_interval_ms: u64,
    pub snapshot_interval_secs: u64,
    pub max_log_entries: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            store_path: default_store_path(),
            tick_interval_ms: 1000,
            snapshot_interval_secs: 15,
            max_log_entries: 1000,
        }
    }
}

impl DaemonConfig {
    /// Loads configuration from `path`, or from the default location when
    /// `None`. A missing default file yields the defaults; a missing file
    /// named explicitly is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config
            .with_overrides(std::env::var(SOCKET_ENV).ok(), std::env::var(STORE_ENV).ok())
            .validated()
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Applies the socket and store environment overrides. Blank values
    /// are ignored.
    #[must_use]
    pub fn with_overrides(mut self, socket: Option<String>, store: Option<String>) -> Self {
        if let Some(socket) = socket.filter(|s| !s.trim().is_empty()) {
            self.socket_path = PathBuf::from(socket);
        }
        if let Some(store) = store.filter(|s| !s.trim().is_empty()) {
            self.store_path = PathBuf::from(store);
        }
        self
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tick_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.snapshot_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "snapshot_interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_log_entries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_log_entries",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(self)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            snapshot_interval: Duration::from_secs(self.snapshot_interval_secs),
            max_log_entries: self.max_log_entries,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(APP_DIR)
        .join("rfd.toml")
}

pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(APP_DIR)
        .join("store.json")
}
