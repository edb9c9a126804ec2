//! planbridge configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::bridge::BridgeConfig;
use crate::ipc::client::DEFAULT_MAX_MESSAGE_SIZE;
use crate::ipc::get_socket_path;

/// Main planbridge configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Plan store configuration
    pub store: StoreConfig,

    /// Request/broadcast bridge configuration
    pub bridge: BridgeConfig,

    /// Daemon socket configuration
    pub ipc: IpcConfig,
}

impl Config {
    /// Check values that would otherwise fail at runtime
    pub fn validate(&self) -> Result<()> {
        if self.bridge.request_timeout_ms == 0 {
            return Err(eyre::eyre!("bridge.request-timeout-ms must be greater than zero"));
        }
        if self.bridge.channel_buffer == 0 || self.bridge.client_channel_buffer == 0 {
            return Err(eyre::eyre!("bridge channel buffers must be greater than zero"));
        }
        if self.ipc.max_message_size == 0 {
            return Err(eyre::eyre!("ipc.max-message-size must be greater than zero"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `./.planbridge.yml`, then
    /// `<config dir>/planbridge/planbridge.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::search_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(path) => path.clone(),
            None => Self::search_paths().into_iter().find(|p| p.exists())?,
        };
        let content = fs::read_to_string(path).ok()?;
        let config: Self = serde_yaml::from_str(&content).ok()?;
        config.log_level
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".planbridge.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("planbridge").join("planbridge.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Plan store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one JSON file per task
    #[serde(rename = "plans-dir")]
    pub plans_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            plans_dir: planstore::config::default_plans_dir(),
        }
    }
}

/// Daemon socket configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    #[serde(rename = "socket-path")]
    pub socket_path: PathBuf,

    /// Longest accepted line in bytes
    #[serde(rename = "max-message-size")]
    pub max_message_size: usize,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            socket_path: get_socket_path(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}
