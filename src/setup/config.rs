/* src/setup/config.rs */

use crate::device::command::DEFAULT_DRAIN_DELAY;
use crate::device::netconf::{DEFAULT_INTERFACE, DEFAULT_TOOL};
use crate::device::queue::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read { path: String, source: io::Error },
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SetupConfig {
    pub mode: String,
    pub certificate: String,
    pub private_key: String,
    pub auth_token: String,
    pub log_level: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NetworkConfig {
    pub listen: String,
    pub address: String,
    pub port: u16,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DeviceConfig {
    pub data_root: String,
    #[serde(default = "default_interface")]
    pub interface: String,
    #[serde(default = "default_tool")]
    pub netconf_tool: String,
    #[serde(default = "default_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_drain_delay")]
    pub drain_delay_ms: u64,
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub setup: SetupConfig,
    pub network: NetworkConfig,
    pub device: Option<DeviceConfig>,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

fn default_idle_timeout() -> u64 {
    10
}

fn default_interface() -> String {
    DEFAULT_INTERFACE.to_string()
}

fn default_tool() -> String {
    DEFAULT_TOOL.to_string()
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_drain_delay() -> u64 {
    DEFAULT_DRAIN_DELAY.as_millis() as u64
}

fn default_max_upload() -> u64 {
    1024 * 1024
}
