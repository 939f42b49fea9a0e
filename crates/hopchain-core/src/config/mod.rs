//! Chain configuration

pub mod serde_utils;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::{Endpoint, HopSpec, DEFAULT_SSH_PORT};

/// Description of a whole tunnel chain: the ordered hops and the final
/// destination they forward to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Final destination the chain forwards to
    pub target: Endpoint,

    /// SSH port used to reach intermediate hops unless a hop declares
    /// its own listen port
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,

    /// Ordered hop specifications, first hop outermost
    pub hops: Vec<HopSpec>,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hopchain")
}

/// Get the default chain configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("chain.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("failed to write config: {}", e)))?;

    Ok(())
}
