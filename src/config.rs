use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use crate::crypto::Address;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LedgerConfig {
    pub node: NodeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub authority: AuthorityConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NodeConfig {
    pub rpc_port: u16,
    pub db_path: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    RocksDb,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct AuthorityConfig {
    /// Identities holding the admin role
    #[serde(default)]
    pub admins: Vec<Address>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            node: NodeConfig {
                rpc_port: 9000,
                db_path: "./data/ledger".to_string(),
                log_level: "info".to_string(),
            },
            storage: StorageConfig::default(),
            authority: AuthorityConfig::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("invalid config {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("could not write config {path}: {reason}")]
    Write { path: String, reason: String },
}

/// Where the configuration in use came from. Loading happens before logging
/// is up, so callers report this once the subscriber exists.
#[derive(Debug)]
pub enum ConfigSource {
    File,
    CreatedDefault,
    /// No file existed and the defaults could not be written back.
    DefaultUnwritten(ConfigError),
}

impl LedgerConfig {
    /// Reads `path`, or writes out and returns the defaults when no file exists.
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: &str) -> Result<(Self, ConfigSource), ConfigError> {
        if !Path::new(path).exists() {
            let config = Self::default();
            let source = match config.save(path) {
                Ok(()) => ConfigSource::CreatedDefault,
                Err(e) => ConfigSource::DefaultUnwritten(e),
            };
            return Ok((config, source));
        }

        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let config = toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok((config, ConfigSource::File))
    }

    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        let write_err = |reason: String| ConfigError::Write { path: path.to_string(), reason };
        let text = toml::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| write_err(e.to_string()))
    }
}
