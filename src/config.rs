use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::adapters::dhcpd::DEFAULT_LEASES_FILE;
use crate::adapters::DhcpdConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub poll_interval: u64,
    pub leases_file: PathBuf,
    pub debug: bool,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            poll_interval: 10,
            leases_file: PathBuf::from(DEFAULT_LEASES_FILE),
            debug: false,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Read the TOML file named by `LEASEMON_CONFIG` if set, then apply
    /// environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let base = match env::var("LEASEMON_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        Ok(base.with_overrides(|key| env::var(key).ok()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override fields from `lookup`, which maps a variable name to its value
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(port) = lookup("LEASEMON_PORT").and_then(|s| s.parse().ok()) {
            self.port = port;
        }
        if let Some(interval) = lookup("LEASEMON_POLL_INTERVAL").and_then(|s| s.parse().ok()) {
            self.poll_interval = interval;
        }
        if let Some(file) = lookup("DHCPD_LEASES_FILE") {
            self.leases_file = PathBuf::from(file);
        }
        if let Some(debug) = lookup("LEASEMON_DEBUG") {
            self.debug = matches!(debug.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(level) = lookup("LEASEMON_LOG_LEVEL") {
            self.log_level = level;
        }
        self
    }

    pub fn dhcpd(&self) -> DhcpdConfig {
        DhcpdConfig::new(self.leases_file.clone(), self.debug)
    }
}
