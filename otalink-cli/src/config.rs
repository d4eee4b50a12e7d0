//! Configuration file support for otalink.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (OTALINK_*)
//! 3. Local config file (./otalink.toml)
//! 4. Global config file (~/.config/otalink/config.toml)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use log::{debug, warn};
use otalink::DEFAULT_CHUNK_SIZE;
use serde::{Deserialize, Serialize};

use crate::CliError;

/// Baud rate used when nothing else is configured.
pub const DEFAULT_BAUD: u32 = 115200;

/// Per-write timeout used when nothing else is configured.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;

/// Link configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Serial bridge port (e.g., "/dev/ttyUSB0" or "COM3").
    pub serial: Option<String>,
    /// Serial bridge baud rate.
    pub baud: Option<u32>,
}

/// Transfer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferSection {
    /// Bytes per chunk write.
    pub chunk_size: Option<u32>,
    /// Per-write timeout in milliseconds; 0 disables the timeout.
    pub write_timeout_ms: Option<u64>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Link configuration.
    #[serde(default)]
    pub link: LinkConfig,
    /// Transfer configuration.
    #[serde(default)]
    pub transfer: TransferSection,
}

impl Config {
    /// Load configuration from the global and local files.
    ///
    /// Unreadable or invalid files are reported and skipped.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Local config overrides global
        if let Some(local_config) = Self::load_from_file(Path::new("otalink.toml")) {
            debug!("Loaded local config from otalink.toml");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    ///
    /// An explicitly requested file must exist and parse.
    pub fn load_from_path(path: &Path) -> Result<Self, CliError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let config = toml::from_str(&content).map_err(|e| {
            CliError::Config(format!("invalid TOML in {}: {e}", path.display()))
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {} (invalid TOML): {e}", path.display());
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {e}", path.display());
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "otalink").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        if other.link.serial.is_some() {
            self.link.serial = other.link.serial;
        }
        if other.link.baud.is_some() {
            self.link.baud = other.link.baud;
        }
        if other.transfer.chunk_size.is_some() {
            self.transfer.chunk_size = other.transfer.chunk_size;
        }
        if other.transfer.write_timeout_ms.is_some() {
            self.transfer.write_timeout_ms = other.transfer.write_timeout_ms;
        }
    }
}

/// Values taken from the command line or the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<String>,
    pub baud: Option<u32>,
    pub chunk_size: Option<u32>,
    pub write_timeout_ms: Option<u64>,
}

/// Effective settings after applying every source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub port: Option<String>,
    pub baud: u32,
    pub chunk_size: u32,
    pub write_timeout: Option<Duration>,
}

impl Settings {
    /// Resolve settings; `overrides` win over the files.
    pub fn resolve(overrides: &Overrides, config: &Config) -> Self {
        let timeout_ms = overrides
            .write_timeout_ms
            .or(config.transfer.write_timeout_ms)
            .unwrap_or(DEFAULT_WRITE_TIMEOUT_MS);

        Self {
            port: overrides.port.clone().or_else(|| config.link.serial.clone()),
            baud: overrides.baud.or(config.link.baud).unwrap_or(DEFAULT_BAUD),
            chunk_size: overrides
                .chunk_size
                .or(config.transfer.chunk_size)
                .unwrap_or(DEFAULT_CHUNK_SIZE),
            write_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
        }
    }
}
