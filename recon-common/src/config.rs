//! Configuration loading and resolution
//!
//! Every setting is resolved in priority order:
//! 1. Command-line argument or environment variable (both arrive as overrides)
//! 2. TOML config file
//! 3. OS-dependent compiled default

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 3500;

/// Default bind address
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Default lock-wait bound for one identify request
pub const DEFAULT_LOCK_WAIT_MS: u64 = 5000;

/// Default connection pool size
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Settings as read from a TOML config file; every key is optional
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
    pub lock_wait_ms: Option<u64>,
    pub max_connections: Option<u32>,
}

/// Values supplied on the command line (or via their env fallbacks)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
    pub lock_wait_ms: Option<u64>,
    pub max_connections: Option<u32>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub bind: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub lock_wait_ms: u64,
    pub max_connections: u32,
}

impl ServiceConfig {
    /// Merge overrides, file settings and compiled defaults
    pub fn resolve(overrides: ConfigOverrides, file: TomlConfig) -> Result<Self> {
        let config = Self {
            bind: overrides
                .bind
                .or(file.bind)
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: overrides.port.or(file.port).unwrap_or(DEFAULT_PORT),
            database_path: overrides
                .database_path
                .or(file.database_path)
                .unwrap_or_else(default_database_path),
            lock_wait_ms: overrides
                .lock_wait_ms
                .or(file.lock_wait_ms)
                .unwrap_or(DEFAULT_LOCK_WAIT_MS),
            max_connections: overrides
                .max_connections
                .or(file.max_connections)
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
        };

        if config.lock_wait_ms == 0 {
            return Err(Error::Config("lock_wait_ms must be greater than 0".to_string()));
        }
        if config.max_connections == 0 {
            return Err(Error::Config("max_connections must be greater than 0".to_string()));
        }

        Ok(config)
    }

    /// Lock-wait bound as a Duration
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }
}

/// Load the TOML config file
///
/// An explicitly named file must exist. Without one, the platform config
/// locations are tried and a missing file falls back to empty settings.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_paths().into_iter().find(|p| p.exists()) {
            Some(path) => path,
            None => {
                info!("No config file found, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)?;
    let config = toml::from_str::<TomlConfig>(&content).map_err(|e| {
        warn!("Failed to parse config file {}: {}", path.display(), e);
        Error::Config(format!("Invalid config file {}: {}", path.display(), e))
    })?;

    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Candidate config file locations for the platform, most specific first
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("recon").join("config.toml"));
    }
    if cfg!(unix) {
        paths.push(PathBuf::from("/etc/recon/config.toml"));
    }
    paths
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/recon (or /var/lib/recon for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("recon"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/recon"))
            .join("contacts.db")
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("recon"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\recon"))
            .join("contacts.db")
    } else {
        dirs::data_dir()
            .map(|d| d.join("recon"))
            .unwrap_or_else(|| PathBuf::from("./recon_data"))
            .join("contacts.db")
    }
}
