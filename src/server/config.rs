//! Configuration loading for the `cached` daemon.
//!
//! Resolution order mirrors the teacher daemon's `server::config::Config`:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.modelcache/config.toml` (user)
//! 3. `/etc/modelcache/config.toml` (system)
//!
//! Unlike the teacher there are no provider API keys to keep out of the
//! main file, so there is no separate secrets file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::CacheEngineConfig;
use crate::{CacheError, Result};

/// Top-level daemon configuration: network settings plus the engine and
/// storage-backend sections.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheEngineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Network listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:8088).
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: default_address() }
    }
}

fn default_address() -> String {
    "127.0.0.1:8088".to_string()
}

/// Storage-backend selection and paths.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Where the scalar store persists rows. A `sqlite:` prefix selects the
    /// SQLite backend (requires the `sqlite` feature); otherwise the
    /// in-memory scalar store is used and this value is ignored.
    #[serde(default = "default_scalar_store_url")]
    pub scalar_store_url: String,
    /// Root directory for the filesystem object store.
    #[serde(default = "default_object_store_dir")]
    pub object_store_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            scalar_store_url: default_scalar_store_url(),
            object_store_dir: default_object_store_dir(),
        }
    }
}

fn default_scalar_store_url() -> String {
    "sqlite:modelcache.db".to_string()
}

fn default_object_store_dir() -> PathBuf {
    PathBuf::from("./modelcache-objects")
}

impl Config {
    /// Load configuration from the standard locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let Some(path) = path else {
            return Ok(Config::default_for_missing_file());
        };
        let content = fs::read_to_string(&path)
            .map_err(|e| CacheError::Configuration(format!("reading config file {path:?}: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| CacheError::Configuration(format!("parsing config file {path:?}: {e}")))
    }

    /// No config file anywhere in the chain is not an error: every field has
    /// a default, unlike the teacher (which requires provider credentials).
    fn default_for_missing_file() -> Self {
        Config { server: ServerConfig::default(), cache: CacheEngineConfig::default(), storage: StorageConfig::default() }
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(CacheError::Configuration(format!("config file not found: {path:?}")));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".modelcache").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/modelcache/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }
}
