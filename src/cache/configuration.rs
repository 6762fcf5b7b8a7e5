//! Persisted cache configuration

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::lock::CacheLock;
use super::persist;

/// File name of the configuration inside the cache directory
pub const CONFIG_FILE: &str = "config.txt";

/// Default maximum cache size, 1 GiB
pub const DEFAULT_MAXIMUM_CACHE_SIZE: u64 = 1024 * 1024 * 1024;

/// Cache-wide settings shared by every clcache process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Configuration {
    #[serde(default = "default_maximum_cache_size")]
    pub maximum_cache_size: u64,
}

fn default_maximum_cache_size() -> u64 {
    DEFAULT_MAXIMUM_CACHE_SIZE
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            maximum_cache_size: DEFAULT_MAXIMUM_CACHE_SIZE,
        }
    }
}

impl Configuration {
    /// Configuration file path for a cache directory
    pub fn config_file(cache_dir: &Path) -> PathBuf {
        cache_dir.join(CONFIG_FILE)
    }

    /// Load the configuration of a cache directory
    pub fn load(cache_dir: &Path) -> Self {
        persist::load_or_default(&Self::config_file(cache_dir))
    }

    /// Persist the configuration into a cache directory
    pub fn save(&self, cache_dir: &Path) -> Result<()> {
        persist::save(&Self::config_file(cache_dir), self)
    }
}

/// Scoped access to the configuration while holding the cache lock
///
/// Implemented by the guard a [`Cache`](super::Cache) hands out; the lock is
/// released when the guard is dropped, whichever way the scope is left.
pub trait ConfigurationScope {
    /// Currently configured maximum size in bytes
    fn maximum_cache_size(&self) -> u64;

    /// Change the maximum size; takes effect on [`save`](Self::save)
    fn set_maximum_cache_size(&mut self, bytes: u64);

    /// Persist the configuration
    fn save(&mut self) -> Result<()>;
}

/// Cache lock and configuration, acquired and released together
#[derive(Debug)]
pub struct ConfigurationGuard {
    cache_dir: PathBuf,
    configuration: Configuration,
    _lock: CacheLock,
}

impl ConfigurationGuard {
    /// Lock the cache and load its configuration
    pub fn acquire(cache_dir: &Path) -> Result<Self> {
        let lock = CacheLock::acquire(cache_dir)?;
        Ok(Self {
            cache_dir: cache_dir.to_path_buf(),
            configuration: Configuration::load(cache_dir),
            _lock: lock,
        })
    }
}

impl ConfigurationScope for ConfigurationGuard {
    fn maximum_cache_size(&self) -> u64 {
        self.configuration.maximum_cache_size
    }

    fn set_maximum_cache_size(&mut self, bytes: u64) {
        self.configuration.maximum_cache_size = bytes;
    }

    fn save(&mut self) -> Result<()> {
        self.configuration.save(&self.cache_dir)
    }
}
