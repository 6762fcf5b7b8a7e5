//! Process-wide settings captured once at startup
//!
//! Every environment variable the tool honours is read here and nowhere
//! else, so the resolver, the dispatcher and the cache engine can be driven
//! from tests without touching the process environment.

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Compiler override
pub const ENV_COMPILER: &str = "CLCACHE_CL";
/// Enables profiling of a single invocation
pub const ENV_PROFILE: &str = "CLCACHE_PROFILE";
/// Cache directory override
pub const ENV_CACHE_DIR: &str = "CLCACHE_DIR";
/// Enables trace output
pub const ENV_LOG: &str = "CLCACHE_LOG";
/// Bypasses the cache entirely
pub const ENV_DISABLE: &str = "CLCACHE_DISABLE";

/// Snapshot of the environment relevant to one invocation
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Value of `CLCACHE_CL`
    pub compiler_override: Option<String>,
    /// Value of `PATH`
    pub search_path: Option<OsString>,
    /// Value of `CLCACHE_DIR`
    pub cache_dir: Option<PathBuf>,
    /// `CLCACHE_PROFILE` is set
    pub profile: bool,
    /// `CLCACHE_LOG` is set
    pub log: bool,
    /// `CLCACHE_DISABLE` is set
    pub disabled: bool,
    /// Working directory used for relative paths and profile output
    pub working_dir: PathBuf,
    /// Path of the running executable, never picked as the compiler
    pub current_exe: Option<PathBuf>,
}

impl Settings {
    /// Read the settings from the current process environment
    pub fn from_env() -> Result<Self> {
        let working_dir =
            std::env::current_dir().context("Failed to get current directory")?;
        let mut settings = Self::from_lookup(|key| std::env::var_os(key), working_dir);
        settings.current_exe = std::env::current_exe().ok();
        Ok(settings)
    }

    /// Build settings from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F, working_dir: PathBuf) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Self {
            compiler_override: non_empty(ENV_COMPILER)
                .map(|v| v.to_string_lossy().into_owned()),
            search_path: lookup("PATH"),
            cache_dir: non_empty(ENV_CACHE_DIR).map(PathBuf::from),
            profile: lookup(ENV_PROFILE).is_some(),
            log: lookup(ENV_LOG).is_some(),
            disabled: lookup(ENV_DISABLE).is_some(),
            working_dir,
            current_exe: None,
        }
    }

    /// Directory holding the cache, `CLCACHE_DIR` or `<home>/clcache`
    pub fn resolve_cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(self.working_dir.join(dir));
        }

        let base_dirs = directories::BaseDirs::new()
            .context("Failed to get base directories")?;
        Ok(base_dirs.home_dir().join("clcache"))
    }
}
