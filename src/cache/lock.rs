//! Cross-process cache lock

use std::fs::{File, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result};
use fs2::FileExt;

/// File name of the lock inside the cache directory
pub const LOCK_FILE: &str = "cache.lock";

/// Exclusive lock on a cache directory, released on drop
#[derive(Debug)]
pub struct CacheLock {
    file: File,
}

impl CacheLock {
    /// Block until the lock for `cache_dir` is available
    pub fn acquire(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir).with_context(|| {
            format!("Failed to create cache directory: {}", cache_dir.display())
        })?;

        let lock_path = cache_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

        file.lock_exclusive()
            .with_context(|| format!("Failed to lock cache: {}", lock_path.display()))?;
        crate::trace_statement!("Acquired cache lock {}", lock_path.display());

        Ok(Self { file })
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
