//! Compiler cache engine
//!
//! The front end only talks to the cache through the [`Cache`] trait. The
//! crate ships one implementation, [`FileCache`], which keeps everything in a
//! directory guarded by an exclusive lock file.

mod analysis;
mod configuration;
mod file_cache;
mod lock;
mod persist;
mod statistics;
mod storage;

use std::path::Path;

use anyhow::Result;

pub use analysis::{analyze_command_line, CompileJob};
pub use configuration::{
    Configuration, ConfigurationGuard, ConfigurationScope, DEFAULT_MAXIMUM_CACHE_SIZE,
};
pub use file_cache::FileCache;
pub use lock::CacheLock;
pub use statistics::{PassThrough, Statistics};
pub use storage::{CleanReport, CompilerArtifacts, Manifest, ObjectStore};

/// Operations the command dispatcher needs from a cache
pub trait Cache {
    /// Guard returned by [`lock_configuration`](Cache::lock_configuration)
    type Configuration: ConfigurationScope;

    /// Take the cache lock and open the configuration together
    ///
    /// Blocks until the lock is available. Both are released when the
    /// returned guard is dropped.
    fn lock_configuration(&self) -> Result<Self::Configuration>;

    /// Print the statistics report to stdout
    fn print_statistics(&self) -> Result<()>;

    /// Remove stale entries and shrink the cache below its maximum size
    fn clean(&self) -> Result<()>;

    /// Remove every entry
    fn clear(&self) -> Result<()>;

    /// Zero the statistics counters
    fn reset_statistics(&self) -> Result<()>;

    /// Serve the invocation from the cache or run the real compiler
    ///
    /// Returns the exit status to report for this invocation.
    fn run(&self, compiler: &Path, args: &[String]) -> Result<i32>;
}
