//! clcache - a compiler cache front end for MSVC `cl.exe`
//!
//! The binary resolves its command line into either an administrative cache
//! command or a compiler invocation, then hands it to the cache.
//!
//! ## Architecture
//!
//! ```text
//! argv → cli (clap) → invocation (positional resolver) → dispatch → cache::Cache
//! ```

pub mod cache;
pub mod cli;
pub mod compiler;
pub mod dispatch;
pub mod error;
pub mod exec;
pub mod invocation;
pub mod logging;
pub mod profile;
pub mod settings;
pub mod utils;
