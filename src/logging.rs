//! Trace output
//!
//! Trace statements are emitted with `tracing` under the `clcache` target and
//! only become visible when `CLCACHE_LOG` is set. They go to stderr so they
//! never interleave with the compiler output replayed on stdout.

use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

/// Install the global subscriber for this process
pub fn init(settings: &Settings) {
    let filter = if settings.log {
        EnvFilter::new("clcache=debug")
    } else {
        EnvFilter::new("clcache=warn")
    };

    // A second initialisation (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

/// Emit a trace statement, visible only with `CLCACHE_LOG`
#[macro_export]
macro_rules! trace_statement {
    ($($arg:tt)*) => {
        ::tracing::debug!(target: "clcache", $($arg)*)
    };
}
