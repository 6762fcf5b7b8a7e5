//! clcache CLI entry point
//!
//! ```text
//! clcache [-s | -c | -C | -z | -M <size>] [compiler.exe] [compiler args...]
//! ```

use anyhow::Result;

use clcache::cache::FileCache;
use clcache::cli::parse_options;
use clcache::dispatch::dispatch;
use clcache::logging;
use clcache::profile::Profiler;
use clcache::settings::Settings;
use clcache::utils::terminal::print_error;

fn run() -> Result<i32> {
    let settings = Settings::from_env()?;
    logging::init(&settings);

    let argv: Vec<String> = std::env::args().collect();
    let mut profiler = Profiler::new(settings.profile);

    let options = match profiler.phase("parse", || parse_options(&argv)) {
        Ok(options) => options,
        Err(err) => err.exit(),
    };

    let cache = FileCache::open(&settings)?;
    let status = profiler.phase("dispatch", || dispatch(&options, &cache, &settings, &argv))?;

    profiler.finish(&argv, status, &settings.working_dir)?;
    Ok(status)
}

fn main() {
    match run() {
        Ok(status) => std::process::exit(status),
        Err(err) => {
            print_error(&format!("{:#}", err));
            std::process::exit(1);
        }
    }
}
