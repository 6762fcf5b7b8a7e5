//! Command dispatch
//!
//! Exactly one branch runs per invocation. The administrative commands touch
//! cache-wide state; the compile branch hands the invocation to the cache.

use anyhow::Result;

use crate::cache::{Cache, ConfigurationScope};
use crate::compiler::resolve_compiler;
use crate::error::ClcacheError;
use crate::invocation::{Action, Options};
use crate::settings::Settings;
use crate::trace_statement;
use crate::utils::terminal::print_done;

/// Run the selected action and return the process exit status
///
/// `argv` is the complete command line, program name included; it is only
/// used for tracing.
pub fn dispatch<C: Cache>(
    options: &Options,
    cache: &C,
    settings: &Settings,
    argv: &[String],
) -> Result<i32> {
    match &options.action {
        Action::ShowStats => {
            cache.print_statistics()?;
            Ok(0)
        }
        Action::Clean => {
            cache.clean()?;
            print_done("Cache cleaned");
            Ok(0)
        }
        Action::Clear => {
            cache.clear()?;
            print_done("Cache cleared");
            Ok(0)
        }
        Action::ResetStats => {
            cache.reset_statistics()?;
            print_done("Statistics reset");
            Ok(0)
        }
        Action::SetSize(requested) => set_maximum_size(cache, *requested),
        Action::Compile => compile(options, cache, settings, argv),
    }
}

fn set_maximum_size<C: Cache>(cache: &C, requested: i128) -> Result<i32> {
    if requested < 1 {
        let err = ClcacheError::invalid_cache_size(requested);
        err.display_with_hints();
        return Ok(err.exit_code());
    }
    // Sizes beyond the address range mean "unbounded".
    let bytes = u64::try_from(requested).unwrap_or(u64::MAX);

    let mut configuration = cache.lock_configuration()?;
    configuration.set_maximum_cache_size(bytes);
    configuration.save()?;
    trace_statement!("Maximum cache size set to {} bytes", bytes);
    Ok(0)
}

fn compile<C: Cache>(
    options: &Options,
    cache: &C,
    settings: &Settings,
    argv: &[String],
) -> Result<i32> {
    let compiler = match resolve_compiler(options.compiler_path.as_deref(), settings) {
        Ok(compiler) => compiler,
        Err(err) => {
            err.display_with_hints();
            return Ok(err.exit_code());
        }
    };

    trace_statement!("Arguments we care about: '{:?}'", argv);

    cache.run(&compiler, &options.compiler_args)
}
