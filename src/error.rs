//! Error types and helpers for user-friendly error messages
//!
//! Only two conditions originate in the command-line front end itself: a
//! compiler that cannot be located and an invalid maximum cache size. Both are
//! reported once on stderr and end the invocation with status 1. Everything
//! else travels as an `anyhow::Error` up to `main`.

use thiserror::Error;

/// Errors detected by the argument resolver and the command dispatcher
#[derive(Error, Debug)]
pub enum ClcacheError {
    /// No usable compiler executable could be found
    #[error(
        "Failed to locate specified compiler {}, or cl.exe on PATH (and CLCACHE_CL is not set), aborting.",
        display_candidate(.candidate)
    )]
    CompilerNotFound {
        candidate: Option<String>,
        hint: String,
    },

    /// `--set-size` was given a value below 1
    #[error("Max size argument must be greater than 0.")]
    InvalidCacheSize { requested: i128 },
}

fn display_candidate(candidate: &Option<String>) -> String {
    match candidate {
        Some(path) => format!("'{}'", path),
        None => "None".to_string(),
    }
}

impl ClcacheError {
    /// Create a compiler-not-found error for the candidate that was tried
    pub fn compiler_not_found(candidate: Option<String>) -> Self {
        Self::CompilerNotFound {
            candidate,
            hint: hints::compiler().to_string(),
        }
    }

    /// Create an invalid cache size error
    pub fn invalid_cache_size(requested: i128) -> Self {
        Self::InvalidCacheSize { requested }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// Display error with formatting and hints
    pub fn display_with_hints(&self) {
        use console::style;

        eprintln!("{}", self);

        if let ClcacheError::CompilerNotFound { hint, .. } = self {
            eprintln!("{} {}", style("HINT:").yellow().bold(), hint);
        }
    }
}

/// Common error hints
pub mod hints {
    /// Get hint for a compiler that could not be located
    pub fn compiler() -> &'static str {
        "Pass the compiler explicitly (clcache path\\to\\cl.exe ...), set CLCACHE_CL,\n\
         or run from a Visual Studio developer prompt so that cl.exe is on PATH."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiler_not_found_message() {
        let err = ClcacheError::compiler_not_found(Some("C:\\tools\\cl.exe".to_string()));
        assert_eq!(
            err.to_string(),
            "Failed to locate specified compiler 'C:\\tools\\cl.exe', or cl.exe on PATH (and CLCACHE_CL is not set), aborting."
        );

        let err = ClcacheError::compiler_not_found(None);
        assert!(err.to_string().contains("compiler None"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_invalid_cache_size_message() {
        let err = ClcacheError::invalid_cache_size(0);
        assert_eq!(err.to_string(), "Max size argument must be greater than 0.");
        assert_eq!(err.exit_code(), 1);
    }
}
