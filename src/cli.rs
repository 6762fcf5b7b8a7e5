//! CLI argument parsing using clap derive macros

use std::num::IntErrorKind;

use clap::{ArgGroup, Parser};

use crate::invocation::{resolve_positionals, Action, Options};

/// clcache - a compiler cache for Microsoft Visual Studio
///
/// Without a command flag, the remaining arguments are forwarded to the
/// compiler and the result is served from (or stored into) the cache.
#[derive(Parser, Debug)]
#[command(name = "clcache")]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("command")
        .args(["stats", "clean", "clear", "reset", "set_size"])
        .multiple(false)
))]
pub struct Cli {
    /// Print cache statistics
    #[arg(short = 's', long = "stats")]
    pub stats: bool,

    /// Clean cache
    #[arg(short = 'c', long = "clean")]
    pub clean: bool,

    /// Clear cache
    #[arg(short = 'C', long = "clear")]
    pub clear: bool,

    /// Reset cache statistics
    #[arg(short = 'z', long = "reset")]
    pub reset: bool,

    /// Set maximum cache size (in bytes)
    #[arg(
        short = 'M',
        long = "set-size",
        value_name = "BYTES",
        allow_negative_numbers = true,
        value_parser = parse_cache_size
    )]
    pub set_size: Option<i128>,

    /// Optional path to the compiler executable followed by the compiler
    /// arguments. The first token is taken as the compiler only if it ends
    /// in .exe; otherwise CLCACHE_CL or cl.exe on PATH is used.
    #[arg(
        value_name = "COMPILER_ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        num_args = 0..
    )]
    pub command_line: Vec<String>,
}

/// Parse a `--set-size` value; surrounding whitespace is accepted
///
/// Integers of any magnitude are accepted. Values beyond `i128` saturate,
/// which keeps their sign for the range check done by the dispatcher.
fn parse_cache_size(value: &str) -> Result<i128, String> {
    match value.trim().parse::<i128>() {
        Ok(size) => Ok(size),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Ok(i128::MAX),
            IntErrorKind::NegOverflow => Ok(i128::MIN),
            _ => Err(format!("invalid int value '{}': {}", value, e)),
        },
    }
}

impl Cli {
    /// Convert the parsed arguments into resolved options
    pub fn into_options(self) -> Options {
        let action = if self.stats {
            Action::ShowStats
        } else if self.clean {
            Action::Clean
        } else if self.clear {
            Action::Clear
        } else if self.reset {
            Action::ResetStats
        } else if let Some(size) = self.set_size {
            Action::SetSize(size)
        } else {
            Action::Compile
        };

        let (compiler_path, compiler_args) = resolve_positionals(self.command_line);

        Options {
            action,
            compiler_path,
            compiler_args,
        }
    }
}

/// Parse a full argument vector (including the program name)
pub fn parse_options<I, T>(args: I) -> Result<Options, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args).map(Cli::into_options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Options, clap::Error> {
        parse_options(std::iter::once("clcache").chain(args.iter().copied()))
    }

    fn strings(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_admin_flags() {
        assert_eq!(parse(&["-s"]).unwrap().action, Action::ShowStats);
        assert_eq!(parse(&["--stats"]).unwrap().action, Action::ShowStats);
        assert_eq!(parse(&["-c"]).unwrap().action, Action::Clean);
        assert_eq!(parse(&["--clean"]).unwrap().action, Action::Clean);
        assert_eq!(parse(&["-C"]).unwrap().action, Action::Clear);
        assert_eq!(parse(&["--clear"]).unwrap().action, Action::Clear);
        assert_eq!(parse(&["-z"]).unwrap().action, Action::ResetStats);
        assert_eq!(parse(&["--reset"]).unwrap().action, Action::ResetStats);
        assert_eq!(parse(&["-M", "1"]).unwrap().action, Action::SetSize(1));
        assert_eq!(
            parse(&["--set-size", "22222222"]).unwrap().action,
            Action::SetSize(22222222)
        );
    }

    #[test]
    fn test_admin_flags_are_mutually_exclusive() {
        for args in [
            &["-s", "-c"][..],
            &["-c", "-C"][..],
            &["-z", "--stats"][..],
            &["-C", "-M", "100"][..],
            &["--reset", "--set-size", "5"][..],
        ] {
            let err = parse(args).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ArgumentConflict, "args: {:?}", args);
        }
    }

    #[test]
    fn test_set_size_values() {
        assert_eq!(parse(&["-M", "  10"]).unwrap().action, Action::SetSize(10));
        assert_eq!(parse(&["-M", "42  "]).unwrap().action, Action::SetSize(42));
        assert_eq!(parse(&["-M", "0"]).unwrap().action, Action::SetSize(0));
        assert_eq!(parse(&["-M", "-5"]).unwrap().action, Action::SetSize(-5));
        assert_eq!(parse(&["-M", "-1"]).unwrap().action, Action::SetSize(-1));
    }

    #[test]
    fn test_set_size_accepts_large_values() {
        assert_eq!(
            parse(&["-M", "18446744073709551615"]).unwrap().action,
            Action::SetSize(u64::MAX as i128)
        );
        assert_eq!(
            parse(&["-M", "99999999999999999999"]).unwrap().action,
            Action::SetSize(99999999999999999999)
        );
        assert_eq!(
            parse(&["-M", "9".repeat(60).as_str()]).unwrap().action,
            Action::SetSize(i128::MAX)
        );
        let huge_negative = format!("-{}", "9".repeat(60));
        assert_eq!(
            parse(&["-M", huge_negative.as_str()]).unwrap().action,
            Action::SetSize(i128::MIN)
        );
    }

    #[test]
    fn test_set_size_rejects_non_integers() {
        for value in ["ababa", "1000.0", "1e3"] {
            let err = parse(&["-M", value]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValueValidation, "value: {:?}", value);
        }
    }

    #[test]
    fn test_compile_with_explicit_compiler() {
        let options = parse(&["foo.EXE", "/c", "a.cpp"]).unwrap();
        assert_eq!(options.action, Action::Compile);
        assert_eq!(options.compiler_path.as_deref(), Some("foo.EXE"));
        assert_eq!(options.compiler_args, strings(&["/c", "a.cpp"]));
    }

    #[test]
    fn test_compile_without_compiler() {
        let options = parse(&["/c", "a.cpp"]).unwrap();
        assert_eq!(options.action, Action::Compile);
        assert_eq!(options.compiler_path, None);
        assert_eq!(options.compiler_args, strings(&["/c", "a.cpp"]));
    }

    #[test]
    fn test_no_arguments() {
        let options = parse(&[]).unwrap();
        assert_eq!(options.action, Action::Compile);
        assert_eq!(options.compiler_path, None);
        assert!(options.compiler_args.is_empty());
    }

    #[test]
    fn test_remainder_is_not_interpreted() {
        let options = parse(&["cl.exe", "-c", "--stats", "-M", "3", "a.cpp"]).unwrap();
        assert_eq!(options.action, Action::Compile);
        assert_eq!(options.compiler_path.as_deref(), Some("cl.exe"));
        assert_eq!(
            options.compiler_args,
            strings(&["-c", "--stats", "-M", "3", "a.cpp"])
        );

        let options = parse(&["/nologo", "-c", "a.cpp"]).unwrap();
        assert_eq!(options.action, Action::Compile);
        assert_eq!(options.compiler_path, None);
        assert_eq!(options.compiler_args, strings(&["/nologo", "-c", "a.cpp"]));
    }

    #[test]
    fn test_unknown_leading_switch_is_a_compiler_argument() {
        let options = parse(&["-nologo", "/c", "a.cpp"]).unwrap();
        assert_eq!(options.action, Action::Compile);
        assert_eq!(options.compiler_args, strings(&["-nologo", "/c", "a.cpp"]));
    }

    #[test]
    fn test_admin_flag_with_trailing_arguments() {
        let options = parse(&["-s", "cl.exe", "/c"]).unwrap();
        assert_eq!(options.action, Action::ShowStats);
        assert_eq!(options.compiler_path.as_deref(), Some("cl.exe"));
        assert_eq!(options.compiler_args, strings(&["/c"]));
    }
}
