//! Resolution of the optional compiler path
//!
//! The command line is `clcache [options] [compiler] [compiler_args...]`
//! where `compiler` is optional and `compiler_args` is an unparsed remainder.
//! Any first positional token could therefore be either the compiler or the
//! first compiler argument. A token is accepted as the compiler only if it
//! ends in `.exe` (case-insensitive); otherwise it is folded back into the
//! front of the remainder.
//!
//! ```text
//! AwaitingPositional --(token ends in .exe)--> Done { path, remainder }
//! AwaitingPositional --(other token)---------> PositionalRejected(token)
//! PositionalRejected --(remainder)-----------> Done { token :: remainder }
//! AwaitingPositional --(no tokens)-----------> Done { none, [] }
//! ```

/// Suffix a positional token needs to be taken for the compiler executable
pub const EXECUTABLE_SUFFIX: &str = ".exe";

/// The single action selected for this invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Print cache statistics
    ShowStats,
    /// Remove stale entries without exceeding the size limit
    Clean,
    /// Remove all entries
    Clear,
    /// Zero the statistics counters
    ResetStats,
    /// Set the maximum cache size; validated by the dispatcher
    SetSize(i128),
    /// Compile through the cache
    Compile,
}

/// Fully resolved options of one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub action: Action,
    /// Explicit compiler executable, if one was recognised
    pub compiler_path: Option<String>,
    /// Arguments forwarded verbatim to the compiler
    pub compiler_args: Vec<String>,
}

/// Path-recognition test for the positional compiler token
pub fn is_compiler_path(token: &str) -> bool {
    let suffix_len = EXECUTABLE_SUFFIX.len();
    token.len() >= suffix_len
        && token.is_char_boundary(token.len() - suffix_len)
        && token[token.len() - suffix_len..].eq_ignore_ascii_case(EXECUTABLE_SUFFIX)
}

/// Parser state while splitting the positional tokens
#[derive(Debug, Clone, PartialEq, Eq)]
enum ResolverState {
    AwaitingPositional,
    PositionalRejected(String),
    Done {
        compiler_path: Option<String>,
        compiler_args: Vec<String>,
    },
}

impl ResolverState {
    /// Feed the optional positional token
    fn positional(self, token: Option<String>) -> Self {
        match (self, token) {
            (ResolverState::AwaitingPositional, Some(token)) if is_compiler_path(&token) => {
                ResolverState::Done {
                    compiler_path: Some(token),
                    compiler_args: Vec::new(),
                }
            }
            (ResolverState::AwaitingPositional, Some(token)) => {
                ResolverState::PositionalRejected(token)
            }
            (state, _) => state,
        }
    }

    /// Feed the remainder; every state ends in `Done`
    fn remainder(self, rest: Vec<String>) -> Self {
        match self {
            ResolverState::AwaitingPositional => ResolverState::Done {
                compiler_path: None,
                compiler_args: rest,
            },
            ResolverState::PositionalRejected(token) => {
                let mut compiler_args = Vec::with_capacity(rest.len() + 1);
                compiler_args.push(token);
                compiler_args.extend(rest);
                ResolverState::Done {
                    compiler_path: None,
                    compiler_args,
                }
            }
            ResolverState::Done {
                compiler_path,
                mut compiler_args,
            } => {
                compiler_args.extend(rest);
                ResolverState::Done {
                    compiler_path,
                    compiler_args,
                }
            }
        }
    }
}

/// Split the positional tokens into the compiler path and its arguments
///
/// `positionals` is everything after the options, in command-line order.
/// The first token is the positional candidate, the rest is the remainder.
pub fn resolve_positionals(positionals: Vec<String>) -> (Option<String>, Vec<String>) {
    let mut tokens = positionals.into_iter();
    let candidate = tokens.next();
    let rest: Vec<String> = tokens.collect();

    match ResolverState::AwaitingPositional
        .positional(candidate)
        .remainder(rest)
    {
        ResolverState::Done {
            compiler_path,
            compiler_args,
        } => (compiler_path, compiler_args),
        // `remainder` always yields `Done`
        other => unreachable!("resolver stopped in {:?}", other),
    }
}
