//! Invoking the real compiler

use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

/// Result of a compiler invocation
#[derive(Debug)]
pub struct CommandResult {
    /// Process exit code
    pub exit_code: i32,

    /// Captured standard output (raw bytes, compiler code page)
    pub stdout: Vec<u8>,

    /// Captured standard error
    pub stderr: Vec<u8>,

    /// Execution duration
    pub duration: Duration,
}

impl CommandResult {
    /// Create a CommandResult from an exit status
    pub fn from_status(status: ExitStatus, stdout: Vec<u8>, stderr: Vec<u8>, duration: Duration) -> Self {
        Self {
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
            duration,
        }
    }

    /// Whether the command succeeded (exit code 0)
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run a program, either inheriting the terminal or capturing its output
pub fn run_command(
    program: &Path,
    args: &[String],
    working_dir: &Path,
    inherit_io: bool,
) -> Result<CommandResult> {
    let start = Instant::now();

    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(working_dir);

    if inherit_io {
        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        let status = cmd
            .status()
            .with_context(|| format!("Failed to execute {}", program.display()))?;

        Ok(CommandResult::from_status(
            status,
            Vec::new(),
            Vec::new(),
            start.elapsed(),
        ))
    } else {
        let output = cmd
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to execute {}", program.display()))?;

        Ok(CommandResult::from_status(
            output.status,
            output.stdout,
            output.stderr,
            start.elapsed(),
        ))
    }
}

/// Run the compiler with the terminal attached and return its exit code
pub fn invoke_real_compiler(
    compiler: &Path,
    args: &[String],
    working_dir: &Path,
) -> Result<i32> {
    let result = run_command(compiler, args, working_dir, true)?;
    crate::trace_statement!(
        "Real compiler returned code {} after {:?}",
        result.exit_code,
        result.duration
    );
    Ok(result.exit_code)
}
