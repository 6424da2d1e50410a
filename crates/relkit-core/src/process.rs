//! External command helpers.
//!
//! Every command runs with an explicit working directory. Nothing in relkit
//! calls `set_current_dir`.

use std::io;
use std::process::{Child, Command, Stdio};

use camino::Utf8Path;
use tracing::debug;

/// Captured result of a finished external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Captured stdout (lossy UTF-8).
    pub stdout: String,
    /// Captured stderr (lossy UTF-8).
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status 0.
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Trimmed stderr, or trimmed stdout when stderr is empty.
    pub fn message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// A program plus leading arguments parsed from a command line like `"corepack npm"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    program: String,
    args: Vec<String>,
}

impl Tool {
    /// Split a command line on whitespace. An empty line falls back to `fallback`.
    pub fn parse(command_line: &str, fallback: &str) -> Self {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        match parts.next() {
            Some(program) => Self {
                program,
                args: parts.collect(),
            },
            None => Self {
                program: fallback.to_string(),
                args: Vec::new(),
            },
        }
    }

    /// The program that will be executed.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Whether the program can be found (absolute/relative path or on `PATH`).
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    /// Human-readable form of an invocation, for logs and messages.
    pub fn display(&self, args: &[&str]) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self, args: &[&str], cwd: &Utf8Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).args(args).current_dir(cwd.as_std_path());
        cmd
    }

    /// Run to completion, capturing stdout and stderr.
    pub fn run(&self, args: &[&str], cwd: &Utf8Path) -> io::Result<CommandOutput> {
        debug!(command = %self.display(args), %cwd, "running");
        let output = self.command(args, cwd).stdin(Stdio::null()).output()?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Start without waiting. Output is inherited so watchers stay visible.
    pub fn spawn(&self, args: &[&str], cwd: &Utf8Path) -> io::Result<Child> {
        debug!(command = %self.display(args), %cwd, "spawning");
        self.command(args, cwd).stdin(Stdio::null()).spawn()
    }
}
