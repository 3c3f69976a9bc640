//! External command execution.
//!
//! Every package manager, settings query and privileged file operation goes
//! through a [`CommandRunner`], so menus and features never touch
//! `std::process` directly and tests can swap in a fake.

use anyhow::{bail, Context, Result};
use std::fmt;
use std::process::{Command, Stdio};

/// How the child's stdio is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Io {
    /// Capture stdout/stderr for parsing.
    Captured,
    /// Inherit the terminal so the user sees apt progress and sudo prompts.
    Inherited,
}

/// A single command invocation: program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    argv: Vec<String>,
    io: Io,
}

impl Cmd {
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            argv: vec![program.as_ref().to_string()],
            io: Io::Captured,
        }
    }

    /// Shorthand for `Cmd::new("sudo").args(...)`.
    pub fn sudo<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new("sudo").args(args)
    }

    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.argv.push(arg.as_ref().to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.argv
            .extend(args.into_iter().map(|a| a.as_ref().to_string()));
        self
    }

    /// Show output on the terminal instead of capturing it.
    pub fn interactive(mut self) -> Self {
        self.io = Io::Inherited;
        self
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn io(&self) -> Io {
        self.io
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv.join(" "))
    }
}

/// Result of a finished command. Output fields are empty for inherited stdio.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Capability to run external commands.
///
/// `run` only fails when the process cannot be spawned; a non-zero exit is
/// reported through [`CommandOutput::success`]. Use [`run_checked`] when a
/// non-zero exit should abort the operation.
pub trait CommandRunner {
    fn run(&self, cmd: &Cmd) -> Result<CommandOutput>;
}

/// Runs a command and turns a non-zero exit into an error.
pub fn run_checked(runner: &dyn CommandRunner, cmd: &Cmd) -> Result<CommandOutput> {
    let output = runner.run(cmd)?;
    if !output.success() {
        let code = output
            .code
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        let stderr = output.stderr.trim();
        tracing::warn!(command = %cmd, %code, "command failed");
        if stderr.is_empty() {
            bail!("'{}' failed (exit code {})", cmd, code);
        }
        bail!("'{}' failed (exit code {}):\n{}", cmd, code, stderr);
    }
    Ok(output)
}

/// The real thing: `std::process::Command`, blocking until exit.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &Cmd) -> Result<CommandOutput> {
        tracing::debug!(command = %cmd, "running");
        let mut command = Command::new(cmd.program());
        command.args(&cmd.argv()[1..]);

        match cmd.io() {
            Io::Captured => {
                let output = command
                    .stdin(Stdio::null())
                    .output()
                    .with_context(|| format!("Failed to execute '{}'. Is it installed?", cmd.program()))?;
                Ok(CommandOutput {
                    code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            Io::Inherited => {
                let status = command
                    .status()
                    .with_context(|| format!("Failed to execute '{}'. Is it installed?", cmd.program()))?;
                Ok(CommandOutput {
                    code: status.code(),
                    ..Default::default()
                })
            }
        }
    }
}
