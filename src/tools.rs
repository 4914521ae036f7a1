//! External tool invocation.
//!
//! Every external process call in the pipeline goes through the
//! [`ToolRunner`] trait and comes back as a structured [`ToolOutput`]
//! (exit status plus captured output) instead of a side effect. Tests
//! substitute a fake runner; production code uses [`SystemRunner`].

use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;
use tracing::debug;

/// Failure to launch an external tool at all.
///
/// A tool that launched but exited non-zero is not a `ToolError`; callers
/// decide what a non-zero [`ToolOutput`] means for them.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// One external process invocation: program, arguments, working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Command line rendered for log messages.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Captured result of a completed external process.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Exit status rendered for error messages.
    pub fn status_text(&self) -> String {
        match self.status {
            Some(code) => code.to_string(),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Seam between the pipeline and the outside world.
pub trait ToolRunner {
    /// Runs the invocation to completion, blocking until it exits.
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError>;
}

/// [`ToolRunner`] backed by real child processes with captured output.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
        debug!(command = invocation.command_line(), "running external tool");

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }

        let output = command.output().map_err(|source| ToolError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        let result = ToolOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(
            program = invocation.program.as_str(),
            status = result.status_text(),
            "external tool finished"
        );
        Ok(result)
    }
}
