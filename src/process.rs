// Launching external tools
//
// Every child process goes through `ProcessRunner`, so the pipeline can be
// driven against a recording stand-in in tests.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// A program and its argument list, kept as plain strings for logging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
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

    /// True if `flag` appears as a whole argument.
    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Where a child's standard output goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StdoutSink {
    /// Truncate or create the file and stream stdout into it
    File(PathBuf),
    /// Collect stdout into `ProcessOutput::stdout`
    Capture,
    Discard,
}

/// What a finished child left behind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` if the child was killed by a signal
    pub code: Option<i32>,
    /// Captured stdout; empty unless the sink was `StdoutSink::Capture`
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs one command to completion, blocking until the child exits.
///
/// An `Err` means the process could not be started (or its output file could
/// not be opened); a child that ran and failed is reported through
/// `ProcessOutput::code`.
pub trait ProcessRunner {
    fn run(&self, cmd: &CommandSpec, stdout: &StdoutSink) -> io::Result<ProcessOutput>;
}

/// Runs commands with `std::process::Command`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, cmd: &CommandSpec, stdout: &StdoutSink) -> io::Result<ProcessOutput> {
        let stdout_cfg = match stdout {
            StdoutSink::File(path) => {
                let file = File::create(path).map_err(|e| {
                    io::Error::new(
                        e.kind(),
                        format!("Failed to create '{}': {}", path.display(), e),
                    )
                })?;
                Stdio::from(file)
            }
            StdoutSink::Capture => Stdio::piped(),
            StdoutSink::Discard => Stdio::null(),
        };

        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(stdout_cfg)
            .stderr(Stdio::piped())
            .output()?;

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
