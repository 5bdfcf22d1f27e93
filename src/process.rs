//! External command description and execution.
//!
//! Every workflow step shells out to a system tool (`ssh-keygen`, `git`).
//! Steps describe the invocation as a [`CommandSpec`] and hand it to a
//! [`CommandRunner`], which lets tests substitute a scripted runner for the
//! real process launcher.

use std::ffi::OsString;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A single external command invocation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandSpec {
    /// Program to execute, resolved through `PATH` when not absolute.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
    /// Working directory for the child; inherits the caller's when `None`.
    pub current_dir: Option<Utf8PathBuf>,
    /// Variables layered over the inherited environment.
    pub envs: Vec<(String, OsString)>,
}

impl CommandSpec {
    /// Starts a specification for `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Runs the child inside `dir` without touching the caller's directory.
    #[must_use]
    pub fn current_dir(mut self, dir: &Utf8Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// Adds an environment override.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Adds every override from `pairs`.
    #[must_use]
    pub fn envs<'a, I>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.envs.extend(
            pairs
                .into_iter()
                .map(|(key, value)| (key.to_owned(), OsString::from(value))),
        );
        self
    }

    /// Returns a shell-like rendering used for logs and assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }

    /// Looks up an environment override by key.
    #[must_use]
    pub fn env_value(&self, key: &str) -> Option<&OsString> {
        self.envs
            .iter()
            .rev()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value)
    }
}

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Human-readable diagnostic text for a failed invocation.
    ///
    /// Prefers stderr, falls back to stdout (git writes some refusals there),
    /// and finally to a fixed placeholder so callers never show an empty
    /// message.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_owned();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_owned();
        }
        String::from("no error output")
    }

    /// Exit status rendered for messages.
    #[must_use]
    pub fn status_text(&self) -> String {
        self.code
            .map_or_else(|| String::from("unknown"), |code| code.to_string())
    }
}

/// Errors raised before an external command produces an exit status.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProcessError {
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a command outlives the configured timeout and is killed.
    #[error("{program} did not finish within {timeout_secs} seconds")]
    Timeout {
        /// Command that was terminated.
        program: String,
        /// Timeout that expired.
        timeout_secs: u64,
    },
    /// Raised when waiting on or reading from a running command fails.
    #[error("failed to collect output from {program}: {message}")]
    Wait {
        /// Command being awaited.
        program: String,
        /// Operating system error string.
        message: String,
    },
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `command`, blocking until it exits, and captures its output.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError`] if the command cannot be started, cannot be
    /// awaited, or exceeds the runner's timeout.
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ProcessError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        (**self).run(command)
    }
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessCommandRunner {
    timeout: Option<Duration>,
}

impl ProcessCommandRunner {
    /// Creates a runner that waits for commands indefinitely.
    #[must_use]
    pub const fn new() -> Self {
        Self { timeout: None }
    }

    /// Creates a runner that kills commands running longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    /// Returns the configured timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn build(command: &CommandSpec) -> Command {
        let mut process = Command::new(&command.program);
        process.args(&command.args).stdin(Stdio::null());
        if let Some(dir) = &command.current_dir {
            process.current_dir(dir);
        }
        for (key, value) in &command.envs {
            process.env(key, value);
        }
        process
    }

    fn run_bounded(
        command: &CommandSpec,
        timeout: Duration,
    ) -> Result<CommandOutput, ProcessError> {
        let mut child = Self::build(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| spawn_error(command, &err))?;

        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());
        let started = Instant::now();

        let status = loop {
            if let Some(status) = child.try_wait().map_err(|err| wait_error(command, &err))? {
                break status;
            }
            if started.elapsed() > timeout {
                kill_quietly(&mut child);
                return Err(ProcessError::Timeout {
                    program: command.program.clone(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(CommandOutput {
            code: status.code(),
            stdout: collect(command, stdout_reader)?,
            stderr: collect(command, stderr_reader)?,
        })
    }
}

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        tracing::debug!(command = %command.command_string(), cwd = ?command.current_dir, "running external command");

        if let Some(timeout) = self.timeout {
            return Self::run_bounded(command, timeout);
        }

        let output = Self::build(command)
            .output()
            .map_err(|err| spawn_error(command, &err))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

type Reader = Option<JoinHandle<std::io::Result<Vec<u8>>>>;

fn drain<P: Read + Send + 'static>(pipe: Option<P>) -> Reader {
    pipe.map(|mut stream| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            stream.read_to_end(&mut buffer).map(|_| buffer)
        })
    })
}

fn collect(command: &CommandSpec, reader: Reader) -> Result<String, ProcessError> {
    let Some(handle) = reader else {
        return Ok(String::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| ProcessError::Wait {
            program: command.program.clone(),
            message: String::from("output reader thread panicked"),
        })?
        .map_err(|err| wait_error(command, &err))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn kill_quietly(child: &mut Child) {
    if let Err(err) = child.kill() {
        tracing::warn!(error = %err, "failed to kill timed-out command");
    }
    if let Err(err) = child.wait() {
        tracing::warn!(error = %err, "failed to reap timed-out command");
    }
}

fn spawn_error(command: &CommandSpec, err: &std::io::Error) -> ProcessError {
    ProcessError::Spawn {
        program: command.program.clone(),
        message: err.to_string(),
    }
}

fn wait_error(command: &CommandSpec, err: &std::io::Error) -> ProcessError {
    ProcessError::Wait {
        program: command.program.clone(),
        message: err.to_string(),
    }
}
