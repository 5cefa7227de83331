//! Remote execution
//!
//! The engine never talks to a node directly. Everything goes through a
//! [`RemoteSession`], which runs an argument vector on one node:
//!
//! - `run()` executes to completion with stdout/stderr captured
//! - `spawn()` starts a detached process and returns a [`RemoteProcess`]
//!
//! [`SshSession`] is the production implementation; tests use the mock.

mod cluster;
#[cfg(test)]
pub(crate) mod mock;
mod sink;
mod ssh;

pub use cluster::Cluster;
pub use sink::LogSink;
pub use ssh::{SshConfig, SshSession};

use async_trait::async_trait;

use crate::models::TaskError;

/// A command to run on a node
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteCommand {
    /// Argument vector; never interpreted by a local shell
    pub args: Vec<String>,
    /// Bytes fed to the process' stdin
    pub stdin: Option<String>,
}

impl RemoteCommand {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    pub fn program(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }

    pub fn display(&self) -> String {
        self.args.join(" ")
    }
}

/// Captured result of a completed remote command
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[cfg(test)]
impl RemoteOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }
}

impl RemoteOutput {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Remote-execution capability bound to a single node
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Human readable target, e.g. `ubuntu@10.0.0.5`
    fn target(&self) -> String;

    /// Run to completion, capturing output
    ///
    /// A non-zero exit is not an error here; only failing to run the
    /// command at all is.
    async fn run(&self, command: RemoteCommand) -> Result<RemoteOutput, TaskError>;

    /// Start without waiting; output lines go to `sink`
    async fn spawn(
        &self,
        command: RemoteCommand,
        sink: LogSink,
    ) -> Result<Box<dyn RemoteProcess>, TaskError>;

    /// Run and fail with `RemoteExecution` on non-zero exit
    async fn run_ok(&self, command: RemoteCommand) -> Result<RemoteOutput, TaskError> {
        let display = command.display();
        let output = self.run(command).await?;
        if !output.is_success() {
            return Err(TaskError::RemoteExecution {
                command: display,
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }
}

/// Handle to a detached remote process
#[async_trait]
pub trait RemoteProcess: Send {
    /// Block until the process terminated; returns its exit code
    async fn wait(self: Box<Self>) -> Result<i32, TaskError>;
}
