//! SSH-backed remote session
//!
//! Shells out to the `ssh` binary. Each argv token is quoted for the remote
//! shell so the argument vector arrives intact.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::debug;

use super::{LogSink, RemoteCommand, RemoteOutput, RemoteProcess, RemoteSession};
use crate::models::TaskError;

/// SSH client configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// ssh client binary
    pub program: String,

    /// SSH username
    pub user: String,

    /// SSH private key path
    pub identity_file: Option<PathBuf>,

    /// SSH port
    pub port: u16,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Strict host key checking
    pub strict_host_key_checking: bool,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            user: "ubuntu".to_string(),
            identity_file: None,
            port: 22,
            connect_timeout_secs: 30,
            strict_host_key_checking: false,
        }
    }
}

/// Remote session over SSH to one host
#[derive(Clone, Debug)]
pub struct SshSession {
    config: SshConfig,
    host: String,
}

impl SshSession {
    pub fn new(config: SshConfig, host: impl Into<String>) -> Self {
        Self {
            config,
            host: host.into(),
        }
    }

    /// Build SSH command arguments, ending with the quoted remote command
    fn build_ssh_args(&self, command: &RemoteCommand) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            format!(
                "StrictHostKeyChecking={}",
                if self.config.strict_host_key_checking {
                    "yes"
                } else {
                    "no"
                }
            ),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.connect_timeout_secs),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            "-p".to_string(),
            self.config.port.to_string(),
        ];

        if let Some(ref key_path) = self.config.identity_file {
            args.push("-i".to_string());
            args.push(key_path.to_string_lossy().to_string());
        }

        args.push(format!("{}@{}", self.config.user, self.host));
        args.push("--".to_string());
        args.push(remote_command_line(&command.args));
        args
    }

    fn command(&self, command: &RemoteCommand) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(self.build_ssh_args(command))
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    fn target(&self) -> String {
        format!("{}@{}", self.config.user, self.host)
    }

    async fn run(&self, command: RemoteCommand) -> Result<RemoteOutput, TaskError> {
        debug!("Executing on {}: {}", self.host, command.display());

        let mut child = self
            .command(&command)
            .spawn()
            .map_err(|e| TaskError::transport(format!("failed to execute ssh: {e}")))?;

        // feed stdin while draining output so neither pipe fills up
        let feed = feed_stdin(child.stdin.take(), command.stdin.clone());
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output =
            output.map_err(|e| TaskError::transport(format!("failed to collect ssh output: {e}")))?;
        fed?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if exit_code == 255 && is_ssh_failure(&stderr) {
            return Err(TaskError::transport(format!(
                "ssh to {} failed: {}",
                self.target(),
                stderr.trim()
            )));
        }

        Ok(RemoteOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: stderr.to_string(),
            exit_code,
        })
    }

    async fn spawn(
        &self,
        command: RemoteCommand,
        sink: LogSink,
    ) -> Result<Box<dyn RemoteProcess>, TaskError> {
        debug!("Starting detached on {}: {}", self.host, command.display());

        // stdin stays open for the lifetime of the handle
        let mut child = self
            .command(&command)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| TaskError::transport(format!("failed to execute ssh: {e}")))?;

        let mut forwarders = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            forwarders.push(tokio::spawn(sink.clone().forward("stdout", stdout)));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(tokio::spawn(sink.clone().forward("stderr", stderr)));
        }

        let mut stdin = child.stdin.take();
        if let (Some(input), Some(pipe)) = (command.stdin.as_deref(), stdin.as_mut()) {
            write_input(pipe, input).await?;
        }

        Ok(Box::new(SshProcess {
            child,
            stdin,
            forwarders,
        }))
    }
}

/// Detached process started over SSH
struct SshProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    forwarders: Vec<JoinHandle<()>>,
}

#[async_trait]
impl RemoteProcess for SshProcess {
    async fn wait(self: Box<Self>) -> Result<i32, TaskError> {
        let SshProcess {
            mut child,
            stdin,
            forwarders,
        } = *self;

        let status = child
            .wait()
            .await
            .map_err(|e| TaskError::transport(format!("failed to wait for ssh: {e}")))?;
        drop(stdin);

        for forwarder in forwarders {
            let _ = forwarder.await;
        }

        Ok(status.code().unwrap_or(-1))
    }
}

/// Write `input` and close the pipe
async fn feed_stdin(pipe: Option<ChildStdin>, input: Option<String>) -> Result<(), TaskError> {
    if let (Some(mut pipe), Some(input)) = (pipe, input) {
        write_input(&mut pipe, &input).await?;
    }
    Ok(())
}

/// A reader that exits early is not an error; its exit code tells the story
async fn write_input(pipe: &mut ChildStdin, input: &str) -> Result<(), TaskError> {
    match pipe.write_all(input.as_bytes()).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            debug!("Remote command closed stdin early");
            Ok(())
        }
        Err(e) => Err(TaskError::transport(format!("failed to write stdin: {e}"))),
    }
}

/// Whether an exit of 255 came from ssh itself rather than the remote command
///
/// ssh reserves 255 for its own errors, but a remote command may exit 255
/// too. Only stderr tells them apart, so match ssh's own diagnostics.
fn is_ssh_failure(stderr: &str) -> bool {
    const MARKERS: [&str; 7] = [
        "ssh:",
        "Permission denied (",
        "Host key verification failed",
        "Connection closed by",
        "Connection reset by",
        "kex_exchange_identification",
        "Could not resolve hostname",
    ];
    MARKERS.iter().any(|m| stderr.contains(m))
}

/// Join argv tokens into one line for the remote shell
fn remote_command_line(args: &[String]) -> String {
    args.iter()
        .map(|a| quote_arg(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Single-quote a token unless it only holds shell-safe characters
fn quote_arg(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}
