//! Readiness synchronization
//!
//! Blocks a node's worker until a remote path exists.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ReadinessConfig;
use crate::models::TaskError;
use crate::remote::{RemoteCommand, RemoteSession};

/// Polls a node for a path at a fixed interval
#[derive(Clone, Debug)]
pub struct ReadinessWaiter {
    poll_interval: Duration,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl Default for ReadinessWaiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl ReadinessWaiter {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(config: &ReadinessConfig) -> Self {
        Self {
            timeout: config.timeout(),
            ..Self::new(config.poll_interval())
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Return once `path` exists on the node
    ///
    /// The first probe is immediate. Without a timeout this waits for as
    /// long as it takes or until the token is cancelled.
    pub async fn wait(&self, session: &dyn RemoteSession, path: &str) -> Result<(), TaskError> {
        let started = Instant::now();
        let mut probes = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                return Err(TaskError::Cancelled(path.to_string()));
            }

            probes += 1;
            if self.probe(session, path).await? {
                info!("{} is ready after {} probe(s)", path, probes);
                return Ok(());
            }

            let mut delay = self.poll_interval;
            if let Some(timeout) = self.timeout {
                let elapsed = started.elapsed();
                if elapsed >= timeout {
                    return Err(TaskError::ReadinessTimeout {
                        path: path.to_string(),
                        waited_secs: elapsed.as_secs(),
                    });
                }
                delay = delay.min(timeout - elapsed);
            }

            debug!("{} not present yet, retrying in {:?}", path, delay);
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(TaskError::Cancelled(path.to_string()));
                }
                _ = sleep(delay) => {}
            }
        }
    }

    /// Single existence check: exit 0 present, 1 absent
    async fn probe(&self, session: &dyn RemoteSession, path: &str) -> Result<bool, TaskError> {
        let command = RemoteCommand::new(["test", "-e", path]);
        let display = command.display();
        let output = session.run(command).await?;

        match output.exit_code {
            0 => Ok(true),
            1 => Ok(false),
            exit_code => Err(TaskError::RemoteExecution {
                command: display,
                exit_code,
                stderr: output.stderr,
            }),
        }
    }
}
