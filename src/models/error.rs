//! Task error taxonomy
//!
//! Every failure a node worker can hit maps onto one [`FailureKind`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while driving work on a node
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to fetch {uri}: {diagnostic}")]
    Fetch { uri: String, diagnostic: String },

    #[error("control channel output is not valid JSON ({reason}): {payload:?}")]
    Protocol { reason: String, payload: String },

    #[error("remote command `{command}` exited with {exit_code}: {stderr}")]
    RemoteExecution {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("validator exited with {exit_code}: {output}")]
    Validation { exit_code: i32, output: String },

    #[error("{path} did not appear within {waited_secs}s")]
    ReadinessTimeout { path: String, waited_secs: u64 },

    #[error("cancelled while waiting for {0}")]
    Cancelled(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl TaskError {
    pub fn config(message: impl Into<String>) -> Self {
        TaskError::Config(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        TaskError::Transport(message.into())
    }

    /// Classify the error
    pub fn kind(&self) -> FailureKind {
        match self {
            TaskError::Config(_) => FailureKind::Config,
            TaskError::Fetch { .. } => FailureKind::Fetch,
            TaskError::Protocol { .. } => FailureKind::Protocol,
            TaskError::RemoteExecution { .. } => FailureKind::RemoteExecution,
            TaskError::Validation { .. } => FailureKind::Validation,
            TaskError::ReadinessTimeout { .. } => FailureKind::ReadinessTimeout,
            TaskError::Cancelled(_) => FailureKind::Cancelled,
            TaskError::Transport(_) => FailureKind::Transport,
        }
    }

    /// Diagnostic text without the kind prefix
    pub fn diagnostic(&self) -> String {
        match self {
            TaskError::Config(msg) | TaskError::Cancelled(msg) | TaskError::Transport(msg) => {
                msg.clone()
            }
            TaskError::Fetch { uri, diagnostic } => format!("{uri}: {diagnostic}"),
            TaskError::Protocol { reason, payload } => format!("{reason}; payload: {payload}"),
            TaskError::RemoteExecution {
                command,
                exit_code,
                stderr,
            } => format!("`{command}` exited with {exit_code}: {}", stderr.trim()),
            TaskError::Validation { exit_code, output } => {
                format!("exit {exit_code}: {}", output.trim())
            }
            other => other.to_string(),
        }
    }
}

/// Failure classification reported per node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Config,
    Fetch,
    Protocol,
    RemoteExecution,
    Validation,
    ReadinessTimeout,
    Cancelled,
    Transport,
}

impl FailureKind {
    pub fn name(&self) -> &'static str {
        match self {
            FailureKind::Config => "ConfigError",
            FailureKind::Fetch => "FetchError",
            FailureKind::Protocol => "ProtocolError",
            FailureKind::RemoteExecution => "RemoteExecutionError",
            FailureKind::Validation => "ValidationFailure",
            FailureKind::ReadinessTimeout => "ReadinessTimeout",
            FailureKind::Cancelled => "Cancelled",
            FailureKind::Transport => "TransportError",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(TaskError::config("x").kind(), FailureKind::Config);
        assert_eq!(
            TaskError::Validation {
                exit_code: 1,
                output: String::new()
            }
            .kind(),
            FailureKind::Validation
        );
        assert_eq!(FailureKind::Protocol.to_string(), "ProtocolError");
    }

    #[test]
    fn test_diagnostic_keeps_payload() {
        let err = TaskError::Protocol {
            reason: "EOF while parsing".to_string(),
            payload: "{\"half\":".to_string(),
        };
        assert!(err.diagnostic().contains("{\"half\":"));
    }
}
