//! Run outcome models
//!
//! Per-node reports, their aggregation, and the aggregated failure.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::{FailureKind, NodeRole, TaskError};

/// Per-node lifecycle of a verification run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Created,
    WorkspaceAcquired,
    Waiting,
    Ready,
    Invoking,
    Validating,
    Cleaned,
    Succeeded,
    Failed,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeState::Created => "created",
            NodeState::WorkspaceAcquired => "workspace-acquired",
            NodeState::Waiting => "waiting",
            NodeState::Ready => "ready",
            NodeState::Invoking => "invoking",
            NodeState::Validating => "validating",
            NodeState::Cleaned => "cleaned",
            NodeState::Succeeded => "succeeded",
            NodeState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Terminal status of a node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Succeeded,
    Failed,
}

impl NodeStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            NodeStatus::Succeeded => "✓",
            NodeStatus::Failed => "✗",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, NodeStatus::Succeeded)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Succeeded => write!(f, "PASS"),
            NodeStatus::Failed => write!(f, "FAIL"),
        }
    }
}

/// One failure recorded for a node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFailure {
    /// Failing command; `None` for node-level failures
    pub command: Option<String>,
    pub kind: FailureKind,
    pub diagnostic: String,
}

impl CommandFailure {
    pub fn from_error(command: Option<&str>, error: &TaskError) -> Self {
        Self {
            command: command.map(str::to_string),
            kind: error.kind(),
            diagnostic: error.diagnostic(),
        }
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.command {
            Some(command) => write!(f, "[{}] {}: {}", command, self.kind, self.diagnostic),
            None => write!(f, "{}: {}", self.kind, self.diagnostic),
        }
    }
}

/// Outcome of one node's unit of work
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeReport {
    pub node: NodeRole,
    pub status: NodeStatus,
    pub failures: Vec<CommandFailure>,
    pub transitions: Vec<NodeState>,
    pub duration_ms: u64,
}

impl NodeReport {
    pub fn succeeded(node: NodeRole, duration_ms: u64) -> Self {
        Self {
            node,
            status: NodeStatus::Succeeded,
            failures: Vec::new(),
            transitions: Vec::new(),
            duration_ms,
        }
    }

    pub fn failed(node: NodeRole, failures: Vec<CommandFailure>, duration_ms: u64) -> Self {
        Self {
            node,
            status: NodeStatus::Failed,
            failures,
            transitions: Vec::new(),
            duration_ms,
        }
    }

    /// Build a report whose status follows from the recorded failures
    pub fn from_failures(node: NodeRole, failures: Vec<CommandFailure>, duration_ms: u64) -> Self {
        if failures.is_empty() {
            Self::succeeded(node, duration_ms)
        } else {
            Self::failed(node, failures, duration_ms)
        }
    }

    pub fn with_transitions(mut self, transitions: Vec<NodeState>) -> Self {
        self.transitions = transitions;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl fmt::Display for NodeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.status.symbol(),
            self.node,
            self.duration_ms
        )?;
        for failure in &self.failures {
            write!(f, "\n    - {failure}")?;
        }
        Ok(())
    }
}

/// Aggregated outcome across all dispatched nodes
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunOutcome {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: BTreeMap<NodeRole, NodeReport>,
}

impl RunOutcome {
    pub fn new(started_at: DateTime<Utc>, reports: BTreeMap<NodeRole, NodeReport>) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            reports,
        }
    }

    /// Empty runs are vacuously successful
    pub fn is_success(&self) -> bool {
        self.reports.values().all(NodeReport::is_success)
    }

    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn passed(&self) -> usize {
        self.reports.values().filter(|r| r.is_success()).count()
    }

    pub fn report(&self, node: &NodeRole) -> Option<&NodeReport> {
        self.reports.get(node)
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// Collapse into success or the aggregated failure
    pub fn into_result(self) -> Result<RunOutcome, AggregateFailure> {
        if self.is_success() {
            return Ok(self);
        }
        let failures = self
            .reports
            .values()
            .filter(|r| !r.is_success())
            .map(|r| (r.node.clone(), r.failures.clone()))
            .collect();
        Err(AggregateFailure { failures })
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run started {}", self.started_at.to_rfc3339())?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for report in self.reports.values() {
            writeln!(f, "  {report}")?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Nodes: {} | Pass: {} | Fail: {} | Duration: {}ms",
            self.total(),
            self.passed(),
            self.total() - self.passed(),
            self.duration_ms()
        )
    }
}

/// Every failing node of a run, with its diagnostics
#[derive(Debug, Clone)]
pub struct AggregateFailure {
    pub failures: BTreeMap<NodeRole, Vec<CommandFailure>>,
}

impl AggregateFailure {
    pub fn failing_nodes(&self) -> Vec<&NodeRole> {
        self.failures.keys().collect()
    }
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} node(s) failed", self.failures.len())?;
        for (node, failures) in &self.failures {
            write!(f, "\n  {node}:")?;
            for failure in failures {
                write!(f, "\n    - {failure}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for AggregateFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(s: &str) -> NodeRole {
        NodeRole::parse(s).unwrap()
    }

    fn outcome(reports: Vec<NodeReport>) -> RunOutcome {
        let reports = reports.into_iter().map(|r| (r.node.clone(), r)).collect();
        RunOutcome::new(Utc::now(), reports)
    }

    #[test]
    fn test_empty_run_is_success() {
        let outcome = outcome(Vec::new());
        assert!(outcome.is_success());
        assert_eq!(outcome.total(), 0);
        assert!(outcome.into_result().is_ok());
    }

    #[test]
    fn test_aggregate_lists_every_failing_node() {
        let failure = CommandFailure::from_error(
            Some("help"),
            &TaskError::Validation {
                exit_code: 1,
                output: "bad".to_string(),
            },
        );
        let outcome = outcome(vec![
            NodeReport::succeeded(role("client.0"), 10),
            NodeReport::failed(role("client.1"), vec![failure.clone()], 20),
            NodeReport::failed(role("client.2"), vec![failure], 30),
        ]);

        assert_eq!(outcome.passed(), 1);
        let err = outcome.into_result().unwrap_err();
        assert_eq!(
            err.failing_nodes(),
            vec![&role("client.1"), &role("client.2")]
        );
        let text = err.to_string();
        assert!(text.contains("2 node(s) failed"));
        assert!(text.contains("[help] ValidationFailure: exit 1: bad"));
    }

    #[test]
    fn test_report_status_from_failures() {
        assert!(NodeReport::from_failures(role("client.0"), Vec::new(), 0).is_success());
        let failure = CommandFailure {
            command: None,
            kind: FailureKind::Transport,
            diagnostic: "ssh missing".to_string(),
        };
        let report = NodeReport::from_failures(role("client.0"), vec![failure], 0);
        assert_eq!(report.status, NodeStatus::Failed);
        assert!(report.to_string().contains("TransportError: ssh missing"));
    }
}
