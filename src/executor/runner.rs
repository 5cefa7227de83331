//! Verification runner
//!
//! Drives the per-node verification flow: workspace, readiness, then each
//! command in order (fetch validator, invoke, validate).

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::ParallelExecutor;
use crate::config::{FleetConfig, VerifyTask};
use crate::control::{ControlChannelClient, ReadinessWaiter};
use crate::models::{
    CommandFailure, CommandSpec, NodeReport, NodeRole, NodeState, RunOutcome, TaskError,
};
use crate::remote::{Cluster, RemoteSession};
use crate::utils::timer::Timer;
use crate::validator::ValidatorRunner;
use crate::workspace::{ScopedWorkspace, Workspace};

/// Prefix of every verification workspace directory
const WORKSPACE_NAME: &str = "validate";

/// What happened inside a node's workspace
#[derive(Debug, Default)]
struct NodeProgress {
    transitions: Vec<NodeState>,
    failures: Vec<CommandFailure>,
}

impl NodeProgress {
    fn enter(&mut self, state: NodeState) {
        self.transitions.push(state);
    }

    fn fail(&mut self, command: Option<&str>, error: &TaskError) {
        match command {
            Some(command) => warn!("Command '{}' failed: {}", command, error),
            None => error!("{}", error),
        }
        self.failures.push(CommandFailure::from_error(command, error));
    }
}

/// Runs verification tasks against a cluster
#[derive(Clone, Debug)]
pub struct VerificationRunner {
    client: ControlChannelClient,
    waiter: ReadinessWaiter,
    validator: ValidatorRunner,
    workspace: ScopedWorkspace,
    executor: ParallelExecutor,
}

impl VerificationRunner {
    pub fn new(fleet: FleetConfig) -> Self {
        Self {
            waiter: ReadinessWaiter::from_config(&fleet.readiness),
            workspace: ScopedWorkspace::new(fleet.base_dir.clone()),
            executor: ParallelExecutor::new(fleet.max_concurrent),
            validator: ValidatorRunner::new(),
            client: ControlChannelClient::new(fleet),
        }
    }

    /// Override the readiness timeout
    pub fn with_ready_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.waiter = self.waiter.with_timeout(timeout);
        self
    }

    /// Cancelling the token fails nodes still waiting for readiness
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.waiter = self.waiter.with_cancel(cancel);
        self
    }

    /// Verify every node of `task` in parallel
    ///
    /// Unknown roles are rejected before anything runs remotely.
    pub async fn run(&self, cluster: &Cluster, task: VerifyTask) -> Result<RunOutcome, TaskError> {
        let mut units = Vec::new();
        for (node, commands) in task.into_nodes() {
            let session = cluster.session(&node)?;
            let runner = self.clone();
            let unit_node = node.clone();
            units.push((node, async move {
                runner.verify_node(session, unit_node, commands).await
            }));
        }

        self.executor.run(units).await
    }

    /// Full verification flow on one node
    pub async fn verify_node(
        &self,
        session: Arc<dyn RemoteSession>,
        node: NodeRole,
        commands: Vec<CommandSpec>,
    ) -> NodeReport {
        let timer = Timer::start(node.name());
        info!("Verifying {} on {} ({} command(s))", node, session.target(), commands.len());

        let scoped = self
            .workspace
            .scope(session.as_ref(), &node, WORKSPACE_NAME, |workspace| {
                self.verify_in_workspace(session.as_ref(), workspace, &commands)
            })
            .await;

        let mut progress = NodeProgress::default();
        progress.enter(NodeState::Created);
        match scoped {
            Ok(inner) => {
                progress.transitions.extend(inner.transitions);
                progress.failures.extend(inner.failures);
            }
            Err(e) => progress.fail(None, &e),
        }
        progress.enter(NodeState::Cleaned);

        let duration_ms = timer.stop().as_millis() as u64;
        let report = NodeReport::from_failures(node, progress.failures, duration_ms);
        let mut transitions = progress.transitions;
        transitions.push(if report.is_success() {
            NodeState::Succeeded
        } else {
            NodeState::Failed
        });

        info!("{} finished: {}", report.node, report.status);
        report.with_transitions(transitions)
    }

    async fn verify_in_workspace(
        &self,
        session: &dyn RemoteSession,
        workspace: Workspace,
        commands: &[CommandSpec],
    ) -> NodeProgress {
        let mut progress = NodeProgress::default();
        progress.enter(NodeState::WorkspaceAcquired);

        progress.enter(NodeState::Waiting);
        let socket = self.client.socket_path(&workspace.node);
        if let Err(e) = self.waiter.wait(session, &socket).await {
            progress.fail(None, &e);
            return progress;
        }
        progress.enter(NodeState::Ready);

        for command in commands {
            if let Err(e) = self.verify_command(session, &workspace, command, &mut progress).await {
                progress.fail(Some(&command.name), &e);
            }
        }

        progress
    }

    async fn verify_command(
        &self,
        session: &dyn RemoteSession,
        workspace: &Workspace,
        command: &CommandSpec,
        progress: &mut NodeProgress,
    ) -> Result<(), TaskError> {
        debug!("Running '{}'", command.display_line());
        let validator = self
            .validator
            .fetch(session, workspace, &command.name, &command.test)
            .await?;

        progress.enter(NodeState::Invoking);
        let response = self
            .client
            .invoke(session, &workspace.node, &command.name, &command.args)
            .await?;

        progress.enter(NodeState::Validating);
        self.validator.execute(session, &validator, &response).await
    }
}
