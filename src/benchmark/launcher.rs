//! Detached benchmark launch and join
//!
//! Jobs are started without blocking the caller and joined later.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

use super::BenchParams;
use crate::config::FleetConfig;
use crate::models::{NodeRole, TaskError};
use crate::remote::{Cluster, LogSink, RemoteCommand, RemoteProcess, RemoteSession};

/// A running benchmark process on one node
pub struct JobHandle {
    pub node: NodeRole,
    process: Box<dyn RemoteProcess>,
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle").field("node", &self.node).finish()
    }
}

/// How a joined job ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobExit {
    pub node: NodeRole,
    /// `Err` when the job could not be waited on
    pub result: Result<i32, TaskError>,
}

impl JobExit {
    pub fn exit_code(&self) -> Option<i32> {
        self.result.as_ref().ok().copied()
    }
}

/// Starts benchmark processes
#[derive(Clone, Debug)]
pub struct DetachedJobLauncher {
    fleet: FleetConfig,
}

impl DetachedJobLauncher {
    pub fn new(fleet: FleetConfig) -> Self {
        Self { fleet }
    }

    /// Log file for `node`'s output, when a log dir is configured
    pub fn log_file(&self, node: &NodeRole) -> Option<PathBuf> {
        let dir = self.fleet.benchmark.log_dir.as_ref()?;
        let program = self.fleet.expand(&self.fleet.benchmark.program, node);
        let program = program.rsplit('/').next().unwrap_or("bench");
        Some(dir.join(format!("{}.{}.log", program, node.id())))
    }

    /// Start the benchmark on `node` and return without waiting
    pub async fn launch(
        &self,
        session: &dyn RemoteSession,
        node: &NodeRole,
        params: &BenchParams,
    ) -> Result<JobHandle, TaskError> {
        let args = params.to_args(&self.fleet, node)?;

        let mut sink = LogSink::new(format!("bench.{}", node.id()));
        if let Some(path) = self.log_file(node) {
            if let Some(parent) = path.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    warn!("Failed to create log dir {}: {}", parent.display(), e);
                }
            }
            sink = sink.with_file(path);
        }

        let process = session
            .spawn(RemoteCommand::new(args), sink)
            .instrument(info_span!("node", node = %node))
            .await?;
        info!("Launched benchmark on {}", node);

        Ok(JobHandle {
            node: node.clone(),
            process,
        })
    }
}

/// Running jobs keyed by node id
#[derive(Debug, Default)]
pub struct JobSet {
    jobs: BTreeMap<String, JobHandle>,
}

impl JobSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch one job per client in `params`
    ///
    /// Every role is resolved before the first job starts. A launch
    /// failure is returned after the jobs already started are kept in the
    /// set, so the caller can still join them.
    pub async fn launch_all(
        &mut self,
        launcher: &DetachedJobLauncher,
        cluster: &Cluster,
        params: &BenchParams,
    ) -> Result<(), TaskError> {
        params.validate()?;

        let mut targets: Vec<(NodeRole, Arc<dyn RemoteSession>)> = Vec::new();
        for node in &params.clients {
            if self.contains(node) || targets.iter().any(|(n, _)| n.id() == node.id()) {
                return Err(TaskError::config(format!("benchmark already launched on {node}")));
            }
            targets.push((node.clone(), cluster.session(node)?));
        }

        for (node, session) in targets {
            let handle = launcher.launch(session.as_ref(), &node, params).await?;
            self.insert(handle)?;
        }
        Ok(())
    }

    /// Track a launched job; one per node
    pub fn insert(&mut self, handle: JobHandle) -> Result<(), TaskError> {
        let id = handle.node.id().to_string();
        if self.jobs.contains_key(&id) {
            return Err(TaskError::config(format!(
                "benchmark already launched on {}",
                handle.node
            )));
        }
        self.jobs.insert(id, handle);
        Ok(())
    }

    pub fn contains(&self, node: &NodeRole) -> bool {
        self.jobs.contains_key(node.id())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Wait for every job; exit codes are reported, not judged
    pub async fn join(self) -> Vec<JobExit> {
        if self.is_empty() {
            return Vec::new();
        }
        info!("Joining {} benchmark job(s)", self.len());

        let waits = self.jobs.into_values().map(|job| async move {
            let JobHandle { node, process } = job;
            let result = process.wait().await;
            match &result {
                Ok(code) => info!("Benchmark on {} exited with {}", node, code),
                Err(e) => warn!("Benchmark on {} could not be joined: {}", node, e),
            }
            JobExit { node, result }
        });

        futures::future::join_all(waits).await
    }
}
