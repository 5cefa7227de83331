//! Parallel node execution
//!
//! Fans out one unit of work per node and waits for all of them.

use chrono::Utc;
use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, info_span, Instrument};

use crate::models::{
    CommandFailure, FailureKind, NodeReport, NodeRole, RunOutcome, TaskError,
};
use crate::utils::timer::Timer;

/// Parallel node executor
#[derive(Clone, Copy, Debug, Default)]
pub struct ParallelExecutor {
    /// 0 runs every node at once
    max_concurrent: usize,
}

impl ParallelExecutor {
    pub fn new(max_concurrent: usize) -> Self {
        Self { max_concurrent }
    }

    /// Run every unit to completion and collect one report per node
    ///
    /// A failing or panicking unit never cancels its siblings.
    pub async fn run<Fut>(&self, units: Vec<(NodeRole, Fut)>) -> Result<RunOutcome, TaskError>
    where
        Fut: Future<Output = NodeReport> + Send + 'static,
    {
        let mut seen = HashSet::new();
        for (node, _) in &units {
            if !seen.insert(node.clone()) {
                return Err(TaskError::config(format!(
                    "node '{node}' was dispatched more than once"
                )));
            }
        }

        info!(
            "Dispatching {} node(s){}",
            units.len(),
            if self.max_concurrent > 0 {
                format!(" (max {} concurrent)", self.max_concurrent)
            } else {
                String::new()
            }
        );

        let started_at = Utc::now();
        let semaphore = (self.max_concurrent > 0).then(|| Arc::new(Semaphore::new(self.max_concurrent)));

        let mut nodes = Vec::with_capacity(units.len());
        let mut handles = Vec::with_capacity(units.len());

        for (node, unit) in units {
            let semaphore = semaphore.clone();
            let span = info_span!("node", node = %node);

            handles.push(tokio::spawn(
                async move {
                    let _permit = match semaphore {
                        Some(semaphore) => semaphore.acquire_owned().await.ok(),
                        None => None,
                    };
                    unit.await
                }
                .instrument(span),
            ));
            nodes.push((node, Timer::start("node")));
        }

        let results = join_all(handles).await;

        let mut reports = BTreeMap::new();
        for ((node, timer), result) in nodes.into_iter().zip(results) {
            let report = match result {
                Ok(report) => report,
                Err(e) => {
                    error!("Worker for {} did not finish: {}", node, e);
                    let failure = CommandFailure {
                        command: None,
                        kind: FailureKind::RemoteExecution,
                        diagnostic: format!("worker task failed: {e}"),
                    };
                    NodeReport::failed(node.clone(), vec![failure], timer.elapsed_ms())
                }
            };
            reports.insert(node, report);
        }

        let outcome = RunOutcome::new(started_at, reports);
        info!(
            "Run completed in {}ms - Pass: {}/{}",
            outcome.duration_ms(),
            outcome.passed(),
            outcome.total()
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn role(s: &str) -> NodeRole {
        NodeRole::parse(s).unwrap()
    }

    fn failed(node: NodeRole) -> NodeReport {
        let failure = CommandFailure {
            command: Some("help".to_string()),
            kind: FailureKind::Validation,
            diagnostic: "exit 1".to_string(),
        };
        NodeReport::failed(node, vec![failure], 1)
    }

    #[tokio::test]
    async fn test_every_node_reports_when_one_fails() {
        let units: Vec<(NodeRole, BoxFuture<'static, NodeReport>)> = ["client.0", "client.1", "client.2"]
            .iter()
            .map(|name| {
                let node = role(name);
                let unit = {
                    let node = node.clone();
                    async move {
                        if node.id() == "1" {
                            failed(node)
                        } else {
                            NodeReport::succeeded(node, 1)
                        }
                    }
                    .boxed()
                };
                (node, unit)
            })
            .collect();

        let outcome = ParallelExecutor::default().run(units).await.unwrap();
        assert_eq!(outcome.total(), 3);
        assert_eq!(outcome.passed(), 2);
        assert!(!outcome.report(&role("client.1")).unwrap().is_success());
        assert!(!outcome.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_uncapped_units_run_concurrently() {
        let units: Vec<_> = ["client.0", "client.1", "client.2"]
            .iter()
            .map(|name| {
                let node = role(name);
                let unit_node = node.clone();
                (node, async move {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    NodeReport::succeeded(unit_node, 1000)
                })
            })
            .collect();

        let started = tokio::time::Instant::now();
        let outcome = ParallelExecutor::default().run(units).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(1));
        assert_eq!(outcome.passed(), 3);
    }

    async fn explode() -> NodeReport {
        panic!("worker blew up")
    }

    #[tokio::test]
    async fn test_panicking_unit_yields_failed_report() {
        let units: Vec<(NodeRole, BoxFuture<'static, NodeReport>)> = vec![
            (role("client.0"), async { NodeReport::succeeded(role("client.0"), 0) }.boxed()),
            (role("client.1"), explode().boxed()),
        ];

        let outcome = ParallelExecutor::default().run(units).await.unwrap();
        assert_eq!(outcome.total(), 2);
        let report = outcome.report(&role("client.1")).unwrap();
        assert_eq!(report.failures[0].kind, FailureKind::RemoteExecution);
        assert!(report.failures[0].diagnostic.contains("panic"));
        assert!(outcome.report(&role("client.0")).unwrap().is_success());
    }

    #[tokio::test]
    async fn test_duplicate_nodes_rejected_before_dispatch() {
        let started = Arc::new(AtomicUsize::new(0));
        let unit = |started: Arc<AtomicUsize>| async move {
            started.fetch_add(1, Ordering::SeqCst);
            NodeReport::succeeded(role("client.0"), 0)
        };
        let units = vec![
            (role("client.0"), unit(started.clone())),
            (role("client.0"), unit(started.clone())),
        ];

        let err = ParallelExecutor::default().run(units).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Config);
        tokio::task::yield_now().await;
        assert_eq!(started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_run_is_success() {
        let units: Vec<(NodeRole, BoxFuture<'static, NodeReport>)> = Vec::new();
        let outcome = ParallelExecutor::new(2).run(units).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_cap() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let units: Vec<_> = (0..5)
            .map(|i| {
                let node = role(&format!("client.{i}"));
                let (running, peak) = (running.clone(), peak.clone());
                let report_node = node.clone();
                let unit = async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    NodeReport::succeeded(report_node, 100)
                };
                (node, unit)
            })
            .collect();

        let outcome = ParallelExecutor::new(2).run(units).await.unwrap();
        assert_eq!(outcome.total(), 5);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }
}
