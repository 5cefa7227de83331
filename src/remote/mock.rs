//! Mock session for testing.
//!
//! Records every command and answers with scripted handlers.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::{LogSink, RemoteCommand, RemoteOutput, RemoteProcess, RemoteSession};
use crate::models::TaskError;

type Handler = Box<dyn Fn(&RemoteCommand) -> Result<RemoteOutput, TaskError> + Send + Sync>;

/// Scripted behaviour of a spawned job
#[derive(Clone, Debug, Default)]
pub struct MockJob {
    pub exit_code: i32,
    pub runtime: Duration,
    pub lines: Vec<String>,
}

/// Mock remote session.
///
/// Handlers are matched on the program (first argv element), either exactly
/// or by file name, so `on("help", ..)` also answers `/tmp/ws/help`. Later
/// registrations win. Unmatched commands succeed with empty output.
#[derive(Clone, Default)]
pub struct MockSession {
    handlers: Arc<Mutex<Vec<(String, Handler)>>>,
    calls: Arc<Mutex<Vec<RemoteCommand>>>,
    spawned: Arc<Mutex<Vec<RemoteCommand>>>,
    job: Arc<Mutex<MockJob>>,
    finished: Arc<AtomicUsize>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands for `program`
    pub fn on<F>(self, program: &str, handler: F) -> Self
    where
        F: Fn(&RemoteCommand) -> RemoteOutput + Send + Sync + 'static,
    {
        self.on_result(program, move |cmd| Ok(handler(cmd)))
    }

    /// Answer commands for `program`, possibly failing at the transport level
    pub fn on_result<F>(self, program: &str, handler: F) -> Self
    where
        F: Fn(&RemoteCommand) -> Result<RemoteOutput, TaskError> + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .unwrap()
            .push((program.to_string(), Box::new(handler)));
        self
    }

    /// Behaviour of processes started with `spawn()`
    pub fn with_job(self, job: MockJob) -> Self {
        *self.job.lock().unwrap() = job;
        self
    }

    /// Every command passed to `run()`, in order
    pub fn calls(&self) -> Vec<RemoteCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Commands whose program matches `program`
    pub fn calls_to(&self, program: &str) -> Vec<RemoteCommand> {
        self.calls()
            .into_iter()
            .filter(|c| matches(program, c))
            .collect()
    }

    /// Every command passed to `spawn()`
    pub fn spawned(&self) -> Vec<RemoteCommand> {
        self.spawned.lock().unwrap().clone()
    }

    /// Number of spawned processes that ran to completion
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

fn matches(program: &str, command: &RemoteCommand) -> bool {
    let actual = command.program();
    actual == program || actual.rsplit('/').next() == Some(program)
}

#[async_trait]
impl RemoteSession for MockSession {
    fn target(&self) -> String {
        "mock".to_string()
    }

    async fn run(&self, command: RemoteCommand) -> Result<RemoteOutput, TaskError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.clone());

        // a panicking handler must not break later calls such as cleanup
        let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        match handlers.iter().rev().find(|(p, _)| matches(p, &command)) {
            Some((_, handler)) => handler(&command),
            None => Ok(RemoteOutput::success("")),
        }
    }

    async fn spawn(
        &self,
        command: RemoteCommand,
        sink: LogSink,
    ) -> Result<Box<dyn RemoteProcess>, TaskError> {
        self.spawned.lock().unwrap().push(command);
        let job = self.job.lock().unwrap().clone();

        for line in &job.lines {
            sink.line("stdout", line).await;
        }

        Ok(Box::new(MockProcess {
            job,
            finished: self.finished.clone(),
        }))
    }
}

struct MockProcess {
    job: MockJob,
    finished: Arc<AtomicUsize>,
}

#[async_trait]
impl RemoteProcess for MockProcess {
    async fn wait(self: Box<Self>) -> Result<i32, TaskError> {
        tokio::time::sleep(self.job.runtime).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(self.job.exit_code)
    }
}
