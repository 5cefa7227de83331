//! Per-node scratch workspaces
//!
//! A workspace is a uniquely named directory under the fleet's base
//! directory. [`ScopedWorkspace::scope`] removes it on every exit path of
//! the body, including a panic.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};

use crate::models::{NodeRole, TaskError};
use crate::remote::{RemoteCommand, RemoteSession};

/// A directory on one node owned by one worker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workspace {
    pub node: NodeRole,
    pub path: String,
}

impl Workspace {
    /// Path of `file` inside the workspace
    pub fn join(&self, file: &str) -> String {
        format!("{}/{}", self.path.trim_end_matches('/'), file)
    }
}

/// Creates and removes workspaces under `base_dir`
#[derive(Clone, Debug)]
pub struct ScopedWorkspace {
    base_dir: String,
}

impl ScopedWorkspace {
    pub fn new(base_dir: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Create `<base>/<name>_<node>_<suffix>` on the node
    pub async fn acquire(
        &self,
        session: &dyn RemoteSession,
        node: &NodeRole,
        name: &str,
    ) -> Result<Workspace, TaskError> {
        let path = format!(
            "{}/{}_{}_{:04x}",
            self.base_dir.trim_end_matches('/'),
            name,
            node,
            rand::random::<u16>()
        );

        session
            .run_ok(RemoteCommand::new(["mkdir", "--", path.as_str()]))
            .await?;
        debug!("Created workspace {}", path);

        Ok(Workspace {
            node: node.clone(),
            path,
        })
    }

    /// Remove the workspace; failures are only logged
    pub async fn release(&self, session: &dyn RemoteSession, workspace: Workspace) {
        let command = RemoteCommand::new(["rm", "-rf", "--", workspace.path.as_str()]);
        match session.run_ok(command).await {
            Ok(_) => debug!("Removed workspace {}", workspace.path),
            Err(e) => warn!("Failed to remove workspace {}: {}", workspace.path, e),
        }
    }

    /// Run `body` with a fresh workspace and release it afterwards
    ///
    /// Only acquisition errors surface here; the body's own result is
    /// returned as is. A panic in the body is resumed after the release.
    pub async fn scope<F, Fut, T>(
        &self,
        session: &dyn RemoteSession,
        node: &NodeRole,
        name: &str,
        body: F,
    ) -> Result<T, TaskError>
    where
        F: FnOnce(Workspace) -> Fut,
        Fut: Future<Output = T>,
    {
        let workspace = self.acquire(session, node, name).await?;
        let result = AssertUnwindSafe(body(workspace.clone()))
            .catch_unwind()
            .await;
        self.release(session, workspace).await;

        match result {
            Ok(value) => Ok(value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailureKind;
    use crate::remote::mock::MockSession;
    use crate::remote::RemoteOutput;
    use tokio_test::{assert_err, assert_ok};

    fn node() -> NodeRole {
        NodeRole::parse("client.0").unwrap()
    }

    #[tokio::test]
    async fn test_acquire_names_directory() {
        let session = MockSession::new();
        let workspace = ScopedWorkspace::new("/tmp/cephtest/")
            .acquire(&session, &node(), "validate")
            .await
            .unwrap();

        assert!(workspace.path.starts_with("/tmp/cephtest/validate_client.0_"));
        let suffix = workspace.path.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(workspace.join("help"), format!("{}/help", workspace.path));
        assert_eq!(session.calls_to("mkdir")[0].args[2], workspace.path);
    }

    #[tokio::test]
    async fn test_scope_releases_once_on_success_and_error() {
        let session = MockSession::new();
        let scoped = ScopedWorkspace::new("/tmp/cephtest");

        let value = scoped
            .scope(&session, &node(), "ws", |ws| async move { ws.path.len() })
            .await
            .unwrap();
        assert!(value > 0);
        assert_eq!(session.calls_to("rm").len(), 1);

        let result: Result<Result<(), TaskError>, TaskError> = scoped
            .scope(&session, &node(), "ws", |_| async {
                Err(TaskError::config("body failed"))
            })
            .await;
        assert!(result.unwrap().is_err());
        assert_eq!(session.calls_to("rm").len(), 2);
    }

    #[tokio::test]
    async fn test_scope_releases_on_panic() {
        let session = MockSession::new();
        let probe = session.clone();

        let handle = tokio::spawn(async move {
            ScopedWorkspace::new("/tmp/cephtest")
                .scope(&session, &node(), "ws", |_| async {
                    panic!("validator exploded");
                })
                .await
        });

        assert!(handle.await.unwrap_err().is_panic());
        let removed = probe.calls_to("rm");
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].args[..3], ["rm", "-rf", "--"]);
    }

    #[tokio::test]
    async fn test_failed_acquire_skips_body_and_release() {
        let session = MockSession::new().on("mkdir", |_| RemoteOutput::failure(1, "read-only"));
        let mut ran = false;

        let err = assert_err!(
            ScopedWorkspace::new("/tmp/cephtest")
                .scope(&session, &node(), "ws", |_| {
                    ran = true;
                    async {}
                })
                .await
        );

        assert_eq!(err.kind(), FailureKind::RemoteExecution);
        assert!(!ran);
        assert!(session.calls_to("rm").is_empty());
    }

    #[tokio::test]
    async fn test_release_failure_is_not_escalated() {
        let session = MockSession::new().on("rm", |_| RemoteOutput::failure(1, "busy"));
        let scoped = ScopedWorkspace::new("/tmp/cephtest");
        let value = assert_ok!(scoped.scope(&session, &node(), "ws", |_| async { 7 }).await);
        assert_eq!(value, 7);
    }
}
