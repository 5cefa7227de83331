//! External response validators
//!
//! A validator is a program fetched from a URI into the node's workspace.
//! It reads the canonical JSON response on stdin; exit 0 means the
//! response passed.

use tracing::{debug, info};

use crate::models::{ControlResponse, TaskError};
use crate::remote::{RemoteCommand, RemoteSession};
use crate::workspace::Workspace;

/// Fetches and runs validator programs on a node
#[derive(Clone, Copy, Debug, Default)]
pub struct ValidatorRunner;

impl ValidatorRunner {
    pub fn new() -> Self {
        Self
    }

    /// Download `test_uri` into the workspace and make it executable
    pub async fn fetch(
        &self,
        session: &dyn RemoteSession,
        workspace: &Workspace,
        command_name: &str,
        test_uri: &str,
    ) -> Result<String, TaskError> {
        let target = workspace.join(&sanitize_file_name(command_name));
        let fetch_error = |e: TaskError| TaskError::Fetch {
            uri: test_uri.to_string(),
            diagnostic: e.diagnostic(),
        };

        session
            .run_ok(RemoteCommand::new(["wget", "-q", "-O", target.as_str(), "--", test_uri]))
            .await
            .map_err(fetch_error)?;
        session
            .run_ok(RemoteCommand::new(["chmod", "u=rx", "--", target.as_str()]))
            .await
            .map_err(fetch_error)?;

        debug!("Fetched validator {} to {}", test_uri, target);
        Ok(target)
    }

    /// Run the validator with the response on stdin
    pub async fn execute(
        &self,
        session: &dyn RemoteSession,
        validator: &str,
        response: &ControlResponse,
    ) -> Result<(), TaskError> {
        let command = RemoteCommand::new([validator]).with_stdin(response.to_canonical());
        let output = session.run(command).await?;

        if !output.is_success() {
            return Err(TaskError::Validation {
                exit_code: output.exit_code,
                output: format!("{}{}", output.stdout, output.stderr),
            });
        }

        info!("Validator {} passed", validator);
        Ok(())
    }

    /// Fetch then execute
    ///
    /// The verification flow calls [`fetch`](Self::fetch) and
    /// [`execute`](Self::execute) separately, with the control call between.
    #[allow(dead_code)]
    pub async fn run(
        &self,
        session: &dyn RemoteSession,
        workspace: &Workspace,
        command_name: &str,
        test_uri: &str,
        response: &ControlResponse,
    ) -> Result<(), TaskError> {
        let validator = self.fetch(session, workspace, command_name, test_uri).await?;
        self.execute(session, &validator, response).await
    }
}

/// Map a command name onto a safe file name
fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "._-".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect();

    // "." and ".." would address the workspace itself
    if sanitized.chars().all(|c| c == '.') {
        sanitized.replace('.', "_")
    } else {
        sanitized
    }
}
