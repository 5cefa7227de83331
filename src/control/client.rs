//! Control channel client
//!
//! Issues a command to a node's service through its control endpoint and
//! decodes the JSON document it prints.

use tracing::debug;

use crate::config::FleetConfig;
use crate::models::{ControlResponse, NodeRole, TaskError};
use crate::remote::{RemoteCommand, RemoteSession};

/// Builds and runs control-plane invocations
#[derive(Clone, Debug)]
pub struct ControlChannelClient {
    fleet: FleetConfig,
}

impl ControlChannelClient {
    pub fn new(fleet: FleetConfig) -> Self {
        Self { fleet }
    }

    /// Endpoint path for `node`
    pub fn socket_path(&self, node: &NodeRole) -> String {
        self.fleet.expand(&self.fleet.control.socket_path, node)
    }

    /// Argument vector for one invocation
    pub fn build_args(&self, node: &NodeRole, command: &str, args: &[String]) -> Vec<String> {
        let control = &self.fleet.control;

        let mut argv = vec!["env".to_string()];
        argv.extend(self.fleet.expand_all(&control.env, node));
        argv.extend(self.fleet.expand_all(&control.wrapper, node));
        argv.push(self.fleet.expand(&control.program, node));
        argv.extend(self.fleet.expand_all(&control.program_args, node));
        argv.push(control.endpoint_flag.clone());
        argv.push(self.socket_path(node));
        argv.push(command.to_string());
        argv.extend(args.iter().cloned());
        argv
    }

    /// Run `command` against `node` and decode its output
    pub async fn invoke(
        &self,
        session: &dyn RemoteSession,
        node: &NodeRole,
        command: &str,
        args: &[String],
    ) -> Result<ControlResponse, TaskError> {
        let remote = RemoteCommand::new(self.build_args(node, command, args));
        debug!("Invoking '{}' on {}", command, node);

        let output = session.run_ok(remote).await?;
        ControlResponse::decode(&output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailureKind;
    use crate::remote::mock::MockSession;
    use crate::remote::RemoteOutput;
    use serde_json::json;

    fn client() -> ControlChannelClient {
        ControlChannelClient::new(FleetConfig::default())
    }

    fn node() -> NodeRole {
        NodeRole::parse("client.1").unwrap()
    }

    #[test]
    fn test_build_args() {
        let argv = client().build_args(&node(), "help", &["version".to_string()]);
        assert_eq!(
            argv,
            vec![
                "env",
                "LD_LIBRARY_PATH=/tmp/cephtest/binary/usr/local/lib",
                "/tmp/cephtest/enable-coredump",
                "/tmp/cephtest/binary/usr/local/bin/ceph-coverage",
                "/tmp/cephtest/archive/coverage",
                "/tmp/cephtest/binary/usr/local/bin/ceph",
                "-k",
                "/tmp/cephtest/ceph.keyring",
                "-c",
                "/tmp/cephtest/ceph.conf",
                "--admin-daemon",
                "/tmp/cephtest/asok.client.1",
                "help",
                "version",
            ]
        );
        assert_eq!(client().socket_path(&node()), "/tmp/cephtest/asok.client.1");
    }

    #[tokio::test]
    async fn test_invoke_decodes_stdout() {
        let session = MockSession::new().on("env", |_| RemoteOutput::success("{\"version\": \"0.1\"}\n"));
        let response = client()
            .invoke(&session, &node(), "help", &["version".to_string()])
            .await
            .unwrap();

        assert_eq!(response.value(), &json!({"version": "0.1"}));
        let calls = session.calls_to("env");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args.last().unwrap(), "version");
    }

    #[tokio::test]
    async fn test_invoke_errors() {
        let garbage = MockSession::new().on("env", |_| RemoteOutput::success("no json here"));
        let err = client().invoke(&garbage, &node(), "help", &[]).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Protocol);

        let empty = MockSession::new().on("env", |_| RemoteOutput::success(""));
        let err = client().invoke(&empty, &node(), "help", &[]).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Protocol);

        let failing = MockSession::new().on("env", |_| RemoteOutput::failure(22, "unknown command"));
        let err = client().invoke(&failing, &node(), "nope", &[]).await.unwrap_err();
        match err {
            TaskError::RemoteExecution { exit_code, stderr, .. } => {
                assert_eq!(exit_code, 22);
                assert_eq!(stderr, "unknown command");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
