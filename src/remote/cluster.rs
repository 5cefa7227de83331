//! Node inventory resolved to remote sessions

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{RemoteSession, SshSession};
use crate::config::ConfigFile;
use crate::models::{NodeRole, TaskError};

/// One session per role for the duration of a run
#[derive(Clone, Default)]
pub struct Cluster {
    nodes: BTreeMap<NodeRole, Arc<dyn RemoteSession>>,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build SSH sessions for every inventory entry
    pub fn from_config(config: &ConfigFile) -> Self {
        let mut cluster = Self::new();
        for entry in &config.nodes {
            let mut ssh = config.fleet.ssh.clone();
            if let Some(user) = &entry.user {
                ssh.user = user.clone();
            }
            if let Some(port) = entry.port {
                ssh.port = port;
            }
            cluster = cluster.with_node(entry.role.clone(), Arc::new(SshSession::new(ssh, &entry.host)));
        }
        cluster
    }

    pub fn insert(&mut self, role: NodeRole, session: Arc<dyn RemoteSession>) {
        self.nodes.insert(role, session);
    }

    pub fn with_node(mut self, role: NodeRole, session: Arc<dyn RemoteSession>) -> Self {
        self.insert(role, session);
        self
    }

    /// Session for `role`
    pub fn session(&self, role: &NodeRole) -> Result<Arc<dyn RemoteSession>, TaskError> {
        self.nodes
            .get(role)
            .cloned()
            .ok_or_else(|| TaskError::config(format!("no node in the inventory has role '{role}'")))
    }

    /// Every role, sorted
    pub fn roles(&self) -> Vec<NodeRole> {
        self.nodes.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Role and target of every node, for listing
    pub fn targets(&self) -> Vec<(NodeRole, String)> {
        self.nodes
            .iter()
            .map(|(role, session)| (role.clone(), session.target()))
            .collect()
    }
}
