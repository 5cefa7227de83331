//! Node identity
//!
//! A node is addressed by a role string such as `client.1`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::TaskError;

/// Role kind used by benchmark and `all` expansion
pub const CLIENT_KIND: &str = "client";

/// Identifier for a target node: `<kind>.<id>`
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeRole {
    name: String,
    split: usize,
}

impl NodeRole {
    /// Parse a role string
    pub fn parse(role: &str) -> Result<Self, TaskError> {
        let split = role
            .find('.')
            .ok_or_else(|| TaskError::config(format!("role '{role}' must look like <kind>.<id>")))?;

        if split == 0 || split + 1 == role.len() {
            return Err(TaskError::config(format!(
                "role '{role}' has an empty kind or id"
            )));
        }
        if role.chars().any(char::is_whitespace) {
            return Err(TaskError::config(format!(
                "role '{role}' must not contain whitespace"
            )));
        }

        Ok(Self {
            name: role.to_string(),
            split,
        })
    }

    /// Full role name, e.g. `client.1`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role kind, e.g. `client`
    pub fn kind(&self) -> &str {
        &self.name[..self.split]
    }

    /// Derived short id, e.g. `1`
    pub fn id(&self) -> &str {
        &self.name[self.split + 1..]
    }

    /// Short id as a number when it is one
    pub fn numeric_id(&self) -> Option<u64> {
        self.id().parse().ok()
    }

    pub fn is_client(&self) -> bool {
        self.kind() == CLIENT_KIND
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for NodeRole {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodeRole {
    type Error = TaskError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NodeRole> for String {
    fn from(role: NodeRole) -> Self {
        role.name
    }
}
