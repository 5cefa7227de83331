//! Task document parsing
//!
//! A verification task maps each role to an ordered set of commands:
//!
//! ```yaml
//! client.0:
//!   help:
//!     test: http://example.com/test_help
//!     args: [version]
//! ```
//!
//! Command order is the document order. The role key `all` applies its
//! commands to every client role of the inventory.

use serde_yaml::{Mapping, Value};

use crate::benchmark::BenchParams;
use crate::models::{CommandSpec, NodeRole, TaskError};

/// Role key that expands to every client in the inventory
const ALL_CLIENTS: &str = "all";

/// Parsed verification task: per-node command lists in document order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VerifyTask {
    nodes: Vec<(NodeRole, Vec<CommandSpec>)>,
}

impl VerifyTask {
    pub fn nodes(&self) -> &[(NodeRole, Vec<CommandSpec>)] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<(NodeRole, Vec<CommandSpec>)> {
        self.nodes
    }

    pub fn commands(&self, node: &NodeRole) -> Option<&[CommandSpec]> {
        self.nodes
            .iter()
            .find(|(role, _)| role == node)
            .map(|(_, commands)| commands.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Merge `commands` into `node`'s list; same-named commands are replaced
    /// in place, new ones appended
    fn merge(&mut self, node: NodeRole, commands: Vec<CommandSpec>) {
        let index = match self.nodes.iter().position(|(role, _)| *role == node) {
            Some(index) => index,
            None => {
                self.nodes.push((node, Vec::new()));
                self.nodes.len() - 1
            }
        };
        let existing = &mut self.nodes[index].1;

        for command in commands {
            match existing.iter_mut().find(|c| c.name == command.name) {
                Some(slot) => *slot = command,
                None => existing.push(command),
            }
        }
    }
}

/// Parse a verification task against the node inventory
pub fn parse_verify_task(content: &str, inventory: &[NodeRole]) -> Result<VerifyTask, TaskError> {
    let document: Value = serde_yaml::from_str(content)
        .map_err(|e| TaskError::config(format!("task is not valid YAML/JSON: {e}")))?;

    let roles = match document {
        Value::Null => return Ok(VerifyTask::default()),
        Value::Mapping(map) => map,
        other => {
            return Err(TaskError::config(format!(
                "task must be a mapping of role to commands, got {}",
                type_name(&other)
            )))
        }
    };

    let mut shared = Vec::new();
    let mut explicit = Vec::new();
    for (key, value) in roles {
        let key = key
            .as_str()
            .ok_or_else(|| TaskError::config("role keys must be strings"))?
            .to_string();
        let commands = parse_commands(&key, value)?;

        if key == ALL_CLIENTS {
            shared = commands;
            continue;
        }

        let role = NodeRole::parse(&key)?;
        if !inventory.contains(&role) {
            return Err(TaskError::config(format!(
                "role '{role}' is not in the node inventory"
            )));
        }
        explicit.push((role, commands));
    }

    let mut task = VerifyTask::default();
    if !shared.is_empty() {
        for role in inventory.iter().filter(|r| r.is_client()) {
            task.merge(role.clone(), shared.clone());
        }
    }
    for (role, commands) in explicit {
        task.merge(role, commands);
    }

    Ok(task)
}

fn parse_commands(role: &str, value: Value) -> Result<Vec<CommandSpec>, TaskError> {
    let map = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Mapping(map) => map,
        other => {
            return Err(TaskError::config(format!(
                "commands for '{role}' must be a mapping, got {}",
                type_name(&other)
            )))
        }
    };

    map.into_iter()
        .map(|(name, body)| {
            let name = name
                .as_str()
                .ok_or_else(|| TaskError::config(format!("command names for '{role}' must be strings")))?
                .to_string();
            parse_command(role, name, body)
        })
        .collect()
}

fn parse_command(role: &str, name: String, body: Value) -> Result<CommandSpec, TaskError> {
    let body: Mapping = match body {
        Value::Mapping(map) => map,
        other => {
            return Err(TaskError::config(format!(
                "{role}/{name}: expected a mapping with 'test', got {}",
                type_name(&other)
            )))
        }
    };

    let mut test = None;
    let mut args = Vec::new();
    for (field, value) in body {
        match field.as_str() {
            Some("test") => match value {
                Value::String(uri) => test = Some(uri),
                other => {
                    return Err(TaskError::config(format!(
                        "{role}/{name}: 'test' must be a string, got {}",
                        type_name(&other)
                    )))
                }
            },
            Some("args") => args = parse_args(role, &name, value)?,
            Some(other) => {
                return Err(TaskError::config(format!(
                    "{role}/{name}: unknown field '{other}'"
                )))
            }
            None => {
                return Err(TaskError::config(format!(
                    "{role}/{name}: field names must be strings"
                )))
            }
        }
    }

    let test = test.ok_or_else(|| TaskError::config(format!("{role}/{name}: missing 'test'")))?;
    Ok(CommandSpec::new(name, test).with_args(args))
}

fn parse_args(role: &str, name: &str, value: Value) -> Result<Vec<String>, TaskError> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Sequence(items) => items,
        other => {
            return Err(TaskError::config(format!(
                "{role}/{name}: 'args' must be a list, got {}",
                type_name(&other)
            )))
        }
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            other => Err(TaskError::config(format!(
                "{role}/{name}: every arg must be a string, got {}",
                type_name(&other)
            ))),
        })
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Parse and validate a benchmark task; an empty document takes all defaults
pub fn parse_bench_task(content: &str) -> Result<BenchParams, TaskError> {
    let params: BenchParams = if content.trim().is_empty() {
        BenchParams::default()
    } else {
        match serde_yaml::from_str::<Option<BenchParams>>(content) {
            Ok(params) => params.unwrap_or_default(),
            Err(e) => return Err(TaskError::config(format!("invalid benchmark task: {e}"))),
        }
    };
    params.validate()?;
    Ok(params)
}
