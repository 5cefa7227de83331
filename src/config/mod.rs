//! Configuration module
//!
//! Fleet settings, config file discovery, environment overrides and task
//! document parsing.
//!
//! Path-like settings are templates: `{base}` expands to the fleet's base
//! directory, `{node}` to the full role name and `{id}` to its short id.

mod env;
mod file;
mod task;

pub use env::{print_env_help, EnvConfig};
pub use file::{ConfigFile, NodeEntry};
pub use task::{parse_bench_task, parse_verify_task, VerifyTask};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::NodeRole;
use crate::remote::SshConfig;

/// Engine settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Scratch root on every node
    pub base_dir: String,

    /// Maximum simultaneously running node workers (0 = no cap)
    pub max_concurrent: usize,

    pub readiness: ReadinessConfig,

    pub ssh: SshConfig,

    pub control: ControlChannelConfig,

    pub benchmark: BenchmarkSettings,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            base_dir: "/tmp/cephtest".to_string(),
            max_concurrent: 0,
            readiness: ReadinessConfig::default(),
            ssh: SshConfig::default(),
            control: ControlChannelConfig::default(),
            benchmark: BenchmarkSettings::default(),
        }
    }
}

impl FleetConfig {
    /// Expand a path template for `node`
    pub fn expand(&self, template: &str, node: &NodeRole) -> String {
        template
            .replace("{base}", self.base_dir.trim_end_matches('/'))
            .replace("{node}", node.name())
            .replace("{id}", node.id())
    }

    pub fn expand_all(&self, templates: &[String], node: &NodeRole) -> Vec<String> {
        templates.iter().map(|t| self.expand(t, node)).collect()
    }
}

/// Readiness polling settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Interval between existence probes
    pub poll_interval_ms: u64,

    /// Give up after this many seconds; unset waits forever
    pub timeout_secs: Option<u64>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            timeout_secs: None,
        }
    }
}

impl ReadinessConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// How a control-channel command line is assembled
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlChannelConfig {
    /// `KEY=VALUE` pairs passed through `env`
    pub env: Vec<String>,

    /// Programs the client is run under (coredump enabler, coverage)
    pub wrapper: Vec<String>,

    /// Control client program
    pub program: String,

    /// Arguments placed before the endpoint flag
    pub program_args: Vec<String>,

    /// Flag that introduces the endpoint path
    pub endpoint_flag: String,

    /// Per-node endpoint path
    pub socket_path: String,
}

impl Default for ControlChannelConfig {
    fn default() -> Self {
        Self {
            env: vec!["LD_LIBRARY_PATH={base}/binary/usr/local/lib".to_string()],
            wrapper: default_wrapper(),
            program: "{base}/binary/usr/local/bin/ceph".to_string(),
            program_args: vec![
                "-k".to_string(),
                "{base}/ceph.keyring".to_string(),
                "-c".to_string(),
                "{base}/ceph.conf".to_string(),
            ],
            endpoint_flag: "--admin-daemon".to_string(),
            socket_path: "{base}/asok.{node}".to_string(),
        }
    }
}

/// Benchmark launch settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkSettings {
    pub env: Vec<String>,

    pub wrapper: Vec<String>,

    /// Benchmark program
    pub program: String,

    /// Keyring passed with `-k`
    pub keyring: String,

    /// Local directory for per-node job logs
    pub log_dir: Option<PathBuf>,
}

impl Default for BenchmarkSettings {
    fn default() -> Self {
        Self {
            env: vec![
                "CEPH_CONF={base}/ceph.conf".to_string(),
                "LD_LIBRARY_PATH={base}/binary/usr/local/lib".to_string(),
            ],
            wrapper: default_wrapper(),
            program: "{base}/binary/usr/local/bin/kvstorebench".to_string(),
            keyring: "{base}/data/{node}.keyring".to_string(),
            log_dir: None,
        }
    }
}

fn default_wrapper() -> Vec<String> {
    vec![
        "{base}/enable-coredump".to_string(),
        "{base}/binary/usr/local/bin/ceph-coverage".to_string(),
        "{base}/archive/coverage".to_string(),
    ]
}
