//! Configuration file management
//!
//! Handles finding, loading, and validating the fleet configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::FleetConfig;
use crate::models::NodeRole;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./fleet-verify.yaml",
    "./fleet-verify.yml",
    "./.fleet-verify.yaml",
    "~/.config/fleet-verify/config.yaml",
];

/// Full configuration file structure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Engine settings
    #[serde(default)]
    pub fleet: FleetConfig,

    /// Node inventory
    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            fleet: FleetConfig::default(),
            nodes: Vec::new(),
        }
    }
}

impl ConfigFile {
    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load from `path`, or the first standard location, or defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::find() {
                Some(path) => Self::load(&path),
                None => Ok(Self::default()),
            },
        }
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !["1.0"].contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }

        if self.fleet.readiness.poll_interval_ms == 0 {
            anyhow::bail!("readiness.poll_interval_ms must be greater than zero");
        }

        if self.fleet.base_dir.trim().is_empty() {
            anyhow::bail!("base_dir must not be empty");
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.host.trim().is_empty() {
                anyhow::bail!("Node '{}' has no host", node.role);
            }
            if !seen.insert(&node.role) {
                anyhow::bail!("Node '{}' is listed more than once", node.role);
            }
        }

        Ok(())
    }

    /// Generate example configuration
    pub fn example() -> Self {
        let mut config = Self::default();
        config.fleet.readiness.timeout_secs = Some(300);
        config.fleet.benchmark.log_dir = Some(PathBuf::from("./logs"));
        config.nodes = (0..2)
            .filter_map(|i| {
                NodeRole::parse(&format!("client.{i}"))
                    .ok()
                    .map(|role| NodeEntry {
                        role,
                        host: format!("10.0.0.{}", 10 + i),
                        user: None,
                        port: None,
                    })
            })
            .collect();
        config
    }
}

/// One inventory entry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeEntry {
    pub role: NodeRole,
    pub host: String,
    /// Overrides `ssh.user`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Overrides `ssh.port`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_file_default() {
        let config = ConfigFile::default();
        assert_eq!(config.version, "1.0");
        assert!(config.nodes.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_save_load() {
        let dir = tempdir().unwrap();

        for name in ["config.yaml", "config.json"] {
            let path = dir.path().join(name);
            let config = ConfigFile::example();
            config.save(&path).unwrap();

            let loaded = ConfigFile::load(&path).unwrap();
            assert_eq!(loaded.version, config.version);
            assert_eq!(loaded.nodes.len(), 2);
            assert_eq!(loaded.nodes[1].role.name(), "client.1");
            assert_eq!(loaded.fleet.readiness.timeout_secs, Some(300));
        }
    }

    #[test]
    fn test_load_partial_yaml_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fleet.yaml");
        std::fs::write(
            &path,
            "nodes:\n  - role: client.0\n    host: node-a\n    user: root\nfleet:\n  readiness:\n    poll_interval_ms: 250\n",
        )
        .unwrap();

        let config = ConfigFile::load(&path).unwrap();
        assert_eq!(config.fleet.base_dir, "/tmp/cephtest");
        assert_eq!(config.fleet.readiness.poll_interval_ms, 250);
        assert_eq!(config.nodes[0].user.as_deref(), Some("root"));
    }

    #[test]
    fn test_validate_rejects_duplicates_and_zero_interval() {
        let mut config = ConfigFile::example();
        config.nodes.push(config.nodes[0].clone());
        assert!(config.validate().is_err());

        let mut config = ConfigFile::example();
        config.fleet.readiness.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = ConfigFile::example();
        config.version = "9.9".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_role_fails_to_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fleet.yaml");
        std::fs::write(&path, "nodes:\n  - role: client\n    host: a\n").unwrap();
        assert!(ConfigFile::load(&path).is_err());
    }
}
