//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;
use std::path::PathBuf;

use super::ConfigFile;

/// Environment variable prefix
const ENV_PREFIX: &str = "FLEET_VERIFY";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Config file from FLEET_VERIFY_CONFIG
    pub config_file: Option<PathBuf>,
    /// Remote scratch root from FLEET_VERIFY_BASE_DIR
    pub base_dir: Option<String>,
    /// Readiness timeout from FLEET_VERIFY_READY_TIMEOUT
    pub ready_timeout: Option<u64>,
    /// Poll interval from FLEET_VERIFY_POLL_INTERVAL_MS
    pub poll_interval_ms: Option<u64>,
    /// Worker cap from FLEET_VERIFY_MAX_CONCURRENT
    pub max_concurrent: Option<usize>,
    /// Log level from FLEET_VERIFY_LOG_LEVEL
    pub log_level: Option<String>,
    /// Output format from FLEET_VERIFY_FORMAT
    pub format: Option<String>,
    /// SSH user from FLEET_VERIFY_SSH_USER
    pub ssh_user: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            config_file: get_env("CONFIG").map(PathBuf::from),
            base_dir: get_env("BASE_DIR"),
            ready_timeout: get_env_parse("READY_TIMEOUT"),
            poll_interval_ms: get_env_parse("POLL_INTERVAL_MS"),
            max_concurrent: get_env_parse("MAX_CONCURRENT"),
            log_level: get_env("LOG_LEVEL"),
            format: get_env("FORMAT"),
            ssh_user: get_env("SSH_USER"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.config_file.is_some()
            || self.base_dir.is_some()
            || self.ready_timeout.is_some()
            || self.poll_interval_ms.is_some()
            || self.max_concurrent.is_some()
            || self.log_level.is_some()
            || self.format.is_some()
            || self.ssh_user.is_some()
    }

    /// Overlay set variables onto a loaded config file
    pub fn apply(&self, config: &mut ConfigFile) {
        if let Some(base_dir) = &self.base_dir {
            config.fleet.base_dir = base_dir.clone();
        }
        if let Some(timeout) = self.ready_timeout {
            config.fleet.readiness.timeout_secs = Some(timeout);
        }
        if let Some(interval) = self.poll_interval_ms {
            config.fleet.readiness.poll_interval_ms = interval;
        }
        if let Some(max) = self.max_concurrent {
            config.fleet.max_concurrent = max;
        }
        if let Some(user) = &self.ssh_user {
            config.fleet.ssh.user = user.clone();
        }
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_CONFIG:           {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_BASE_DIR:         {:?}", ENV_PREFIX, self.base_dir);
        println!("  {}_READY_TIMEOUT:    {:?}", ENV_PREFIX, self.ready_timeout);
        println!("  {}_POLL_INTERVAL_MS: {:?}", ENV_PREFIX, self.poll_interval_ms);
        println!("  {}_MAX_CONCURRENT:   {:?}", ENV_PREFIX, self.max_concurrent);
        println!("  {}_LOG_LEVEL:        {:?}", ENV_PREFIX, self.log_level);
        println!("  {}_FORMAT:           {:?}", ENV_PREFIX, self.format);
        println!("  {}_SSH_USER:         {:?}", ENV_PREFIX, self.ssh_user);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.is_empty())
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Print all FLEET_VERIFY environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_CONFIG            Path to configuration file");
    println!("  {ENV_PREFIX}_BASE_DIR          Scratch root on every node");
    println!("  {ENV_PREFIX}_READY_TIMEOUT     Readiness timeout in seconds");
    println!("  {ENV_PREFIX}_POLL_INTERVAL_MS  Readiness poll interval");
    println!("  {ENV_PREFIX}_MAX_CONCURRENT    Maximum concurrent node workers (0 = all)");
    println!("  {ENV_PREFIX}_LOG_LEVEL         trace, debug, info, warn, error");
    println!("  {ENV_PREFIX}_FORMAT            Output format (table, json, csv, summary)");
    println!("  {ENV_PREFIX}_SSH_USER          SSH user for nodes without an override");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_READY_TIMEOUT=300");
    println!("  fleet-verify verify --task admin_socket.yaml");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(!config.has_any());
    }

    #[test]
    fn test_apply_overrides() {
        let env = EnvConfig {
            base_dir: Some("/srv/fleet".to_string()),
            ready_timeout: Some(90),
            max_concurrent: Some(4),
            ssh_user: Some("root".to_string()),
            ..Default::default()
        };
        assert!(env.has_any());

        let mut config = ConfigFile::default();
        env.apply(&mut config);

        assert_eq!(config.fleet.base_dir, "/srv/fleet");
        assert_eq!(config.fleet.readiness.timeout_secs, Some(90));
        assert_eq!(config.fleet.readiness.poll_interval_ms, 1000);
        assert_eq!(config.fleet.max_concurrent, 4);
        assert_eq!(config.fleet.ssh.user, "root");
    }
}
