//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Verification and benchmark orchestration for remote service fleets
#[derive(Parser, Debug)]
#[command(name = "fleet-verify")]
#[command(version)]
#[command(about = "Verify and benchmark services running on a fleet of nodes")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Fleet configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Invoke control commands on every node and validate the responses
    Verify(VerifyArgs),

    /// Launch a benchmark on every client and wait for it to finish
    Bench(BenchArgs),

    /// List the node inventory
    Nodes,

    /// Configuration management
    Config(ConfigArgs),
}

/// Arguments for verify command
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Verification task file (YAML or JSON)
    #[arg(short, long)]
    pub task: PathBuf,

    /// Give up waiting for a control endpoint after this many seconds
    #[arg(long)]
    pub ready_timeout: Option<u64>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Save the report to file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for bench command
#[derive(Parser, Debug)]
pub struct BenchArgs {
    /// Benchmark task file (YAML or JSON)
    #[arg(short, long)]
    pub task: PathBuf,

    /// Directory for per-node job logs
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long)]
    pub format: Option<String>,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print an example configuration
    Example {
        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the effective configuration
    Show,

    /// Validate a configuration file
    Validate {
        /// File to validate
        file: PathBuf,
    },

    /// List supported environment variables
    Env,
}
