//! fleet-verify - verification and benchmark orchestration for service fleets
//!
//! Drives work on a set of remote nodes, one concurrent worker per node:
//!
//! - invoke commands through each node's control channel and check the
//!   JSON responses with externally fetched validator programs
//! - launch long-running benchmark processes and join them later
//!
//! ## Usage
//!
//! ```bash
//! # Verify control commands on every node listed in the task
//! fleet-verify verify --task admin_socket.yaml
//!
//! # Fail nodes whose control endpoint does not appear within 5 minutes
//! fleet-verify verify --task admin_socket.yaml --ready-timeout 300
//!
//! # Run the key/value benchmark on the configured clients
//! fleet-verify bench --task kvstorebench.yaml
//!
//! # Show the inventory and configuration
//! fleet-verify nodes
//! fleet-verify config show
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod benchmark;
mod cli;
mod config;
mod control;
mod executor;
mod models;
mod output;
mod remote;
mod utils;
mod validator;
mod workspace;

use benchmark::{DetachedJobLauncher, JobSet};
use cli::Args;
use config::{ConfigFile, EnvConfig};
use executor::VerificationRunner;
use output::{OutputFormat, ResultFormatter};
use remote::Cluster;
use utils::logger::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    init_logger(LogLevel::resolve(
        args.log_level.as_deref(),
        args.verbose,
        env.log_level.as_deref(),
    ));

    match args.command {
        cli::Command::Verify(ref verify_args) => {
            run_verify(&args, verify_args, &env).await?;
        }
        cli::Command::Bench(ref bench_args) => {
            run_bench(&args, bench_args, &env).await?;
        }
        cli::Command::Nodes => {
            list_nodes(&args, &env)?;
        }
        cli::Command::Config(ref config_args) => {
            manage_config(&args, config_args, &env)?;
        }
    }

    Ok(())
}

/// Load the fleet configuration with environment overrides applied
fn load_config(args: &Args, env: &EnvConfig) -> Result<ConfigFile> {
    let path = args.config.as_deref().or(env.config_file.as_deref());
    let mut config = ConfigFile::load_or_default(path)?;
    env.apply(&mut config);
    config.validate().context("Invalid configuration after environment overrides")?;
    Ok(config)
}

fn output_format(flag: Option<&str>, env: &EnvConfig) -> Result<OutputFormat> {
    let name = flag.or(env.format.as_deref()).unwrap_or("table");
    OutputFormat::parse(name).ok_or_else(|| anyhow::anyhow!("Unknown output format: {name}"))
}

/// Cancel readiness waits on Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling nodes still waiting for readiness");
            cancel.cancel();
        }
    });
    token
}

async fn run_verify(args: &Args, verify: &cli::VerifyArgs, env: &EnvConfig) -> Result<()> {
    let config = load_config(args, env)?;
    let format = output_format(verify.format.as_deref(), env)?;
    let cluster = Cluster::from_config(&config);

    let content = std::fs::read_to_string(&verify.task)
        .with_context(|| format!("Failed to read task file: {}", verify.task.display()))?;
    let task = config::parse_verify_task(&content, &cluster.roles())
        .with_context(|| format!("Invalid task file: {}", verify.task.display()))?;

    info!(
        "Verifying {} node(s) from {}",
        task.nodes().len(),
        verify.task.display()
    );

    let mut runner = VerificationRunner::new(config.fleet.clone()).with_cancel(cancel_on_ctrl_c());
    if let Some(secs) = verify.ready_timeout {
        runner = runner.with_ready_timeout(Some(Duration::from_secs(secs)));
    }

    let outcome = runner.run(&cluster, task).await?;

    println!("{}", ResultFormatter::new(format).format_outcome(&outcome));
    if let Some(path) = &verify.output {
        output::write_outcome_to_file(path, &outcome, format)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        info!("Report saved to {}", path.display());
    }

    outcome.into_result()?;
    Ok(())
}

async fn run_bench(args: &Args, bench: &cli::BenchArgs, env: &EnvConfig) -> Result<()> {
    let mut config = load_config(args, env)?;
    if let Some(dir) = &bench.log_dir {
        config.fleet.benchmark.log_dir = Some(dir.clone());
    }
    let format = output_format(bench.format.as_deref(), env)?;
    let cluster = Cluster::from_config(&config);

    let content = std::fs::read_to_string(&bench.task)
        .with_context(|| format!("Failed to read task file: {}", bench.task.display()))?;
    let params = config::parse_bench_task(&content)
        .with_context(|| format!("Invalid benchmark task: {}", bench.task.display()))?;

    info!("Beginning benchmark on {} client(s)", params.clients.len());

    let launcher = DetachedJobLauncher::new(config.fleet.clone());
    let mut jobs = JobSet::new();
    let launched = jobs.launch_all(&launcher, &cluster, &params).await;

    // jobs that did start are always joined
    info!("{} benchmark job(s) running", jobs.len());
    let exits = jobs.join().await;
    println!("{}", ResultFormatter::new(format).format_jobs(&exits));

    launched?;
    Ok(())
}

fn list_nodes(args: &Args, env: &EnvConfig) -> Result<()> {
    let config = load_config(args, env)?;
    let cluster = Cluster::from_config(&config);

    if cluster.is_empty() {
        println!("\nNo nodes configured.");
        println!("   Create a configuration with: fleet-verify config example -o fleet-verify.yaml");
        return Ok(());
    }

    println!("\nNode inventory ({} total)\n", cluster.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for (role, target) in cluster.targets() {
        println!("  {:16} {:30} [{}]", role.name(), target, role.kind());
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    Ok(())
}

fn manage_config(args: &Args, config_args: &cli::ConfigArgs, env: &EnvConfig) -> Result<()> {
    match &config_args.action {
        cli::ConfigAction::Example { output } => {
            let example = ConfigFile::example();
            match output {
                Some(path) => {
                    if path.exists() {
                        anyhow::bail!("Configuration file already exists: {}", path.display());
                    }
                    example.save(path)?;
                    println!("✓ Configuration file created: {}", path.display());
                }
                None => println!("{}", serde_yaml::to_string(&example)?),
            }
        }

        cli::ConfigAction::Show => {
            let config = load_config(args, env)?;
            println!("{}", serde_yaml::to_string(&config)?);
            if env.has_any() {
                env.print_summary();
            }
        }

        cli::ConfigAction::Validate { file } => validate_file(file)?,

        cli::ConfigAction::Env => {
            config::print_env_help();
        }
    }

    Ok(())
}

fn validate_file(path: &Path) -> Result<()> {
    match ConfigFile::load(path) {
        Ok(config) => {
            println!("✓ Configuration file is valid: {}", path.display());
            println!("  {} node(s) configured", config.nodes.len());
            Ok(())
        }
        Err(e) => {
            println!("✗ Configuration file is invalid: {}", path.display());
            println!("  Error: {e:#}");
            Err(e)
        }
    }
}
