//! # ReadySet Failover CLI
//!
//! Operator tool for checking ReadySet health and the failover configuration
//! without starting an application.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::time::{Duration, Instant};
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

use readyset_failover::config::{ConfigManager, ReadysetConfig};
use readyset_failover::database::{PgProbeTarget, ReadysetStatus};
use readyset_failover::logging::{init_structured_logging, log_probe_result};
use readyset_failover::resilience::{DirectProber, HealthProbe, ProbeTarget};

#[derive(Parser)]
#[command(name = "readyset-failover")]
#[command(about = "Inspect ReadySet health and failover configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment section to load (development, test, production)
    #[arg(short, long, env = "READYSET_ENV")]
    environment: Option<String>,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write structured JSON logs under log/ in addition to the console
    #[arg(long)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print ReadySet's status as JSON
    Status,

    /// Run one health probe; exits 0 when healthy, 1 otherwise
    Probe {
        /// Override the configured probe timeout
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Load and validate the configuration, then print it with credentials masked
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match &cli.command {
        Commands::Status => show_status(&cli).await,
        Commands::Probe { timeout_ms } => run_probe(&cli, *timeout_ms).await,
        Commands::CheckConfig => check_config(&cli),
    };

    match result {
        Ok(true) => process::exit(0),
        Ok(false) => process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {e:#}");
            process::exit(2);
        }
    }
}

fn init_logging(cli: &Cli) {
    if cli.log_file {
        init_structured_logging();
        return;
    }

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _ = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_manager(cli: &Cli) -> anyhow::Result<std::sync::Arc<ConfigManager>> {
    let manager = match &cli.environment {
        Some(environment) => {
            ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), environment)
        }
        None => ConfigManager::load_from_directory(cli.config_dir.clone()),
    };
    manager.context("failed to load configuration")
}

fn probe_target(config: &ReadysetConfig) -> anyhow::Result<PgProbeTarget> {
    let url = config.readyset_url()?;
    PgProbeTarget::from_url(url).context("invalid ReadySet URL")
}

async fn show_status(cli: &Cli) -> anyhow::Result<bool> {
    let manager = load_manager(cli)?;
    let target = probe_target(manager.config())?;

    let rows = tokio::time::timeout(manager.config().failover.probe_timeout(), target.fetch_status())
        .await
        .context("timed out waiting for SHOW READYSET STATUS")?
        .context("SHOW READYSET STATUS failed")?;

    let status = ReadysetStatus::from_rows(&rows);
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(true)
}

async fn run_probe(cli: &Cli, timeout_ms: Option<u64>) -> anyhow::Result<bool> {
    let manager = load_manager(cli)?;
    let config = manager.config();
    let timeout = timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.failover.probe_timeout());

    let prober = DirectProber::new(probe_target(config)?, timeout);
    let started = Instant::now();
    let healthy = prober.healthy().await;
    log_probe_result(
        &config.shard,
        healthy,
        started.elapsed().as_millis() as u64,
        None,
    );

    println!("{}", if healthy { "healthy" } else { "unhealthy" });
    Ok(healthy)
}

fn check_config(cli: &Cli) -> anyhow::Result<bool> {
    let manager = load_manager(cli)?;
    println!("Environment: {}", manager.environment());
    println!("Config Directory: {}", manager.config_directory().display());
    println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
    Ok(true)
}
