//! # Fabflow Configuration Validator
//!
//! Command-line tool for loading and validating fabflow configuration for an
//! environment before the orchestration system is started.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fabflow_core::config::{ConfigManager, FabflowConfig};
use fabflow_core::models::PipelineStage;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate fabflow configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production, ...)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory holding fabflow.toml (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format (table, json)
    #[arg(long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate the configuration
    Validate,

    /// Print the effective configuration
    Show,

    /// Print the built-in defaults
    Defaults,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::Validate) | None => validate(&cli),
        Some(Commands::Show) => show(&cli),
        Some(Commands::Defaults) => print_config(&FabflowConfig::default(), &cli.format),
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
        }
        Err(e) => {
            error!("Configuration validation failed: {e:#}");
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> anyhow::Result<std::sync::Arc<ConfigManager>> {
    ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)
        .with_context(|| format!("loading configuration for '{}'", cli.environment))
}

fn validate(cli: &Cli) -> anyhow::Result<()> {
    println!("🔧 Validating fabflow configuration");
    println!("Environment: {}", cli.environment);
    if let Some(dir) = &cli.config_dir {
        println!("Config Directory: {}", dir.display());
    }
    println!();

    let manager = load(cli)?;
    println!("✅ Configuration loaded and validated");
    println!();
    print_config(manager.config(), &cli.format)
}

fn show(cli: &Cli) -> anyhow::Result<()> {
    let manager = load(cli)?;
    print_config(manager.config(), &cli.format)
}

fn print_config(config: &FabflowConfig, format: &str) -> anyhow::Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        "table" => print_table(config),
        other => anyhow::bail!("unsupported output format '{other}' (expected table or json)"),
    }
    Ok(())
}

fn print_table(config: &FabflowConfig) {
    let capacity = config
        .queue
        .capacity
        .map_or_else(|| "unbounded".to_string(), |c| c.to_string());

    println!("{:<40} {}", "SETTING", "VALUE");
    println!("{:<40} {}", "queue.capacity", capacity);
    println!("{:<40} {}", "queue.default_max_retries", config.queue.default_max_retries);
    println!("{:<40} {}", "queue.dead_letter_capacity", config.queue.dead_letter_capacity);
    println!(
        "{:<40} {}ms",
        "queue.receive_poll_timeout_ms", config.queue.receive_poll_timeout_ms
    );
    println!(
        "{:<40} {}",
        "orchestration.max_concurrent_workflows", config.orchestration.max_concurrent_workflows
    );
    println!(
        "{:<40} {}ms",
        "orchestration.step_response_timeout_ms", config.orchestration.step_response_timeout_ms
    );
    println!(
        "{:<40} {}",
        "orchestration.step_max_retries", config.orchestration.step_max_retries
    );
    println!("{:<40} {}", "orchestration.sender_name", config.orchestration.sender_name);
    println!("{:<40} {}ms", "backoff.base_delay_ms", config.backoff.base_delay_ms);
    println!("{:<40} {}ms", "backoff.max_delay_ms", config.backoff.max_delay_ms);
    println!("{:<40} {}", "backoff.multiplier", config.backoff.multiplier);
    for stage in PipelineStage::ALL {
        println!(
            "{:<40} {}",
            format!("pipeline.{stage}_capability"),
            config.pipeline.capability_for(stage)
        );
    }
}
