use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slotbook::config::Config;

mod commands;

use commands::{CampaignCommand, HealthCommand, ResourceCommand};

#[derive(Parser)]
#[command(
    name = "slotbook",
    version,
    about = "Playlist slot assignment and campaign progress engine",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables are used when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    /// Print Prometheus metrics after the command finishes
    #[arg(long, global = true)]
    metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage playlist resources
    Resource {
        #[command(subcommand)]
        command: ResourceCommand,
    },

    /// Probe resource health
    Health {
        #[command(subcommand)]
        command: HealthCommand,
    },

    /// Manage campaigns
    Campaign {
        #[command(subcommand)]
        command: CampaignCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging
    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate()?;

    if cli.metrics {
        slotbook::metrics::init_metrics()
            .map_err(|e| anyhow::anyhow!("Failed to initialize metrics: {e}"))?;
    }

    tracing::debug!(
        database = %config.database.sqlite_path.display(),
        "slotbook starting"
    );

    let engine = commands::Engine::open(&config)?;

    match cli.command {
        Commands::Resource { command } => commands::resource(&engine, command)?,
        Commands::Health { command } => commands::health(&engine, command).await?,
        Commands::Campaign { command } => commands::campaign(&engine, command).await?,
    }

    if cli.metrics {
        let encoded = slotbook::metrics::encode_metrics()
            .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {e}"))?;
        print!("{encoded}");
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("slotbook=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("slotbook=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().compact())
                .init();
        }
    }

    Ok(())
}
