use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use std::time::Duration;

use super::Engine;

#[derive(Subcommand)]
pub enum HealthCommand {
    /// Probe stale resources once
    Refresh,

    /// Keep probing on an interval until interrupted
    Watch {
        /// Seconds between refreshes (defaults to the configured interval)
        #[arg(long)]
        interval: Option<u64>,
    },
}

pub async fn health(engine: &Engine, command: HealthCommand) -> Result<()> {
    match command {
        HealthCommand::Refresh => {
            let report = engine.monitor.refresh(Utc::now()).await?;
            println!("Health refresh");
            println!("==============");
            println!("  Stale:   {}", report.stale);
            println!("  Probed:  {}", report.probed);
            println!("  Healthy: {}", report.healthy);
            println!("  Failed:  {}", report.failed);
        }

        HealthCommand::Watch { interval } => {
            let interval = interval
                .map(Duration::from_secs)
                .or_else(|| engine.config.background_interval())
                .unwrap_or(engine.monitor.config().max_age);
            if interval.is_zero() {
                anyhow::bail!("interval must be greater than 0");
            }

            tracing::info!(interval_secs = interval.as_secs(), "Starting health watch");
            let handle = engine.monitor.clone().spawn_refresher(interval);

            tokio::signal::ctrl_c().await?;
            handle.abort();
            tracing::info!("Health watch stopped");
        }
    }

    Ok(())
}
