use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;

use slotbook::campaign::{CampaignOverview, NewCampaign};

use super::Engine;

#[derive(Subcommand)]
pub enum CampaignCommand {
    /// Create a campaign from an order
    Create {
        /// Campaign id (defaults to a generated UUID)
        #[arg(long)]
        id: Option<String>,

        /// Track URL, URI or id
        #[arg(long)]
        track: String,

        /// Genre label
        #[arg(long, default_value = "General")]
        genre: String,

        /// Package tier
        #[arg(long)]
        tier: String,

        /// Stream target
        #[arg(long)]
        target: u64,
    },

    /// Allocate playlists for a campaign
    Assign {
        /// Campaign id
        id: String,
    },

    /// Change genre and re-allocate
    Reassign {
        /// Campaign id
        id: String,

        /// New genre label
        #[arg(long)]
        genre: String,
    },

    /// Record a confirmation
    Confirm {
        /// Campaign id
        id: String,

        /// Direct placement confirmed
        #[arg(long, default_value = "false")]
        direct: bool,

        /// Slots confirmed (starts the progress clock)
        #[arg(long, default_value = "false")]
        slots: bool,
    },

    /// Tear down a campaign that reached its target
    Teardown {
        /// Campaign id
        id: String,
    },

    /// Show one campaign
    Show {
        /// Campaign id
        id: String,

        /// Output as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// List all campaigns
    List {
        /// Output as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },
}

pub async fn campaign(engine: &Engine, command: CampaignCommand) -> Result<()> {
    let service = &engine.service;
    let now = Utc::now();

    match command {
        CampaignCommand::Create {
            id,
            track,
            genre,
            tier,
            target,
        } => {
            let campaign = service.create(
                NewCampaign {
                    id,
                    track_reference: track,
                    genre,
                    package_tier: tier,
                    target_volume: target,
                },
                now,
            )?;
            println!(
                "Created campaign {} ({}, {} slots)",
                campaign.id, campaign.genre, campaign.slots_needed
            );
        }

        CampaignCommand::Assign { id } => {
            let assignments = service.assign(&id, now).await?;
            println!("Assignments for {id}:");
            for (i, a) in assignments.iter().enumerate() {
                println!("  {}. {} [{}]", i + 1, a.name, a.genre);
            }
        }

        CampaignCommand::Reassign { id, genre } => {
            let campaign = service.reassign_genre(&id, &genre, now).await?;
            println!(
                "Reassigned {} to {}: {}/{} slots filled",
                campaign.id,
                campaign.genre,
                campaign.filled_slots(),
                campaign.slots_needed
            );
        }

        CampaignCommand::Confirm { id, direct, slots } => {
            if !direct && !slots {
                anyhow::bail!("pass --direct, --slots or both");
            }
            if direct {
                service.confirm_direct(&id, now).await?;
            }
            if slots {
                service.confirm_slots(&id, now).await?;
            }
            print_overview(&service.overview(&id, now)?);
        }

        CampaignCommand::Teardown { id } => {
            service.teardown(&id, now).await?;
            println!("Campaign {id} completed");
        }

        CampaignCommand::Show { id, json } => {
            let overview = service.overview(&id, now)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&overview)?);
            } else {
                print_overview(&overview);
            }
        }

        CampaignCommand::List { json } => {
            let overviews = service.overview_all(now)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&overviews)?);
                return Ok(());
            }

            println!("Campaigns ({})", overviews.len());
            println!("{:-<80}", "");
            for o in &overviews {
                println!(
                    "{:<38} {:<14} {:>8}/{:<8} {}",
                    o.campaign.id,
                    o.status,
                    o.progress.streams_accrued,
                    o.campaign.target_volume,
                    o.progress
                        .removal_date
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
    }

    Ok(())
}

fn print_overview(overview: &CampaignOverview) {
    let c = &overview.campaign;
    println!("Campaign {}", c.id);
    println!("{:-<40}", "");
    println!("  Track:     {}", c.track_reference);
    println!("  Genre:     {}", c.genre);
    println!("  Package:   {} ({} slots)", c.package_tier, c.slots_needed);
    println!("  Status:    {}", overview.status);
    println!(
        "  Progress:  {}/{}",
        overview.progress.streams_accrued, c.target_volume
    );
    if let Some(date) = overview.progress.removal_date {
        println!("  Removal:   {date}");
    }
    for a in &c.assignments {
        println!("  - {} [{}]", a.name, a.genre);
    }
}
