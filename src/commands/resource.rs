use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;

use slotbook::models::{Genre, HealthStatus, Resource};
use slotbook::storage::ResourceRepository;

use super::Engine;

#[derive(Subcommand)]
pub enum ResourceCommand {
    /// Add or replace a playlist resource
    Add {
        /// Resource id (defaults to a generated UUID)
        #[arg(long)]
        id: Option<String>,

        /// Display name
        #[arg(long)]
        name: String,

        /// Playlist URL, URI or id
        #[arg(long)]
        reference: String,

        /// Genre label
        #[arg(long, default_value = "General")]
        genre: String,

        /// Maximum concurrent campaigns
        #[arg(long)]
        capacity: u32,

        /// Mark as manually verified (status `active`, never re-probed)
        #[arg(long, default_value = "false")]
        verified: bool,
    },

    /// List active resources
    List {
        /// Output as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Stop offering a resource
    Disable {
        /// Resource id
        id: String,
    },

    /// Offer a disabled resource again
    Enable {
        /// Resource id
        id: String,
    },
}

pub fn resource(engine: &Engine, command: ResourceCommand) -> Result<()> {
    match command {
        ResourceCommand::Add {
            id,
            name,
            reference,
            genre,
            capacity,
            verified,
        } => {
            let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let mut resource = Resource::new(&id, name, reference, Genre::parse(&genre), capacity);
            if verified {
                resource = resource.with_health(HealthStatus::Active, Utc::now());
            }
            engine.store.upsert_resource(&resource)?;

            tracing::info!(resource = %id, genre = %resource.genre, "Resource saved");
            println!("Saved resource {id} ({}, capacity {capacity})", resource.genre);
        }

        ResourceCommand::List { json } => {
            let resources = engine.catalog.list_active()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&resources)?);
                return Ok(());
            }

            println!("Resources ({})", resources.len());
            println!("{:-<72}", "");
            for r in &resources {
                println!(
                    "{:<24} {:<12} {:>3}/{:<3} {:<8} {}",
                    r.name,
                    r.genre,
                    r.utilization,
                    r.capacity,
                    r.health_status,
                    r.health_checked_at
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "never".to_string())
                );
            }
        }

        ResourceCommand::Disable { id } => set_active(engine, &id, false)?,
        ResourceCommand::Enable { id } => set_active(engine, &id, true)?,
    }

    Ok(())
}

fn set_active(engine: &Engine, id: &str, active: bool) -> Result<()> {
    let mut resource = engine
        .store
        .get_resource(id)?
        .with_context(|| format!("Resource not found: {id}"))?;

    resource.is_active = active;
    engine.store.upsert_resource(&resource)?;
    println!(
        "Resource {id} {}",
        if active { "enabled" } else { "disabled" }
    );
    Ok(())
}
