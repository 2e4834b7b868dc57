//! slotbook - playlist slot assignment and campaign progress engine
//!
//! Allocates a finite pool of playlist slots to promotion campaigns, keeps
//! the same track from occupying a playlist twice, and simulates stream
//! progress and completion dates from elapsed time.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`] - Resources, campaigns, assignments and genres
//! - [`identity`] - Track and playlist reference parsing
//! - [`catalog`] - Assignable resource listing
//! - [`health`] - Resource probing and health refresh
//! - [`allocation`] - Duplicate protection and tiered slot allocation
//! - [`progress`] - Stream accrual and removal date simulation
//! - [`campaign`] - Status derivation and lifecycle service
//! - [`storage`] - Repository traits with SQLite and in-memory stores
//! - [`config`] - Configuration management and settings
//! - [`metrics`] - Prometheus counters
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chrono::Utc;
//! use slotbook::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = Arc::new(SqliteStore::new(&config.database.sqlite_path)?);
//!     let prober = Arc::new(HttpProber::new(&config.prober)?);
//!     let monitor = Arc::new(HealthMonitor::new(store.clone(), prober, config.health_config()));
//!
//!     let allocator = Allocator::new(
//!         ResourceCatalog::new(store.clone()),
//!         DuplicateResolver::new(store.clone()),
//!         monitor,
//!     );
//!     let service = CampaignService::new(store, Arc::new(config.package_catalog()), allocator);
//!
//!     let campaign = service.create(
//!         NewCampaign {
//!             track_reference: "spotify:track:4uLU6hMCjMI75M1A2tKUQC".into(),
//!             genre: "rock".into(),
//!             package_tier: "starter".into(),
//!             target_volume: 9000,
//!             ..Default::default()
//!         },
//!         Utc::now(),
//!     )?;
//!     service.assign(&campaign.id, Utc::now()).await?;
//!     Ok(())
//! }
//! ```

pub mod allocation;
pub mod campaign;
pub mod catalog;
pub mod config;
pub mod error;
pub mod health;
pub mod identity;
pub mod metrics;
pub mod models;
pub mod progress;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::allocation::{AllocationRequest, Allocator, DuplicateResolver, TrackLocks};
    pub use crate::campaign::{derive_status, CampaignOverview, CampaignService, NewCampaign};
    pub use crate::catalog::ResourceCatalog;
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result, SlotbookErrorTrait};
    pub use crate::health::{
        DeferredRefresh, HealthConfig, HealthMonitor, HealthRefresh, HttpProber, ProbeOutcome,
        ResourceProber,
    };
    pub use crate::models::{
        Assignment, Campaign, CampaignStatus, Genre, HealthStatus, Resource, TrackIdentity,
    };
    pub use crate::progress::{compute_progress, Progress};
    pub use crate::storage::{
        CampaignRepository, MemoryStore, PackageCatalog, ResourceRepository, SqliteStore,
        StaticPackageCatalog,
    };
}

// Direct re-exports for convenience
pub use models::{Assignment, Campaign, CampaignStatus, Genre, HealthStatus, Resource};
