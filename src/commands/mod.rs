mod campaign;
mod health;
mod resource;

use anyhow::{Context, Result};
use std::sync::Arc;

use slotbook::allocation::{Allocator, DuplicateResolver};
use slotbook::campaign::CampaignService;
use slotbook::catalog::ResourceCatalog;
use slotbook::config::Config;
use slotbook::health::{DeferredRefresh, HealthMonitor, HealthRefresh, HttpProber};
use slotbook::storage::SqliteStore;

pub use campaign::{campaign, CampaignCommand};
pub use health::{health, HealthCommand};
pub use resource::{resource, ResourceCommand};

/// Everything a command needs, wired against the SQLite store
pub struct Engine {
    pub store: Arc<SqliteStore>,
    pub catalog: ResourceCatalog,
    pub monitor: Arc<HealthMonitor>,
    pub service: CampaignService,
    pub config: Config,
}

impl Engine {
    pub fn open(config: &Config) -> Result<Self> {
        let store = Arc::new(
            SqliteStore::new(&config.database.sqlite_path)
                .context("Failed to open slotbook database")?,
        );
        let prober = Arc::new(HttpProber::new(&config.prober).context("Failed to create prober")?);
        let monitor = Arc::new(HealthMonitor::new(
            store.clone(),
            prober,
            config.health_config(),
        ));

        // With a background refresher configured, allocation skips the inline probe pass
        let refresh: Arc<dyn HealthRefresh> = match config.background_interval() {
            Some(_) => Arc::new(DeferredRefresh),
            None => monitor.clone(),
        };

        let catalog = ResourceCatalog::new(store.clone());
        let allocator = Allocator::new(catalog.clone(), DuplicateResolver::new(store.clone()), refresh);
        let service = CampaignService::new(store.clone(), Arc::new(config.package_catalog()), allocator);

        Ok(Self {
            store,
            catalog,
            monitor,
            service,
            config: config.clone(),
        })
    }
}
