//! Collaborator stores
//!
//! Resources and campaigns live in SQLite in production. Both tables are
//! reached through the repository traits so the engine can be exercised
//! against [`MemoryStore`] in tests. Assignments are kept as a JSON array
//! column on the campaign row.

pub mod error;
mod packages;
mod repository;

pub use error::StorageError;
pub use packages::{PackageCatalog, StaticPackageCatalog};
pub use repository::{
    CampaignRepository, MemoryStore, ResourceRepository, SharedCampaignRepository,
    SharedResourceRepository, SqliteStore,
};
