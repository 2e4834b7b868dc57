//! Repository pattern for the collaborator stores
//!
//! The engine never talks to a database directly. Resources and campaigns
//! are reached through the traits below so that the allocator, health
//! monitor and campaign service can run against SQLite in production and
//! against the in-memory store in tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │        Allocator · HealthMonitor · CampaignService          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │          ResourceRepository · CampaignRepository            │
//! └─────────────────────────────────────────────────────────────┘
//!                   │                         │
//!                   ▼                         ▼
//!          ┌─────────────────┐       ┌─────────────────┐
//!          │   SqliteStore   │       │   MemoryStore   │
//!          └─────────────────┘       └─────────────────┘
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::campaign::{derive_status, CampaignError};
use crate::error::Result;
use crate::models::{
    Assignment, Campaign, CampaignStatus, Genre, HealthStatus, Resource, TrackIdentity,
};

use super::error::StorageError;

// ============================================================================
// Repository Traits
// ============================================================================

/// Store of playlist resources
pub trait ResourceRepository: Send + Sync {
    /// Resources an operator has not switched off, in no particular order
    fn list_active(&self) -> Result<Vec<Resource>>;

    /// Get resource by id
    fn get_resource(&self, id: &str) -> Result<Option<Resource>>;

    /// Insert or replace a resource
    fn upsert_resource(&self, resource: &Resource) -> Result<()>;

    /// Write back the result of a probe
    fn update_health(
        &self,
        id: &str,
        status: HealthStatus,
        checked_at: DateTime<Utc>,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// Write back the occupant count reported by a probe
    fn update_utilization(&self, id: &str, count: u32) -> Result<()>;
}

/// Store of campaigns
pub trait CampaignRepository: Send + Sync {
    /// Get campaign by id
    fn get_campaign(&self, id: &str) -> Result<Option<Campaign>>;

    /// Insert a new campaign, failing if the id is taken
    fn insert_campaign(&self, campaign: &Campaign) -> Result<()>;

    /// Persist every field of an existing campaign
    fn save_campaign(&self, campaign: &Campaign) -> Result<()>;

    /// Campaigns for a track that have not been torn down
    fn list_by_track(
        &self,
        track: &TrackIdentity,
        exclude_id: Option<&str>,
    ) -> Result<Vec<Campaign>>;

    /// Campaigns that have not been torn down
    fn list_open(&self) -> Result<Vec<Campaign>>;

    /// Every campaign, ordered by creation time
    fn list_all(&self) -> Result<Vec<Campaign>>;

    /// Campaigns for a track whose derived status is `Running` at `now`
    fn list_running_by_track(
        &self,
        track: &TrackIdentity,
        exclude_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Campaign>> {
        Ok(self
            .list_by_track(track, exclude_id)?
            .into_iter()
            .filter(|c| derive_status(c, now) == CampaignStatus::Running)
            .collect())
    }

    /// All open campaigns whose derived status is `Running` at `now`
    fn list_running(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        Ok(self
            .list_open()?
            .into_iter()
            .filter(|c| derive_status(c, now) == CampaignStatus::Running)
            .collect())
    }
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of both repositories
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at `path`
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(StorageError::from)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite store initialized");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::lock_poisoned("sqlite connection").into())
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS resources (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    reference TEXT NOT NULL,
                    genre TEXT NOT NULL DEFAULT 'General',
                    capacity INTEGER NOT NULL,
                    utilization INTEGER NOT NULL DEFAULT 0,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    health_status TEXT NOT NULL DEFAULT 'unknown',
                    health_checked_at TEXT,
                    error_message TEXT
                );

                CREATE INDEX IF NOT EXISTS idx_resources_active
                    ON resources(is_active);

                CREATE TABLE IF NOT EXISTS campaigns (
                    id TEXT PRIMARY KEY,
                    track_reference TEXT NOT NULL,
                    track_identity TEXT,
                    genre TEXT NOT NULL DEFAULT 'General',
                    package_tier TEXT NOT NULL,
                    slots_needed INTEGER NOT NULL,
                    assignments TEXT NOT NULL DEFAULT '[]',
                    direct_confirmed INTEGER NOT NULL DEFAULT 0,
                    slots_confirmed INTEGER NOT NULL DEFAULT 0,
                    slots_started_at TEXT,
                    target_volume INTEGER NOT NULL,
                    removed_at TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_campaigns_track
                    ON campaigns(track_identity);

                CREATE INDEX IF NOT EXISTS idx_campaigns_removed
                    ON campaigns(removed_at);
                "#,
        )?;

        Ok(())
    }

    fn query_campaigns(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Campaign>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, CampaignRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(CampaignRow::into_campaign).collect()
    }

    fn write_campaign(conn: &Connection, campaign: &Campaign, replace: bool) -> Result<usize> {
        let assignments = serde_json::to_string(&campaign.assignments)?;
        let verb = if replace { "INSERT OR REPLACE" } else { "INSERT" };
        let sql = format!(
            "{verb} INTO campaigns (id, track_reference, track_identity, genre, package_tier,
                slots_needed, assignments, direct_confirmed, slots_confirmed, slots_started_at,
                target_volume, removed_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        );

        let changed = conn.execute(
            &sql,
            params![
                campaign.id,
                campaign.track_reference,
                campaign.track_identity.as_ref().map(|t| t.as_str()),
                campaign.genre.as_str(),
                campaign.package_tier,
                campaign.slots_needed,
                assignments,
                campaign.direct_confirmed,
                campaign.slots_confirmed,
                campaign.slots_started_at.map(|t| t.to_rfc3339()),
                campaign.target_volume as i64,
                campaign.removed_at.map(|t| t.to_rfc3339()),
                campaign.created_at.to_rfc3339(),
            ],
        )?;

        Ok(changed)
    }
}

const CAMPAIGN_COLUMNS: &str = "id, track_reference, track_identity, genre, package_tier,
    slots_needed, assignments, direct_confirmed, slots_confirmed, slots_started_at,
    target_volume, removed_at, created_at";

const RESOURCE_COLUMNS: &str = "id, name, reference, genre, capacity, utilization, is_active,
    health_status, health_checked_at, error_message";

/// Raw campaign columns, decoded outside the rusqlite row callback
struct CampaignRow {
    id: String,
    track_reference: String,
    track_identity: Option<String>,
    genre: String,
    package_tier: String,
    slots_needed: u32,
    assignments: String,
    direct_confirmed: bool,
    slots_confirmed: bool,
    slots_started_at: Option<String>,
    target_volume: i64,
    removed_at: Option<String>,
    created_at: String,
}

impl CampaignRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            track_reference: row.get(1)?,
            track_identity: row.get(2)?,
            genre: row.get(3)?,
            package_tier: row.get(4)?,
            slots_needed: row.get(5)?,
            assignments: row.get(6)?,
            direct_confirmed: row.get(7)?,
            slots_confirmed: row.get(8)?,
            slots_started_at: row.get(9)?,
            target_volume: row.get(10)?,
            removed_at: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    fn into_campaign(self) -> Result<Campaign> {
        let assignments: Vec<Assignment> = serde_json::from_str(&self.assignments)
            .map_err(|e| StorageError::corrupt("campaigns", &self.id, e.to_string()))?;

        Ok(Campaign {
            slots_started_at: parse_timestamp("campaigns", &self.id, self.slots_started_at)?,
            removed_at: parse_timestamp("campaigns", &self.id, self.removed_at)?,
            created_at: parse_timestamp("campaigns", &self.id, Some(self.created_at))?
                .unwrap_or_else(Utc::now),
            track_identity: self.track_identity.and_then(TrackIdentity::new),
            genre: Genre::parse(&self.genre),
            target_volume: self.target_volume.max(0) as u64,
            id: self.id,
            track_reference: self.track_reference,
            package_tier: self.package_tier,
            slots_needed: self.slots_needed,
            assignments,
            direct_confirmed: self.direct_confirmed,
            slots_confirmed: self.slots_confirmed,
        })
    }
}

fn parse_timestamp(
    table: &'static str,
    id: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StorageError::corrupt(table, id, format!("bad timestamp '{raw}': {e}")).into())
        })
        .transpose()
}

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<(Resource, Option<String>)> {
    let resource = Resource {
        id: row.get(0)?,
        name: row.get(1)?,
        reference: row.get(2)?,
        genre: Genre::parse(&row.get::<_, String>(3)?),
        capacity: row.get(4)?,
        utilization: row.get(5)?,
        is_active: row.get(6)?,
        health_status: row
            .get::<_, String>(7)?
            .parse()
            .unwrap_or(HealthStatus::Unknown),
        health_checked_at: None,
        error_message: row.get(9)?,
    };
    Ok((resource, row.get(8)?))
}

fn finish_resource(pair: (Resource, Option<String>)) -> Result<Resource> {
    let (mut resource, checked_at) = pair;
    resource.health_checked_at = parse_timestamp("resources", &resource.id, checked_at)?;
    Ok(resource)
}

impl ResourceRepository for SqliteStore {
    fn list_active(&self) -> Result<Vec<Resource>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources WHERE is_active = 1"
        ))?;
        let rows = stmt
            .query_map([], resource_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(finish_resource).collect()
    }

    fn get_resource(&self, id: &str) -> Result<Option<Resource>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = ?1"),
                params![id],
                resource_from_row,
            )
            .optional()?;

        row.map(finish_resource).transpose()
    }

    fn upsert_resource(&self, resource: &Resource) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
                INSERT INTO resources (id, name, reference, genre, capacity, utilization,
                    is_active, health_status, health_checked_at, error_message)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    reference = excluded.reference,
                    genre = excluded.genre,
                    capacity = excluded.capacity,
                    utilization = excluded.utilization,
                    is_active = excluded.is_active,
                    health_status = excluded.health_status,
                    health_checked_at = excluded.health_checked_at,
                    error_message = excluded.error_message
                "#,
            params![
                resource.id,
                resource.name,
                resource.reference,
                resource.genre.as_str(),
                resource.capacity,
                resource.utilization,
                resource.is_active,
                resource.health_status.as_str(),
                resource.health_checked_at.map(|t| t.to_rfc3339()),
                resource.error_message,
            ],
        )?;

        Ok(())
    }

    fn update_health(
        &self,
        id: &str,
        status: HealthStatus,
        checked_at: DateTime<Utc>,
        error_message: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE resources SET health_status = ?2, health_checked_at = ?3, error_message = ?4
             WHERE id = ?1",
            params![id, status.as_str(), checked_at.to_rfc3339(), error_message],
        )?;

        if changed == 0 {
            return Err(StorageError::row_not_found("resources", id).into());
        }
        Ok(())
    }

    fn update_utilization(&self, id: &str, count: u32) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE resources SET utilization = ?2 WHERE id = ?1",
            params![id, count],
        )?;

        if changed == 0 {
            return Err(StorageError::row_not_found("resources", id).into());
        }
        Ok(())
    }
}

impl CampaignRepository for SqliteStore {
    fn get_campaign(&self, id: &str) -> Result<Option<Campaign>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"),
                params![id],
                CampaignRow::from_row,
            )
            .optional()?;

        row.map(CampaignRow::into_campaign).transpose()
    }

    fn insert_campaign(&self, campaign: &Campaign) -> Result<()> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM campaigns WHERE id = ?1)",
            params![campaign.id],
            |row| row.get(0),
        )?;
        if exists {
            return Err(CampaignError::already_exists(&campaign.id).into());
        }

        Self::write_campaign(&conn, campaign, false)?;
        Ok(())
    }

    fn save_campaign(&self, campaign: &Campaign) -> Result<()> {
        let conn = self.conn()?;
        Self::write_campaign(&conn, campaign, true)?;
        Ok(())
    }

    fn list_by_track(
        &self,
        track: &TrackIdentity,
        exclude_id: Option<&str>,
    ) -> Result<Vec<Campaign>> {
        let conn = self.conn()?;
        Self::query_campaigns(
            &conn,
            &format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns
                 WHERE track_identity = ?1 AND removed_at IS NULL
                   AND (?2 IS NULL OR id != ?2)
                 ORDER BY created_at, id"
            ),
            params![track.as_str(), exclude_id],
        )
    }

    fn list_open(&self) -> Result<Vec<Campaign>> {
        let conn = self.conn()?;
        Self::query_campaigns(
            &conn,
            &format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns
                 WHERE removed_at IS NULL ORDER BY created_at, id"
            ),
            [],
        )
    }

    fn list_all(&self) -> Result<Vec<Campaign>> {
        let conn = self.conn()?;
        Self::query_campaigns(
            &conn,
            &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns ORDER BY created_at, id"),
            [],
        )
    }
}

// ============================================================================
// In-Memory Implementation (for testing)
// ============================================================================

/// In-memory implementation of both repositories
///
/// Useful for testing without database dependencies.
#[derive(Default)]
pub struct MemoryStore {
    resources: RwLock<BTreeMap<String, Resource>>,
    campaigns: RwLock<BTreeMap<String, Campaign>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with resources
    pub fn with_resources(resources: impl IntoIterator<Item = Resource>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.resources.write() {
            for resource in resources {
                map.insert(resource.id.clone(), resource);
            }
        }
        store
    }

    /// Number of stored campaigns
    pub fn campaign_count(&self) -> usize {
        self.campaigns.read().map(|m| m.len()).unwrap_or(0)
    }

    fn sorted(mut campaigns: Vec<Campaign>) -> Vec<Campaign> {
        campaigns.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        campaigns
    }
}

fn poisoned(what: &str) -> crate::error::Error {
    StorageError::lock_poisoned(what).into()
}

impl ResourceRepository for MemoryStore {
    fn list_active(&self) -> Result<Vec<Resource>> {
        let resources = self.resources.read().map_err(|_| poisoned("resources"))?;
        Ok(resources.values().filter(|r| r.is_active).cloned().collect())
    }

    fn get_resource(&self, id: &str) -> Result<Option<Resource>> {
        let resources = self.resources.read().map_err(|_| poisoned("resources"))?;
        Ok(resources.get(id).cloned())
    }

    fn upsert_resource(&self, resource: &Resource) -> Result<()> {
        let mut resources = self.resources.write().map_err(|_| poisoned("resources"))?;
        resources.insert(resource.id.clone(), resource.clone());
        Ok(())
    }

    fn update_health(
        &self,
        id: &str,
        status: HealthStatus,
        checked_at: DateTime<Utc>,
        error_message: Option<&str>,
    ) -> Result<()> {
        let mut resources = self.resources.write().map_err(|_| poisoned("resources"))?;
        let resource = resources
            .get_mut(id)
            .ok_or_else(|| StorageError::row_not_found("resources", id))?;

        resource.health_status = status;
        resource.health_checked_at = Some(checked_at);
        resource.error_message = error_message.map(String::from);
        Ok(())
    }

    fn update_utilization(&self, id: &str, count: u32) -> Result<()> {
        let mut resources = self.resources.write().map_err(|_| poisoned("resources"))?;
        let resource = resources
            .get_mut(id)
            .ok_or_else(|| StorageError::row_not_found("resources", id))?;

        resource.utilization = count;
        Ok(())
    }
}

impl CampaignRepository for MemoryStore {
    fn get_campaign(&self, id: &str) -> Result<Option<Campaign>> {
        let campaigns = self.campaigns.read().map_err(|_| poisoned("campaigns"))?;
        Ok(campaigns.get(id).cloned())
    }

    fn insert_campaign(&self, campaign: &Campaign) -> Result<()> {
        let mut campaigns = self.campaigns.write().map_err(|_| poisoned("campaigns"))?;
        if campaigns.contains_key(&campaign.id) {
            return Err(CampaignError::already_exists(&campaign.id).into());
        }
        campaigns.insert(campaign.id.clone(), campaign.clone());
        Ok(())
    }

    fn save_campaign(&self, campaign: &Campaign) -> Result<()> {
        let mut campaigns = self.campaigns.write().map_err(|_| poisoned("campaigns"))?;
        campaigns.insert(campaign.id.clone(), campaign.clone());
        Ok(())
    }

    fn list_by_track(
        &self,
        track: &TrackIdentity,
        exclude_id: Option<&str>,
    ) -> Result<Vec<Campaign>> {
        let campaigns = self.campaigns.read().map_err(|_| poisoned("campaigns"))?;
        Ok(Self::sorted(
            campaigns
                .values()
                .filter(|c| c.removed_at.is_none())
                .filter(|c| c.track_identity.as_ref() == Some(track))
                .filter(|c| Some(c.id.as_str()) != exclude_id)
                .cloned()
                .collect(),
        ))
    }

    fn list_open(&self) -> Result<Vec<Campaign>> {
        let campaigns = self.campaigns.read().map_err(|_| poisoned("campaigns"))?;
        Ok(Self::sorted(
            campaigns
                .values()
                .filter(|c| c.removed_at.is_none())
                .cloned()
                .collect(),
        ))
    }

    fn list_all(&self) -> Result<Vec<Campaign>> {
        let campaigns = self.campaigns.read().map_err(|_| poisoned("campaigns"))?;
        Ok(Self::sorted(campaigns.values().cloned().collect()))
    }
}

// ============================================================================
// Shared Store Types
// ============================================================================

/// Thread-safe shared resource repository
pub type SharedResourceRepository = Arc<dyn ResourceRepository>;

/// Thread-safe shared campaign repository
pub type SharedCampaignRepository = Arc<dyn CampaignRepository>;

// ============================================================================
// Tests
// ============================================================================
