//! Common test utilities
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use slotbook::allocation::{Allocator, DuplicateResolver};
use slotbook::campaign::{CampaignService, NewCampaign};
use slotbook::catalog::ResourceCatalog;
use slotbook::health::{DeferredRefresh, HealthRefresh, ProbeError, ProbeOutcome, ResourceProber};
use slotbook::error::Result as SlotbookResult;
use slotbook::models::{Assignment, Campaign, Genre, HealthStatus, Resource, TrackIdentity};
use slotbook::storage::{CampaignRepository, MemoryStore, ResourceRepository, StaticPackageCatalog};

/// Fixed reference instant
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// A valid 22 character track id derived from `n`
pub fn track_id(n: u32) -> String {
    format!("{n:0>22}")
}

pub fn track_uri(n: u32) -> String {
    format!("spotify:track:{}", track_id(n))
}

pub fn track(n: u32) -> TrackIdentity {
    TrackIdentity::new(track_id(n)).unwrap()
}

/// Healthy, empty resource
pub fn healthy(id: &str, name: &str, genre: Genre, capacity: u32) -> Resource {
    Resource::new(id, name, format!("spotify:playlist:{id:0>22}"), genre, capacity)
        .with_health(HealthStatus::Public, t0())
}

pub fn packages() -> StaticPackageCatalog {
    StaticPackageCatalog::new([("one", 1), ("starter", 2), ("trio", 3), ("pro", 6)])
}

/// Allocator over `store` that never probes
pub fn allocator(store: &Arc<MemoryStore>) -> Allocator {
    allocator_with(store, Arc::new(DeferredRefresh))
}

pub fn allocator_with(store: &Arc<MemoryStore>, health: Arc<dyn HealthRefresh>) -> Allocator {
    Allocator::new(
        ResourceCatalog::new(store.clone()),
        DuplicateResolver::new(store.clone()),
        health,
    )
}

/// Memory-backed campaign service seeded with `resources`
pub fn service(resources: Vec<Resource>) -> (Arc<MemoryStore>, CampaignService) {
    let store = Arc::new(MemoryStore::with_resources(resources));
    let service = CampaignService::new(store.clone(), Arc::new(packages()), allocator(&store));
    (store, service)
}

pub fn order(id: &str, track_n: u32, genre: &str, tier: &str, target: u64) -> NewCampaign {
    NewCampaign {
        id: Some(id.to_string()),
        track_reference: track_uri(track_n),
        genre: genre.to_string(),
        package_tier: tier.to_string(),
        target_volume: target,
    }
}

/// A campaign that is Running at `t0()` on the given resources
pub fn running_campaign(id: &str, track_n: u32, resources: &[&Resource]) -> Campaign {
    Campaign {
        id: id.to_string(),
        track_reference: track_uri(track_n),
        track_identity: Some(track(track_n)),
        genre: Genre::General,
        package_tier: "starter".to_string(),
        slots_needed: resources.len() as u32,
        assignments: resources.iter().map(|r| Assignment::for_resource(r)).collect(),
        direct_confirmed: true,
        slots_confirmed: true,
        slots_started_at: Some(t0() - chrono::Duration::hours(1)),
        target_volume: 10_000_000,
        removed_at: None,
        created_at: t0() - chrono::Duration::days(1),
    }
}

pub fn seed_campaign(store: &MemoryStore, campaign: &Campaign) {
    store.insert_campaign(campaign).unwrap();
}

pub fn seed_resource(store: &MemoryStore, resource: &Resource) {
    store.upsert_resource(resource).unwrap();
}

pub fn ids(assignments: &[Assignment]) -> Vec<&str> {
    assignments.iter().map(|a| a.resource_id.as_str()).collect()
}

/// Prober answering from a fixed table keyed by reference
pub struct TableProber {
    answers: HashMap<String, ProbeOutcome>,
    pub calls: AtomicUsize,
}

impl TableProber {
    pub fn new(answers: impl IntoIterator<Item = (String, ProbeOutcome)>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceProber for TableProber {
    async fn probe(&self, reference: &str) -> Result<ProbeOutcome, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .get(reference)
            .cloned()
            .ok_or(ProbeError::UnexpectedStatus(500))
    }
}

/// Campaign store that stalls on `list_open`, widening the window between
/// reading Running occupancy and saving
pub struct SlowCampaigns {
    inner: Arc<MemoryStore>,
    delay: Duration,
}

impl SlowCampaigns {
    pub fn new(inner: Arc<MemoryStore>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl CampaignRepository for SlowCampaigns {
    fn get_campaign(&self, id: &str) -> SlotbookResult<Option<Campaign>> {
        self.inner.get_campaign(id)
    }

    fn insert_campaign(&self, campaign: &Campaign) -> SlotbookResult<()> {
        self.inner.insert_campaign(campaign)
    }

    fn save_campaign(&self, campaign: &Campaign) -> SlotbookResult<()> {
        self.inner.save_campaign(campaign)
    }

    fn list_by_track(
        &self,
        track: &TrackIdentity,
        exclude_id: Option<&str>,
    ) -> SlotbookResult<Vec<Campaign>> {
        self.inner.list_by_track(track, exclude_id)
    }

    fn list_open(&self) -> SlotbookResult<Vec<Campaign>> {
        let campaigns = self.inner.list_open()?;
        std::thread::sleep(self.delay);
        Ok(campaigns)
    }

    fn list_all(&self) -> SlotbookResult<Vec<Campaign>> {
        self.inner.list_all()
    }
}

/// Campaign service whose campaign reads go through [`SlowCampaigns`]
pub fn slow_service(resources: Vec<Resource>, delay: Duration) -> (Arc<MemoryStore>, CampaignService) {
    let store = Arc::new(MemoryStore::with_resources(resources));
    let campaigns: Arc<dyn CampaignRepository> = Arc::new(SlowCampaigns::new(store.clone(), delay));
    let allocator = Allocator::new(
        ResourceCatalog::new(store.clone()),
        DuplicateResolver::new(campaigns.clone()),
        Arc::new(DeferredRefresh),
    );
    let service = CampaignService::new(campaigns, Arc::new(packages()), allocator);
    (store, service)
}
