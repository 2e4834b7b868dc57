//! Assignment allocation
//!
//! Picks playlists for a campaign in three tiers:
//!
//! 1. assignable resources of the campaign's genre
//! 2. assignable `General` resources
//! 3. `"empty"` placeholders for whatever is still missing
//!
//! Resources the same track already occupies through another Running
//! campaign are skipped in both real tiers. Within a tier resources are taken
//! in catalog order (name, then id), so the same catalog and exclusion state
//! always produce the same list. Running short is not an error; the result
//! always has exactly `slots_needed` entries.

mod locks;
mod resolver;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::catalog::ResourceCatalog;
use crate::error::Result;
use crate::health::HealthRefresh;
use crate::metrics;
use crate::models::{Assignment, Genre, Resource, TrackIdentity};

pub use locks::TrackLocks;
pub use resolver::DuplicateResolver;

/// What a campaign needs from the allocator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRequest {
    pub genre: Genre,
    pub slots_needed: u32,
    pub track_identity: Option<TrackIdentity>,
    /// Campaign left out of duplicate protection and occupancy counts
    pub exclude_campaign_id: Option<String>,
    /// Resource ids that must not be picked in addition to duplicates
    pub avoid: HashSet<String>,
}

impl AllocationRequest {
    pub fn new(genre: Genre, slots_needed: u32) -> Self {
        Self {
            genre,
            slots_needed,
            track_identity: None,
            exclude_campaign_id: None,
            avoid: HashSet::new(),
        }
    }

    pub fn for_track(mut self, track: Option<TrackIdentity>) -> Self {
        self.track_identity = track;
        self
    }

    pub fn excluding(mut self, campaign_id: impl Into<String>) -> Self {
        self.exclude_campaign_id = Some(campaign_id.into());
        self
    }

    pub fn avoiding(mut self, resource_ids: impl IntoIterator<Item = String>) -> Self {
        self.avoid.extend(resource_ids);
        self
    }
}

/// Picks resources for campaigns
pub struct Allocator {
    catalog: ResourceCatalog,
    resolver: DuplicateResolver,
    health: Arc<dyn HealthRefresh>,
}

impl Allocator {
    pub fn new(
        catalog: ResourceCatalog,
        resolver: DuplicateResolver,
        health: Arc<dyn HealthRefresh>,
    ) -> Self {
        Self {
            catalog,
            resolver,
            health,
        }
    }

    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    pub fn resolver(&self) -> &DuplicateResolver {
        &self.resolver
    }

    /// Allocate `request.slots_needed` assignments
    ///
    /// # Errors
    ///
    /// Only store failures surface here. Probe failures are absorbed by the
    /// health refresh and shortfalls are padded with placeholders.
    pub async fn allocate(
        &self,
        request: &AllocationRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<Assignment>> {
        if request.slots_needed == 0 {
            return Ok(Vec::new());
        }

        self.health.refresh_stale(now).await?;

        let exclude_id = request.exclude_campaign_id.as_deref();
        let duplicates = self.resolver.excluded_resource_ids(
            request.track_identity.as_ref(),
            exclude_id,
            now,
        )?;
        metrics::record_exclusions(duplicates.len());

        let mut excluded = duplicates;
        excluded.extend(request.avoid.iter().cloned());
        let occupancy = self.resolver.live_occupancy(exclude_id, now)?;

        let preferred = if request.genre.is_general() {
            Vec::new()
        } else {
            self.catalog.list_assignable_with(request.genre, &occupancy)?
        };
        let general = self.catalog.list_assignable_with(Genre::General, &occupancy)?;

        let plan = plan_assignments(request.slots_needed, &preferred, &general, &excluded);

        metrics::record_allocation(plan.genre_slots, plan.general_slots, plan.empty_slots);

        tracing::info!(
            genre = %request.genre,
            track = request.track_identity.as_ref().map(|t| t.as_str()).unwrap_or("-"),
            slots_needed = request.slots_needed,
            genre_slots = plan.genre_slots,
            general_slots = plan.general_slots,
            empty_slots = plan.empty_slots,
            excluded = excluded.len(),
            "Allocated slots"
        );

        Ok(plan.assignments)
    }
}

/// Outcome of the tiered selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    pub assignments: Vec<Assignment>,
    pub genre_slots: usize,
    pub general_slots: usize,
    pub empty_slots: usize,
}

/// Tiered selection over already-filtered candidate lists
///
/// `preferred` and `general` must be assignable and in catalog order.
/// Real resources come first, placeholders last, and no resource id
/// appears twice.
pub fn plan_assignments(
    slots_needed: u32,
    preferred: &[Resource],
    general: &[Resource],
    excluded: &HashSet<String>,
) -> AllocationPlan {
    let needed = slots_needed as usize;
    let mut selected: HashSet<String> = HashSet::new();
    let mut assignments = Vec::with_capacity(needed);

    let mut take_from = |tier: &[Resource], assignments: &mut Vec<Assignment>| {
        let before = assignments.len();
        for resource in tier {
            if assignments.len() >= needed {
                break;
            }
            if excluded.contains(&resource.id) || !selected.insert(resource.id.clone()) {
                continue;
            }
            assignments.push(Assignment::for_resource(resource));
        }
        assignments.len() - before
    };

    let genre_slots = take_from(preferred, &mut assignments);
    let general_slots = take_from(general, &mut assignments);

    let empty_slots = needed - assignments.len();
    assignments.extend(std::iter::repeat_with(Assignment::empty).take(empty_slots));

    AllocationPlan {
        assignments,
        genre_slots,
        general_slots,
        empty_slots,
    }
}
