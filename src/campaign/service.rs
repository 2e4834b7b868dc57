//! Campaign orchestration
//!
//! Every operation that reads assignments and writes them back holds the
//! campaign's track lock for the whole read-allocate-save sequence, so two
//! campaigns promoting the same track cannot both claim a playlist that
//! looked free when they read it.
//!
//! Running occupancy is shared by every track, so any write that can add
//! a campaign's resources to it also holds the service-wide occupancy
//! lock. It is always taken after the track lock.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};

use crate::allocation::{AllocationRequest, Allocator, TrackLocks};
use crate::error::Result;
use crate::identity::extract_track_identity;
use crate::models::{Assignment, Campaign, CampaignStatus, Genre};
use crate::progress::{compute_progress, Progress};
use crate::storage::{PackageCatalog, SharedCampaignRepository};

use super::{derive_status, CampaignError};

/// Order details for a new campaign
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCampaign {
    /// Explicit id; a UUID is generated when absent
    pub id: Option<String>,
    pub track_reference: String,
    /// Free-form genre label, resolved through [`Genre::parse`]
    pub genre: String,
    pub package_tier: String,
    pub target_volume: u64,
}

/// Read model combining a campaign with its derived state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignOverview {
    pub campaign: Campaign,
    pub status: CampaignStatus,
    pub progress: Progress,
}

impl CampaignOverview {
    pub fn at(campaign: Campaign, now: DateTime<Utc>) -> Self {
        Self {
            status: derive_status(&campaign, now),
            progress: compute_progress(&campaign, now),
            campaign,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Confirmation {
    Direct,
    Slots,
}

/// Entry point for campaign lifecycle operations
pub struct CampaignService {
    campaigns: SharedCampaignRepository,
    packages: Arc<dyn PackageCatalog>,
    allocator: Allocator,
    locks: TrackLocks,
    occupancy: Mutex<()>,
}

impl CampaignService {
    pub fn new(
        campaigns: SharedCampaignRepository,
        packages: Arc<dyn PackageCatalog>,
        allocator: Allocator,
    ) -> Self {
        Self {
            campaigns,
            packages,
            allocator,
            locks: TrackLocks::new(),
            occupancy: Mutex::new(()),
        }
    }

    fn load(&self, id: &str) -> Result<Campaign> {
        self.campaigns
            .get_campaign(id)?
            .ok_or_else(|| CampaignError::not_found(id).into())
    }

    fn load_open(&self, id: &str) -> Result<Campaign> {
        let campaign = self.load(id)?;
        if campaign.removed_at.is_some() {
            return Err(CampaignError::terminal(id).into());
        }
        Ok(campaign)
    }

    /// Take the track lock for campaign `id`, if it has a track identity
    async fn lock_campaign(&self, id: &str) -> Result<Option<OwnedMutexGuard<()>>> {
        let campaign = self.load_open(id)?;
        Ok(match &campaign.track_identity {
            Some(track) => Some(self.locks.lock(track).await),
            None => None,
        })
    }

    /// Take the occupancy lock when `campaign` counts towards Running occupancy
    async fn lock_occupancy_if_running(
        &self,
        campaign: &Campaign,
        now: DateTime<Utc>,
    ) -> Option<MutexGuard<'_, ()>> {
        if derive_status(campaign, now) == CampaignStatus::Running {
            Some(self.occupancy.lock().await)
        } else {
            None
        }
    }

    /// Create and persist a campaign in `ActionNeeded`
    pub fn create(&self, new: NewCampaign, now: DateTime<Utc>) -> Result<Campaign> {
        let slots_needed = self.packages.slots_needed_for(&new.package_tier)?;
        let track_identity = extract_track_identity(&new.track_reference);
        if track_identity.is_none() {
            tracing::warn!(
                reference = %new.track_reference,
                "Unrecognized track reference, duplicate protection disabled"
            );
        }

        let campaign = Campaign {
            id: new.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            track_reference: new.track_reference,
            track_identity,
            genre: Genre::parse(&new.genre),
            package_tier: new.package_tier,
            slots_needed,
            assignments: Vec::new(),
            direct_confirmed: false,
            slots_confirmed: false,
            slots_started_at: None,
            target_volume: new.target_volume,
            removed_at: None,
            created_at: now,
        };

        self.campaigns.insert_campaign(&campaign)?;
        tracing::info!(
            campaign = %campaign.id,
            genre = %campaign.genre,
            slots = campaign.slots_needed,
            "Created campaign"
        );

        Ok(campaign)
    }

    /// Populate assignments once
    ///
    /// A campaign that already has assignments is returned untouched.
    pub async fn assign(&self, id: &str, now: DateTime<Utc>) -> Result<Vec<Assignment>> {
        let existing = self.load_open(id)?;
        if existing.is_assigned() {
            return Ok(existing.assignments);
        }

        let _guard = self.lock_campaign(id).await?;
        let mut campaign = self.load_open(id)?;
        if campaign.is_assigned() {
            return Ok(campaign.assignments);
        }
        let _occupancy = self.lock_occupancy_if_running(&campaign, now).await;

        let request = AllocationRequest::new(campaign.genre, campaign.slots_needed)
            .for_track(campaign.track_identity.clone())
            .excluding(&campaign.id);
        campaign.assignments = self.allocator.allocate(&request, now).await?;
        self.campaigns.save_campaign(&campaign)?;

        tracing::info!(
            campaign = %campaign.id,
            filled = campaign.filled_slots(),
            slots = campaign.slots_needed,
            "Assigned campaign"
        );

        Ok(campaign.assignments)
    }

    /// Change the genre and re-resolve every slot
    ///
    /// The campaign's own current resources are not treated as duplicates.
    pub async fn reassign_genre(
        &self,
        id: &str,
        genre: &str,
        now: DateTime<Utc>,
    ) -> Result<Campaign> {
        let _guard = self.lock_campaign(id).await?;
        let mut campaign = self.load_open(id)?;
        let _occupancy = self.lock_occupancy_if_running(&campaign, now).await;

        let previous = campaign.genre;
        campaign.genre = Genre::parse(genre);

        let request = AllocationRequest::new(campaign.genre, campaign.slots_needed)
            .for_track(campaign.track_identity.clone())
            .excluding(&campaign.id);
        campaign.assignments = self.allocator.allocate(&request, now).await?;
        self.campaigns.save_campaign(&campaign)?;

        tracing::info!(
            campaign = %campaign.id,
            from = %previous,
            to = %campaign.genre,
            filled = campaign.filled_slots(),
            "Reassigned campaign genre"
        );

        Ok(campaign)
    }

    pub async fn confirm_direct(&self, id: &str, now: DateTime<Utc>) -> Result<Campaign> {
        self.confirm(id, Confirmation::Direct, now).await
    }

    /// Confirm slots, starting the progress clock the first time
    pub async fn confirm_slots(&self, id: &str, now: DateTime<Utc>) -> Result<Campaign> {
        self.confirm(id, Confirmation::Slots, now).await
    }

    async fn confirm(
        &self,
        id: &str,
        which: Confirmation,
        now: DateTime<Utc>,
    ) -> Result<Campaign> {
        let _guard = self.lock_campaign(id).await?;
        let mut campaign = self.load_open(id)?;
        let before = derive_status(&campaign, now);

        match which {
            Confirmation::Direct => campaign.direct_confirmed = true,
            Confirmation::Slots => {
                campaign.slots_confirmed = true;
                if campaign.slots_started_at.is_none() {
                    campaign.slots_started_at = Some(now);
                }
            }
        }

        let after = derive_status(&campaign, now);
        let _occupancy = if before != CampaignStatus::Running && after == CampaignStatus::Running {
            // Held until the save so the next recheck sees this campaign
            let guard = self.occupancy.lock().await;
            self.release_conflicts(&mut campaign, now).await?;
            Some(guard)
        } else {
            None
        };

        self.campaigns.save_campaign(&campaign)?;
        tracing::info!(
            campaign = %campaign.id,
            confirmation = ?which,
            status = %after,
            "Confirmed campaign"
        );

        Ok(campaign)
    }

    /// Replace assignments that clash with Running campaigns
    ///
    /// Assignments are made while a campaign is still `ActionNeeded`, when
    /// duplicate protection and occupancy do not see it yet. On entering
    /// `Running` its resources are checked again: a resource the track
    /// already holds elsewhere, or one whose Running occupancy has reached
    /// capacity, is swapped for a fresh allocation.
    async fn release_conflicts(&self, campaign: &mut Campaign, now: DateTime<Utc>) -> Result<()> {
        let resolver = self.allocator.resolver();
        let duplicates = resolver.excluded_resource_ids(
            campaign.track_identity.as_ref(),
            Some(&campaign.id),
            now,
        )?;
        let occupancy = resolver.live_occupancy(Some(&campaign.id), now)?;
        let resources = self.allocator.catalog().list_active()?;

        let is_full = |id: &str| {
            resources.iter().any(|r| {
                r.id == id && occupancy.get(id).copied().unwrap_or(0) >= r.capacity
            })
        };

        let conflicting: Vec<usize> = campaign
            .assignments
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.is_empty())
            .filter(|(_, a)| duplicates.contains(&a.resource_id) || is_full(&a.resource_id))
            .map(|(i, _)| i)
            .collect();

        if conflicting.is_empty() {
            return Ok(());
        }

        tracing::warn!(
            campaign = %campaign.id,
            conflicts = conflicting.len(),
            "Replacing assignments that clash with running campaigns"
        );

        let held: HashSet<String> = campaign.resource_ids().map(String::from).collect();
        let request = AllocationRequest::new(campaign.genre, conflicting.len() as u32)
            .for_track(campaign.track_identity.clone())
            .excluding(&campaign.id)
            .avoiding(held);
        let replacements = self.allocator.allocate(&request, now).await?;

        for (index, replacement) in conflicting.into_iter().zip(replacements) {
            campaign.assignments[index] = replacement;
        }
        // Real resources first, placeholders last
        campaign.assignments.sort_by_key(Assignment::is_empty);

        Ok(())
    }

    /// Tear down a campaign that reached its target
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless the campaign is `RemovalNeeded`,
    /// `Terminal` if it is already completed.
    pub async fn teardown(&self, id: &str, now: DateTime<Utc>) -> Result<Campaign> {
        let _guard = self.lock_campaign(id).await?;
        let mut campaign = self.load_open(id)?;

        let status = derive_status(&campaign, now);
        if status != CampaignStatus::RemovalNeeded {
            return Err(CampaignError::invalid_transition(id, status, CampaignStatus::Completed).into());
        }

        campaign.removed_at = Some(now);
        self.campaigns.save_campaign(&campaign)?;
        tracing::info!(campaign = %campaign.id, "Campaign completed");

        Ok(campaign)
    }

    pub fn get(&self, id: &str) -> Result<Campaign> {
        self.load(id)
    }

    pub fn overview(&self, id: &str, now: DateTime<Utc>) -> Result<CampaignOverview> {
        Ok(CampaignOverview::at(self.load(id)?, now))
    }

    pub fn overview_all(&self, now: DateTime<Utc>) -> Result<Vec<CampaignOverview>> {
        Ok(self
            .campaigns
            .list_all()?
            .into_iter()
            .map(|c| CampaignOverview::at(c, now))
            .collect())
    }
}
