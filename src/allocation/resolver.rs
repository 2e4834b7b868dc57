//! Duplicate protection and live occupancy
//!
//! Both views are derived by scanning campaigns whose status is `Running`;
//! resources carry no back-pointer to the campaigns occupying them.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::catalog::Occupancy;
use crate::error::Result;
use crate::models::TrackIdentity;
use crate::storage::SharedCampaignRepository;

/// Finds resources a track already occupies
#[derive(Clone)]
pub struct DuplicateResolver {
    campaigns: SharedCampaignRepository,
}

impl DuplicateResolver {
    pub fn new(campaigns: SharedCampaignRepository) -> Self {
        Self { campaigns }
    }

    /// Resource ids held by Running campaigns for `track`
    ///
    /// `exclude_campaign_id` leaves one campaign out, so a campaign being
    /// re-resolved does not block its own resources. Without a track
    /// identity there is nothing to match on and the set is empty.
    pub fn excluded_resource_ids(
        &self,
        track: Option<&TrackIdentity>,
        exclude_campaign_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<HashSet<String>> {
        let Some(track) = track else {
            return Ok(HashSet::new());
        };

        let excluded: HashSet<String> = self
            .campaigns
            .list_running_by_track(track, exclude_campaign_id, now)?
            .iter()
            .flat_map(|c| c.resource_ids().map(String::from).collect::<Vec<_>>())
            .collect();

        if !excluded.is_empty() {
            tracing::debug!(
                track = %track,
                excluded = excluded.len(),
                "Track already occupies resources"
            );
        }

        Ok(excluded)
    }

    /// Number of Running campaigns occupying each resource
    pub fn live_occupancy(
        &self,
        exclude_campaign_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Occupancy> {
        let mut occupancy = Occupancy::new();

        for campaign in self.campaigns.list_running(now)? {
            if Some(campaign.id.as_str()) == exclude_campaign_id {
                continue;
            }
            let distinct: HashSet<&str> = campaign.resource_ids().collect();
            for id in distinct {
                *occupancy.entry(id.to_string()).or_insert(0) += 1;
            }
        }

        Ok(occupancy)
    }
}
