//! Campaign lifecycle
//!
//! Status is never stored. It is derived on every read from the
//! confirmation flags, the simulated progress and the teardown timestamp:
//!
//! ```text
//! ActionNeeded ──both confirmed──▶ Running ──target reached──▶ RemovalNeeded ──teardown──▶ Completed
//!      ▲                              │                              │
//!      └──────── a flag is false ─────┴──────────────────────────────┘
//! ```
//!
//! `Completed` is terminal: once `removed_at` is set nothing else is
//! consulted.

pub mod error;
mod service;

use chrono::{DateTime, Utc};

use crate::models::{Campaign, CampaignStatus};
use crate::progress::compute_progress;

pub use error::CampaignError;
pub use service::{CampaignOverview, CampaignService, NewCampaign};

/// Derive the status of `campaign` at `now`
pub fn derive_status(campaign: &Campaign, now: DateTime<Utc>) -> CampaignStatus {
    if campaign.removed_at.is_some() {
        return CampaignStatus::Completed;
    }

    if !campaign.direct_confirmed || !campaign.slots_confirmed {
        return CampaignStatus::ActionNeeded;
    }

    if compute_progress(campaign, now).streams_accrued >= campaign.target_volume {
        CampaignStatus::RemovalNeeded
    } else {
        CampaignStatus::Running
    }
}
