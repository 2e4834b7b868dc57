//! Stream progress simulation
//!
//! Every real assignment accrues a fixed number of streams per day from the
//! moment slots were confirmed. Progress is recomputed from the campaign's
//! current assignments on every call, so the projected removal date follows
//! assignment changes and is never stored.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Campaign;

/// Streams one resource delivers per day
pub const STREAMS_PER_RESOURCE_PER_DAY: u64 = 500;

const SECONDS_PER_DAY: u64 = 86_400;

/// Simulated progress of a campaign at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub streams_accrued: u64,
    /// Calendar date the target is reached, if it can be reached at all
    pub removal_date: Option<NaiveDate>,
}

impl Progress {
    pub const NONE: Self = Self {
        streams_accrued: 0,
        removal_date: None,
    };
}

/// Compute streams accrued at `now` and the projected removal date
///
/// Nothing accrues before slots are confirmed or when no real resource is
/// assigned. Accrual is capped at the campaign's target volume.
pub fn compute_progress(campaign: &Campaign, now: DateTime<Utc>) -> Progress {
    let started_at = match campaign.slots_started_at {
        Some(started) if campaign.slots_confirmed => started,
        _ => return Progress::NONE,
    };

    let filled = campaign.filled_slots() as u64;
    if filled == 0 {
        return Progress::NONE;
    }

    let daily_rate = filled * STREAMS_PER_RESOURCE_PER_DAY;
    let elapsed_secs = (now - started_at).num_seconds().max(0) as u64;

    // floor(hours * n * 500 / 24) in whole seconds
    let accrued = (u128::from(elapsed_secs) * u128::from(daily_rate)
        / u128::from(SECONDS_PER_DAY))
    .min(u128::from(campaign.target_volume)) as u64;

    let days_needed = campaign.target_volume.div_ceil(daily_rate);
    let removal_date = started_at.date_naive().checked_add_days(Days::new(days_needed));

    Progress {
        streams_accrued: accrued,
        removal_date,
    }
}
