// Core data structures for the slotbook engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource id used by placeholder assignments
pub const EMPTY_RESOURCE_ID: &str = "empty";

// ============================================================================
// Genre
// ============================================================================

/// Genre classification shared by resources and campaigns
///
/// `General` is the universal fallback bucket. Every string coming from
/// outside the engine goes through [`Genre::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Genre {
    Pop,
    Rock,
    HipHop,
    RnB,
    Electronic,
    Dance,
    House,
    Techno,
    Jazz,
    Classical,
    Country,
    Latin,
    Metal,
    Indie,
    Alternative,
    Folk,
    Soul,
    Reggae,
    Blues,
    Ambient,
    LoFi,
    Afrobeats,
    KPop,
    General,
}

impl Genre {
    /// Get all genres, `General` last
    pub fn all() -> Vec<Self> {
        vec![
            Self::Pop,
            Self::Rock,
            Self::HipHop,
            Self::RnB,
            Self::Electronic,
            Self::Dance,
            Self::House,
            Self::Techno,
            Self::Jazz,
            Self::Classical,
            Self::Country,
            Self::Latin,
            Self::Metal,
            Self::Indie,
            Self::Alternative,
            Self::Folk,
            Self::Soul,
            Self::Reggae,
            Self::Blues,
            Self::Ambient,
            Self::LoFi,
            Self::Afrobeats,
            Self::KPop,
            Self::General,
        ]
    }

    /// Canonical display label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pop => "Pop",
            Self::Rock => "Rock",
            Self::HipHop => "Hip-Hop",
            Self::RnB => "R&B",
            Self::Electronic => "Electronic",
            Self::Dance => "Dance",
            Self::House => "House",
            Self::Techno => "Techno",
            Self::Jazz => "Jazz",
            Self::Classical => "Classical",
            Self::Country => "Country",
            Self::Latin => "Latin",
            Self::Metal => "Metal",
            Self::Indie => "Indie",
            Self::Alternative => "Alternative",
            Self::Folk => "Folk",
            Self::Soul => "Soul",
            Self::Reggae => "Reggae",
            Self::Blues => "Blues",
            Self::Ambient => "Ambient",
            Self::LoFi => "Lo-Fi",
            Self::Afrobeats => "Afrobeats",
            Self::KPop => "K-Pop",
            Self::General => "General",
        }
    }

    /// Resolve a free-form genre label
    ///
    /// Matching ignores case, whitespace, `-`, `_` and `/`. Unmapped labels
    /// resolve to `General`.
    pub fn parse(s: &str) -> Self {
        let key: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '_' | '/'))
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "pop" => Self::Pop,
            "rock" | "classicrock" | "hardrock" => Self::Rock,
            "hiphop" | "rap" | "trap" => Self::HipHop,
            "rnb" | "r&b" | "randb" | "rhythmandblues" => Self::RnB,
            "electronic" | "edm" | "electronica" => Self::Electronic,
            "dance" => Self::Dance,
            "house" | "deephouse" => Self::House,
            "techno" => Self::Techno,
            "jazz" => Self::Jazz,
            "classical" => Self::Classical,
            "country" => Self::Country,
            "latin" | "reggaeton" => Self::Latin,
            "metal" | "heavymetal" => Self::Metal,
            "indie" | "indiepop" | "indierock" => Self::Indie,
            "alternative" | "alt" => Self::Alternative,
            "folk" | "acoustic" => Self::Folk,
            "soul" => Self::Soul,
            "reggae" => Self::Reggae,
            "blues" => Self::Blues,
            "ambient" | "chill" => Self::Ambient,
            "lofi" => Self::LoFi,
            "afrobeats" | "afrobeat" => Self::Afrobeats,
            "kpop" => Self::KPop,
            _ => Self::General,
        }
    }

    /// Whether this is the fallback bucket
    pub fn is_general(&self) -> bool {
        matches!(self, Self::General)
    }
}

impl Default for Genre {
    fn default() -> Self {
        Self::General
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Genre {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<Genre> for String {
    fn from(genre: Genre) -> Self {
        genre.as_str().to_string()
    }
}

// ============================================================================
// Track Identity
// ============================================================================

/// Normalized identifier of the underlying track a campaign promotes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackIdentity(String);

impl TrackIdentity {
    /// Wrap a normalized identifier, rejecting blank input
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Resource
// ============================================================================

/// Result of the last external reachability probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Manually verified by an operator
    Active,
    /// Reachable and publicly visible
    Public,
    /// Reachable but hidden from listeners
    Private,
    /// No longer exists upstream
    Removed,
    /// Probe failed or timed out
    Error,
    /// Never probed
    Unknown,
}

impl HealthStatus {
    /// Whether a resource in this state may receive new occupants
    pub fn is_assignable(&self) -> bool {
        matches!(self, Self::Active | Self::Public)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Public => "public",
            Self::Private => "private",
            Self::Removed => "removed",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HealthStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "active" => Self::Active,
            "public" => Self::Public,
            "private" => Self::Private,
            "removed" => Self::Removed,
            "error" => Self::Error,
            _ => Self::Unknown,
        })
    }
}

/// A playlist that campaigns can occupy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    /// External playlist reference handed to the prober
    pub reference: String,
    pub genre: Genre,
    pub capacity: u32,
    /// Cached occupant count, refreshed by the health monitor
    pub utilization: u32,
    pub is_active: bool,
    pub health_status: HealthStatus,
    pub health_checked_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl Resource {
    /// Create an active, never-probed resource
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        reference: impl Into<String>,
        genre: Genre,
        capacity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            reference: reference.into(),
            genre,
            capacity,
            utilization: 0,
            is_active: true,
            health_status: HealthStatus::Unknown,
            health_checked_at: None,
            error_message: None,
        }
    }

    pub fn with_health(mut self, status: HealthStatus, checked_at: DateTime<Utc>) -> Self {
        self.health_status = status;
        self.health_checked_at = Some(checked_at);
        self
    }

    pub fn with_utilization(mut self, utilization: u32) -> Self {
        self.utilization = utilization;
        self
    }

    /// Healthy and below capacity, using the cached utilization
    pub fn is_assignable(&self) -> bool {
        self.is_assignable_with(0)
    }

    /// Healthy and below capacity given an externally observed occupancy
    ///
    /// The effective utilization is the larger of the cached value and
    /// `live_occupancy`.
    pub fn is_assignable_with(&self, live_occupancy: u32) -> bool {
        self.is_active
            && self.health_status.is_assignable()
            && self.utilization.max(live_occupancy) < self.capacity
    }

    /// Whether the last probe is missing or older than `max_age`
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        match self.health_checked_at {
            Some(checked) => now - checked > max_age,
            None => true,
        }
    }
}

// ============================================================================
// Assignment
// ============================================================================

/// One slot binding a campaign to a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub resource_id: String,
    pub name: String,
    pub genre: Genre,
}

impl Assignment {
    pub fn for_resource(resource: &Resource) -> Self {
        Self {
            resource_id: resource.id.clone(),
            name: resource.name.clone(),
            genre: resource.genre,
        }
    }

    /// Placeholder for a slot no resource could fill
    pub fn empty() -> Self {
        Self {
            resource_id: EMPTY_RESOURCE_ID.to_string(),
            name: EMPTY_RESOURCE_ID.to_string(),
            genre: Genre::General,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.resource_id == EMPTY_RESOURCE_ID
    }
}

// ============================================================================
// Campaign
// ============================================================================

/// Derived lifecycle state of a campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CampaignStatus {
    ActionNeeded,
    Running,
    RemovalNeeded,
    Completed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActionNeeded => "ActionNeeded",
            Self::Running => "Running",
            Self::RemovalNeeded => "RemovalNeeded",
            Self::Completed => "Completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A promotion campaign for one track
///
/// Status is not stored; see [`crate::campaign::derive_status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    /// External track reference as supplied with the order
    pub track_reference: String,
    pub track_identity: Option<TrackIdentity>,
    pub genre: Genre,
    pub package_tier: String,
    pub slots_needed: u32,
    pub assignments: Vec<Assignment>,
    pub direct_confirmed: bool,
    pub slots_confirmed: bool,
    pub slots_started_at: Option<DateTime<Utc>>,
    pub target_volume: u64,
    pub removed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Number of assignments bound to a real resource
    pub fn filled_slots(&self) -> usize {
        self.assignments.iter().filter(|a| !a.is_empty()).count()
    }

    /// Ids of every real resource this campaign occupies
    pub fn resource_ids(&self) -> impl Iterator<Item = &str> {
        self.assignments
            .iter()
            .filter(|a| !a.is_empty())
            .map(|a| a.resource_id.as_str())
    }

    pub fn is_assigned(&self) -> bool {
        !self.assignments.is_empty()
    }
}
