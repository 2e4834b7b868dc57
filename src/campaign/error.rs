//! Error types for campaign lifecycle operations

use std::fmt;

use crate::models::CampaignStatus;

/// Campaign-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampaignError {
    /// No campaign with this id
    NotFound { id: String },

    /// Campaign id already taken
    AlreadyExists { id: String },

    /// Operation not allowed from the current status
    InvalidTransition {
        id: String,
        from: CampaignStatus,
        to: CampaignStatus,
    },

    /// Campaign is completed and can no longer change
    Terminal { id: String },

    /// Package tier is not in the package catalog
    UnknownPackage { tier: String },
}

impl fmt::Display for CampaignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "Campaign not found: {}", id),
            Self::AlreadyExists { id } => write!(f, "Campaign already exists: {}", id),
            Self::InvalidTransition { id, from, to } => {
                write!(f, "Campaign {} cannot move from {} to {}", id, from, to)
            }
            Self::Terminal { id } => write!(f, "Campaign {} is completed", id),
            Self::UnknownPackage { tier } => write!(f, "Unknown package tier: {}", tier),
        }
    }
}

impl std::error::Error for CampaignError {}

impl CampaignError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    pub fn invalid_transition(id: impl Into<String>, from: CampaignStatus, to: CampaignStatus) -> Self {
        Self::InvalidTransition {
            id: id.into(),
            from,
            to,
        }
    }

    pub fn terminal(id: impl Into<String>) -> Self {
        Self::Terminal { id: id.into() }
    }

    pub fn unknown_package(tier: impl Into<String>) -> Self {
        Self::UnknownPackage { tier: tier.into() }
    }

    /// Lifecycle errors reflect caller input, so none are retryable
    pub fn is_recoverable(&self) -> bool {
        false
    }
}
