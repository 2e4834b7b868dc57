//! Package tier lookup

use std::collections::HashMap;

use crate::campaign::CampaignError;
use crate::error::Result;

/// Resolves how many playlist slots a package tier buys
pub trait PackageCatalog: Send + Sync {
    fn slots_needed_for(&self, tier: &str) -> Result<u32>;
}

/// Package catalog backed by a fixed tier table
///
/// Tier names are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct StaticPackageCatalog {
    tiers: HashMap<String, u32>,
}

impl StaticPackageCatalog {
    pub fn new<I, S>(tiers: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        Self {
            tiers: tiers
                .into_iter()
                .map(|(name, slots)| (normalize(name.as_ref()), slots))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

fn normalize(tier: &str) -> String {
    tier.trim().to_lowercase()
}

impl PackageCatalog for StaticPackageCatalog {
    fn slots_needed_for(&self, tier: &str) -> Result<u32> {
        self.tiers
            .get(&normalize(tier))
            .copied()
            .ok_or_else(|| CampaignError::unknown_package(tier).into())
    }
}
