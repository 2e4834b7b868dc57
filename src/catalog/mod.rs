//! Resource catalog
//!
//! Read-only view over the resource store that answers "which playlists
//! could take one more campaign of this genre right now". Results are
//! sorted by name (then id) so identical store contents always produce
//! identical allocations.

use std::collections::HashMap;

use crate::error::Result;
use crate::models::{Genre, Resource};
use crate::storage::SharedResourceRepository;

/// Live occupant count per resource id
pub type Occupancy = HashMap<String, u32>;

/// Catalog of playlist resources
#[derive(Clone)]
pub struct ResourceCatalog {
    resources: SharedResourceRepository,
}

impl ResourceCatalog {
    pub fn new(resources: SharedResourceRepository) -> Self {
        Self { resources }
    }

    /// All active resources in catalog order
    pub fn list_active(&self) -> Result<Vec<Resource>> {
        let mut resources = self.resources.list_active()?;
        sort_catalog_order(&mut resources);
        Ok(resources)
    }

    /// Assignable resources of `genre`, judged on cached utilization only
    pub fn list_assignable(&self, genre: Genre) -> Result<Vec<Resource>> {
        self.list_assignable_with(genre, &Occupancy::new())
    }

    /// Assignable resources of `genre`
    ///
    /// A resource counts as full when either its cached utilization or its
    /// entry in `occupancy` has reached capacity.
    pub fn list_assignable_with(&self, genre: Genre, occupancy: &Occupancy) -> Result<Vec<Resource>> {
        let resources = self
            .list_active()?
            .into_iter()
            .filter(|r| r.genre == genre)
            .filter(|r| r.is_assignable_with(occupancy.get(&r.id).copied().unwrap_or(0)))
            .collect::<Vec<_>>();

        tracing::trace!(
            genre = %genre,
            assignable = resources.len(),
            "Listed assignable resources"
        );

        Ok(resources)
    }
}

fn sort_catalog_order(resources: &mut [Resource]) {
    resources.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}
