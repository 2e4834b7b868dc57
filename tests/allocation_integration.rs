//! Allocation integration tests
//!
//! Runs the allocator against an in-memory store seeded with resources and
//! running campaigns.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use common::*;
use slotbook::allocation::{plan_assignments, AllocationRequest};
use slotbook::health::{HealthConfig, HealthMonitor, ProbeOutcome};
use slotbook::models::{Genre, HealthStatus, Resource, EMPTY_RESOURCE_ID};
use slotbook::storage::{MemoryStore, ResourceRepository};

/// Test that genre matches are taken in catalog order
#[tokio::test]
async fn test_genre_tier_in_catalog_order() {
    let store = Arc::new(MemoryStore::with_resources(vec![
        healthy("r3", "Charlie", Genre::Rock, 10),
        healthy("r1", "Alpha", Genre::Rock, 10),
        healthy("r2", "Bravo", Genre::Rock, 10),
        healthy("g1", "Aardvark", Genre::General, 10),
    ]));

    let request = AllocationRequest::new(Genre::Rock, 2);
    let assignments = allocator(&store).allocate(&request, t0()).await.unwrap();

    assert_eq!(ids(&assignments), vec!["r1", "r2"]);
    assert!(assignments.iter().all(|a| a.genre == Genre::Rock));
}

/// Test that an empty genre pool falls back to General
#[tokio::test]
async fn test_general_fallback() {
    let store = Arc::new(MemoryStore::with_resources(vec![
        healthy("g5", "Echo", Genre::General, 10),
        healthy("g2", "Bravo", Genre::General, 10),
        healthy("g1", "Alpha", Genre::General, 10),
        healthy("g4", "Delta", Genre::General, 10),
        healthy("g3", "Charlie", Genre::General, 10),
    ]));

    let request = AllocationRequest::new(Genre::Jazz, 2);
    let assignments = allocator(&store).allocate(&request, t0()).await.unwrap();

    assert_eq!(ids(&assignments), vec!["g1", "g2"]);
}

/// Test that shortfalls are padded with placeholders
#[tokio::test]
async fn test_shortfall_padded_with_empty() {
    let store = Arc::new(MemoryStore::with_resources(vec![healthy(
        "p1",
        "Pop Hits",
        Genre::Pop,
        10,
    )]));

    let request = AllocationRequest::new(Genre::Pop, 2);
    let assignments = allocator(&store).allocate(&request, t0()).await.unwrap();

    assert_eq!(assignments.len(), 2);
    assert_eq!(assignments[0].resource_id, "p1");
    assert!(assignments[1].is_empty());
    assert_eq!(assignments[1].resource_id, EMPTY_RESOURCE_ID);
}

/// Test that a playlist already holding the track is skipped
#[tokio::test]
async fn test_duplicate_track_excluded() {
    let r7 = healthy("r7", "Alpha", Genre::Rock, 10);
    let r8 = healthy("r8", "Bravo", Genre::Rock, 10);
    let store = Arc::new(MemoryStore::with_resources(vec![r7.clone(), r8.clone()]));
    seed_campaign(&store, &running_campaign("campaign-a", 1, &[&r7]));

    let request = AllocationRequest::new(Genre::Rock, 2)
        .for_track(Some(track(1)))
        .excluding("campaign-b");
    let assignments = allocator(&store).allocate(&request, t0()).await.unwrap();

    assert_eq!(ids(&assignments), vec!["r8", EMPTY_RESOURCE_ID]);
}

/// Test that a different track may share the playlist
#[tokio::test]
async fn test_other_track_not_excluded() {
    let r7 = healthy("r7", "Alpha", Genre::Rock, 10);
    let store = Arc::new(MemoryStore::with_resources(vec![r7.clone()]));
    seed_campaign(&store, &running_campaign("campaign-a", 1, &[&r7]));

    let request = AllocationRequest::new(Genre::Rock, 1).for_track(Some(track(2)));
    let assignments = allocator(&store).allocate(&request, t0()).await.unwrap();

    assert_eq!(ids(&assignments), vec!["r7"]);
}

/// Test that a campaign does not exclude itself
#[tokio::test]
async fn test_own_campaign_not_excluded() {
    let r7 = healthy("r7", "Alpha", Genre::Rock, 10);
    let store = Arc::new(MemoryStore::with_resources(vec![r7.clone()]));
    seed_campaign(&store, &running_campaign("campaign-a", 1, &[&r7]));

    let request = AllocationRequest::new(Genre::Rock, 1)
        .for_track(Some(track(1)))
        .excluding("campaign-a");
    let assignments = allocator(&store).allocate(&request, t0()).await.unwrap();

    assert_eq!(ids(&assignments), vec!["r7"]);
}

/// Test that full playlists are skipped using live occupancy
#[tokio::test]
async fn test_live_occupancy_respects_capacity() {
    let tight = healthy("r1", "Alpha", Genre::Rock, 1);
    let roomy = healthy("r2", "Bravo", Genre::Rock, 5);
    let store = Arc::new(MemoryStore::with_resources(vec![tight.clone(), roomy.clone()]));
    seed_campaign(&store, &running_campaign("other", 9, &[&tight]));

    let request = AllocationRequest::new(Genre::Rock, 2).for_track(Some(track(1)));
    let assignments = allocator(&store).allocate(&request, t0()).await.unwrap();

    assert_eq!(ids(&assignments), vec!["r2", EMPTY_RESOURCE_ID]);
}

/// Test that cached utilization also counts toward capacity
#[tokio::test]
async fn test_cached_utilization_respects_capacity() {
    let store = Arc::new(MemoryStore::with_resources(vec![
        healthy("r1", "Alpha", Genre::Rock, 3).with_utilization(3),
        healthy("r2", "Bravo", Genre::Rock, 3).with_utilization(2),
    ]));

    let request = AllocationRequest::new(Genre::Rock, 1);
    let assignments = allocator(&store).allocate(&request, t0()).await.unwrap();

    assert_eq!(ids(&assignments), vec!["r2"]);
}

/// Test that unhealthy and inactive playlists never receive slots
#[tokio::test]
async fn test_unhealthy_and_inactive_skipped() {
    let mut inactive = healthy("r1", "Alpha", Genre::Rock, 10);
    inactive.is_active = false;
    let store = Arc::new(MemoryStore::with_resources(vec![
        inactive,
        healthy("r2", "Bravo", Genre::Rock, 10).with_health(HealthStatus::Private, t0()),
        healthy("r3", "Charlie", Genre::Rock, 10).with_health(HealthStatus::Removed, t0()),
        healthy("r4", "Delta", Genre::Rock, 10).with_health(HealthStatus::Error, t0()),
        healthy("r5", "Echo", Genre::Rock, 10).with_health(HealthStatus::Active, t0()),
    ]));

    let request = AllocationRequest::new(Genre::Rock, 3);
    let assignments = allocator(&store).allocate(&request, t0()).await.unwrap();

    assert_eq!(ids(&assignments), vec!["r5", EMPTY_RESOURCE_ID, EMPTY_RESOURCE_ID]);
}

/// Test that zero slots yields no assignments
#[tokio::test]
async fn test_zero_slots() {
    let store = Arc::new(MemoryStore::with_resources(vec![healthy(
        "r1",
        "Alpha",
        Genre::Rock,
        10,
    )]));

    let request = AllocationRequest::new(Genre::Rock, 0);
    let assignments = allocator(&store).allocate(&request, t0()).await.unwrap();

    assert!(assignments.is_empty());
}

/// Test that the same inputs always give the same plan
#[tokio::test]
async fn test_allocation_is_deterministic() {
    let store = Arc::new(MemoryStore::with_resources(vec![
        healthy("r2", "Same Name", Genre::Rock, 10),
        healthy("r1", "Same Name", Genre::Rock, 10),
        healthy("g1", "General", Genre::General, 10),
    ]));
    let allocator = allocator(&store);

    let request = AllocationRequest::new(Genre::Rock, 3);
    let first = allocator.allocate(&request, t0()).await.unwrap();
    let second = allocator.allocate(&request, t0()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(ids(&first), vec!["r1", "r2", "g1"]);
}

/// Test that never-probed resources are refreshed before selection
#[tokio::test]
async fn test_allocation_refreshes_stale_health() {
    let fresh = Resource::new("r1", "Alpha", "spotify:playlist:0000000000000000000001", Genre::Rock, 10);
    let gone = Resource::new("r2", "Bravo", "spotify:playlist:0000000000000000000002", Genre::Rock, 10);
    let store = Arc::new(MemoryStore::with_resources(vec![fresh.clone(), gone.clone()]));

    let prober = Arc::new(TableProber::new([
        (fresh.reference.clone(), ProbeOutcome::public(4)),
        (gone.reference.clone(), ProbeOutcome::unreachable()),
    ]));
    let config = HealthConfig {
        probe_delay: std::time::Duration::ZERO,
        ..HealthConfig::default()
    };
    let monitor = Arc::new(HealthMonitor::new(store.clone(), prober.clone(), config));

    let request = AllocationRequest::new(Genre::Rock, 2);
    let assignments = allocator_with(&store, monitor)
        .allocate(&request, t0())
        .await
        .unwrap();

    assert_eq!(prober.call_count(), 2);
    assert_eq!(ids(&assignments), vec!["r1", EMPTY_RESOURCE_ID]);

    let refreshed = store.get_resource("r1").unwrap().unwrap();
    assert_eq!(refreshed.health_status, HealthStatus::Public);
    assert_eq!(refreshed.utilization, 4);
    let removed = store.get_resource("r2").unwrap().unwrap();
    assert_eq!(removed.health_status, HealthStatus::Removed);
}

// ============================================================================
// Property tests
// ============================================================================

fn arb_resource() -> impl Strategy<Value = Resource> {
    (
        0u32..40,
        prop::sample::select(vec![Genre::Rock, Genre::Pop, Genre::General]),
        0u32..4,
        0u32..4,
        prop::sample::select(vec![
            HealthStatus::Public,
            HealthStatus::Active,
            HealthStatus::Private,
            HealthStatus::Unknown,
        ]),
    )
        .prop_map(|(n, genre, capacity, utilization, status)| {
            healthy(&format!("r{n}"), &format!("Playlist {}", n % 7), genre, capacity)
                .with_utilization(utilization)
                .with_health(status, t0())
        })
}

proptest! {
    #[test]
    fn prop_allocation_constraints(
        resources in prop::collection::vec(arb_resource(), 0..25),
        held in prop::collection::vec(0u32..40, 0..6),
        slots in 0u32..8,
        genre in prop::sample::select(vec![Genre::Rock, Genre::Pop, Genre::Jazz, Genre::General]),
    ) {
        let store = Arc::new(MemoryStore::with_resources(resources));
        let active = store.list_active().unwrap();
        let held_resources: Vec<&Resource> = active
            .iter()
            .filter(|r| held.iter().any(|n| r.id == format!("r{n}")))
            .collect();
        if !held_resources.is_empty() {
            seed_campaign(&store, &running_campaign("holder", 1, &held_resources));
        }
        let held_ids: HashSet<&str> = held_resources.iter().map(|r| r.id.as_str()).collect();

        let allocator = allocator(&store);
        let request = AllocationRequest::new(genre, slots)
            .for_track(Some(track(1)))
            .excluding("requester");

        let first = tokio_test::block_on(allocator.allocate(&request, t0())).unwrap();
        let second = tokio_test::block_on(allocator.allocate(&request, t0())).unwrap();

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.len(), slots as usize);

        let real: Vec<&str> = first
            .iter()
            .filter(|a| !a.is_empty())
            .map(|a| a.resource_id.as_str())
            .collect();
        let unique: HashSet<&str> = real.iter().copied().collect();
        prop_assert_eq!(unique.len(), real.len());

        for id in &real {
            prop_assert!(!held_ids.contains(id));
            let resource = active.iter().find(|r| r.id == *id).unwrap();
            prop_assert!(resource.is_assignable());
            prop_assert!(resource.genre == genre || resource.genre == Genre::General);
        }

        // Placeholders only after every real resource
        let first_empty = first.iter().position(|a| a.is_empty()).unwrap_or(first.len());
        prop_assert!(first[first_empty..].iter().all(|a| a.is_empty()));
    }

    #[test]
    fn prop_plan_never_exceeds_request(
        resources in prop::collection::vec(arb_resource(), 0..25),
        slots in 0u32..10,
    ) {
        let preferred: Vec<Resource> = resources.iter().filter(|r| r.genre == Genre::Rock).cloned().collect();
        let general: Vec<Resource> = resources.iter().filter(|r| r.genre == Genre::General).cloned().collect();

        let plan = plan_assignments(slots, &preferred, &general, &HashSet::new());

        prop_assert_eq!(plan.assignments.len(), slots as usize);
        prop_assert_eq!(plan.genre_slots + plan.general_slots + plan.empty_slots, slots as usize);
    }
}
