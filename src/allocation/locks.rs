//! Per-track allocation locks

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::models::TrackIdentity;

/// Serializes allocation for campaigns that share a track
///
/// Holding the guard across read, allocate and save makes the duplicate
/// check and the write atomic with respect to other campaigns for the same
/// track. Different tracks never wait on each other.
#[derive(Debug, Default)]
pub struct TrackLocks {
    locks: Mutex<HashMap<TrackIdentity, Arc<AsyncMutex<()>>>>,
}

impl TrackLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `track`
    pub async fn lock(&self, track: &TrackIdentity) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Drop entries nobody holds or waits on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(track.clone()).or_default())
        };

        lock.lock_owned().await
    }

    /// Number of tracks with a live lock entry
    pub fn tracked(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}
