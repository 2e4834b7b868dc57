//! Resource health monitoring
//!
//! Probes playlists through an external [`ResourceProber`] and writes the
//! classified result back to the resource store. A refresh only touches
//! resources whose last probe is missing or older than `max_age`, at most
//! `batch_size` of them, so it is cheap enough to run in front of every
//! allocation.
//!
//! Probe failures never escape a refresh: a failed or timed out probe is
//! recorded as [`HealthStatus::Error`] and the batch carries on. Store
//! failures do escape, since allocating on top of an unreadable catalog
//! would silently use stale data.
//!
//! # Example
//!
//! ```rust,ignore
//! use slotbook::health::{HealthConfig, HealthMonitor, HttpProber};
//!
//! let prober = Arc::new(HttpProber::new(&config.prober)?);
//! let monitor = HealthMonitor::new(store.clone(), prober, HealthConfig::default());
//! let report = monitor.refresh_stale(Utc::now()).await?;
//! println!("probed {} resources, {} failed", report.probed, report.failed);
//! ```

pub mod error;
mod prober;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metrics;
use crate::models::{HealthStatus, Resource};
use crate::storage::SharedResourceRepository;
use crate::utils::truncate_text;

pub use error::ProbeError;
pub use prober::HttpProber;

/// Longest error message stored on a resource row
const MAX_ERROR_MESSAGE_CHARS: usize = 500;

// ============================================================================
// Ports
// ============================================================================

/// What an external lookup reported about one playlist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub is_reachable: bool,
    pub is_public: bool,
    pub occupancy_count: Option<u32>,
    pub error_message: Option<String>,
}

impl ProbeOutcome {
    pub fn public(occupancy_count: u32) -> Self {
        Self {
            is_reachable: true,
            is_public: true,
            occupancy_count: Some(occupancy_count),
            error_message: None,
        }
    }

    pub fn private() -> Self {
        Self {
            is_reachable: true,
            is_public: false,
            occupancy_count: None,
            error_message: None,
        }
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    /// Map the outcome onto a stored health status
    pub fn classify(&self) -> HealthStatus {
        match (self.is_reachable, self.is_public) {
            (false, _) => HealthStatus::Removed,
            (true, true) => HealthStatus::Public,
            (true, false) => HealthStatus::Private,
        }
    }
}

/// External reachability lookup for a playlist reference
#[async_trait]
pub trait ResourceProber: Send + Sync {
    async fn probe(&self, reference: &str) -> std::result::Result<ProbeOutcome, ProbeError>;
}

/// Health refresh step run in front of every allocation
#[async_trait]
pub trait HealthRefresh: Send + Sync {
    async fn refresh_stale(&self, now: DateTime<Utc>) -> Result<RefreshReport>;
}

/// Refresh port that does nothing
///
/// Used when health is kept current by [`HealthMonitor::spawn_refresher`]
/// instead of inline before each allocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeferredRefresh;

#[async_trait]
impl HealthRefresh for DeferredRefresh {
    async fn refresh_stale(&self, _now: DateTime<Utc>) -> Result<RefreshReport> {
        Ok(RefreshReport::default())
    }
}

// ============================================================================
// Health Monitor
// ============================================================================

/// Health monitor configuration
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Probe results older than this are refreshed
    pub max_age: Duration,

    /// Maximum probes per refresh
    pub batch_size: usize,

    /// Minimum spacing between probe starts
    pub probe_delay: Duration,

    /// Per-probe timeout
    pub probe_timeout: Duration,

    /// Maximum probes in flight
    pub concurrency: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(3600),
            batch_size: 20,
            probe_delay: Duration::from_millis(250),
            probe_timeout: Duration::from_secs(8),
            concurrency: 5,
        }
    }
}

/// Summary of one refresh pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    /// Stale resources found, before the batch cap
    pub stale: usize,
    /// Resources probed in this pass
    pub probed: usize,
    /// Probed resources now assignable
    pub healthy: usize,
    /// Probes that errored or timed out
    pub failed: usize,
}

type ProbeLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Probes stale resources and records their health
pub struct HealthMonitor {
    resources: SharedResourceRepository,
    prober: Arc<dyn ResourceProber>,
    config: HealthConfig,
    limiter: Option<ProbeLimiter>,
}

impl HealthMonitor {
    pub fn new(
        resources: SharedResourceRepository,
        prober: Arc<dyn ResourceProber>,
        config: HealthConfig,
    ) -> Self {
        // A zero delay disables spacing entirely
        let limiter = Quota::with_period(config.probe_delay)
            .map(|quota| RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN)));

        Self {
            resources,
            prober,
            config,
            limiter,
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Resources due for a probe, never-checked first, then oldest
    ///
    /// Operator-verified (`Active`) resources are never selected.
    pub fn select_stale(&self, now: DateTime<Utc>) -> Result<Vec<Resource>> {
        let max_age = chrono::Duration::from_std(self.config.max_age)
            .unwrap_or_else(|_| chrono::Duration::MAX);

        let mut stale: Vec<Resource> = self
            .resources
            .list_active()?
            .into_iter()
            .filter(|r| r.health_status != HealthStatus::Active)
            .filter(|r| r.is_stale(now, max_age))
            .collect();

        stale.sort_by(|a, b| {
            a.health_checked_at
                .cmp(&b.health_checked_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(stale)
    }

    /// Probe up to `batch_size` stale resources and write results back
    pub async fn refresh(&self, now: DateTime<Utc>) -> Result<RefreshReport> {
        let stale = self.select_stale(now)?;
        let total_stale = stale.len();
        let batch: Vec<Resource> = stale.into_iter().take(self.config.batch_size).collect();

        if batch.is_empty() {
            tracing::debug!("No stale resources to probe");
            return Ok(RefreshReport::default());
        }

        tracing::info!(
            stale = total_stale,
            batch = batch.len(),
            "Refreshing resource health"
        );

        let results = stream::iter(batch)
            .map(|resource| async move { self.probe_one(&resource, now).await })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        let mut report = RefreshReport {
            stale: total_stale,
            ..Default::default()
        };

        for result in results {
            let status = result?;
            report.probed += 1;
            if status.is_assignable() {
                report.healthy += 1;
            }
            if status == HealthStatus::Error {
                report.failed += 1;
            }
        }

        metrics::record_refresh_run();
        tracing::info!(
            probed = report.probed,
            healthy = report.healthy,
            failed = report.failed,
            "Health refresh complete"
        );

        Ok(report)
    }

    async fn probe_one(&self, resource: &Resource, now: DateTime<Utc>) -> Result<HealthStatus> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let started = Instant::now();
        let result =
            tokio::time::timeout(self.config.probe_timeout, self.prober.probe(&resource.reference))
                .await;

        let (status, error_message, occupancy) = match result {
            Ok(Ok(outcome)) => (outcome.classify(), outcome.error_message, outcome.occupancy_count),
            Ok(Err(e)) => {
                tracing::warn!(resource = %resource.id, error = %e, "Probe failed");
                (HealthStatus::Error, Some(e.to_string()), None)
            }
            Err(_) => {
                let e = ProbeError::Timeout {
                    seconds: self.config.probe_timeout.as_secs(),
                };
                tracing::warn!(resource = %resource.id, "Probe timed out");
                (HealthStatus::Error, Some(e.to_string()), None)
            }
        };

        metrics::record_probe(status.as_str(), started.elapsed().as_secs_f64());

        let error_message = error_message.map(|m| truncate_text(&m, MAX_ERROR_MESSAGE_CHARS));
        self.resources
            .update_health(&resource.id, status, now, error_message.as_deref())?;

        if let Some(count) = occupancy {
            self.resources.update_utilization(&resource.id, count)?;
        }

        tracing::debug!(
            resource = %resource.id,
            previous = %resource.health_status,
            status = %status,
            "Probed resource"
        );

        Ok(status)
    }

    /// Run [`HealthMonitor::refresh`] on a fixed interval
    ///
    /// Errors are logged and the loop keeps going.
    pub fn spawn_refresher(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if let Err(e) = self.refresh(Utc::now()).await {
                    tracing::error!(error = %e, "Background health refresh failed");
                }
            }
        })
    }
}

#[async_trait]
impl HealthRefresh for HealthMonitor {
    async fn refresh_stale(&self, now: DateTime<Utc>) -> Result<RefreshReport> {
        self.refresh(now).await
    }
}
