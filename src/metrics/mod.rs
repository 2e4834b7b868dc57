//! Prometheus metrics for allocation and health probing
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization never happens or fails, every recording function is a
//! no-op, so library users that don't care about metrics pay nothing.

use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, Encoder,
    HistogramVec, IntCounter, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

struct EngineMetrics {
    allocations: CounterVec,
    slots: CounterVec,
    exclusions: IntCounter,
    probes: CounterVec,
    probe_duration: HistogramVec,
    refresh_runs: IntCounter,
}

static ENGINE_METRICS: OnceLock<EngineMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Safe to call more than once; only the first call registers anything.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = EngineMetrics {
        allocations: register_counter_vec!(
            "slotbook_allocations_total",
            "Allocation runs by outcome (full, partial, none)",
            &["outcome"]
        )?,
        slots: register_counter_vec!(
            "slotbook_allocated_slots_total",
            "Allocated slots by source tier (genre, general, empty)",
            &["tier"]
        )?,
        exclusions: register_int_counter!(
            "slotbook_duplicate_exclusions_total",
            "Resources skipped because the same track already runs on them"
        )?,
        probes: register_counter_vec!(
            "slotbook_probes_total",
            "Resource probes by resulting health status",
            &["status"]
        )?,
        probe_duration: register_histogram_vec!(
            "slotbook_probe_duration_seconds",
            "Time spent probing a single resource",
            &["status"],
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
        )?,
        refresh_runs: register_int_counter!(
            "slotbook_health_refresh_runs_total",
            "Health refresh invocations"
        )?,
    };

    ENGINE_METRICS
        .set(metrics)
        .map_err(|_| "Engine metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    ENGINE_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record the tier breakdown of one allocation run
pub fn record_allocation(genre_slots: usize, general_slots: usize, empty_slots: usize) {
    let Some(m) = ENGINE_METRICS.get() else {
        return;
    };

    let outcome = match (genre_slots + general_slots, empty_slots) {
        (0, 0) => return,
        (_, 0) => "full",
        (0, _) => "none",
        _ => "partial",
    };
    m.allocations.with_label_values(&[outcome]).inc();

    for (tier, count) in [
        ("genre", genre_slots),
        ("general", general_slots),
        ("empty", empty_slots),
    ] {
        if count > 0 {
            m.slots.with_label_values(&[tier]).inc_by(count as f64);
        }
    }
}

/// Record resources removed from consideration by duplicate protection
pub fn record_exclusions(count: usize) {
    if let Some(m) = ENGINE_METRICS.get() {
        m.exclusions.inc_by(count as u64);
    }
}

/// Record a finished probe
pub fn record_probe(status: &str, duration_secs: f64) {
    let Some(m) = ENGINE_METRICS.get() else {
        return;
    };
    m.probes.with_label_values(&[status]).inc();
    m.probe_duration
        .with_label_values(&[status])
        .observe(duration_secs);
}

/// Record a health refresh invocation
pub fn record_refresh_run() {
    if let Some(m) = ENGINE_METRICS.get() {
        m.refresh_runs.inc();
    }
}
