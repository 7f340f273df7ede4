//! Prometheus metrics for the migration core.
//!
//! Collectors are process-wide statics; a binary registers them through
//! [`all_metrics`] and decides how to expose them.

use once_cell::sync::Lazy;
use prometheus::core::Collector;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

/// Batches started, by target environment.
pub static BATCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("migrator_batches_total", "Total migration batches started"),
        &["direction"],
    )
    .unwrap()
});

/// Tool invocations by target environment and terminal status.
pub static INVOCATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "migrator_invocations_total",
            "Total migration tool invocations",
        ),
        &["direction", "status"], // "succeeded", "failed", "timed_out"
    )
    .unwrap()
});

/// Tool invocation duration in seconds.
pub static INVOCATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "migrator_invocation_duration_seconds",
            "Duration of a single migration tool run",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]),
        &["direction"],
    )
    .unwrap()
});

/// Tool processes currently running.
pub static INVOCATIONS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "migrator_invocations_in_flight",
        "Number of migration tool processes currently running",
    )
    .unwrap()
});

/// Successful runs whose output had no recognizable country code.
pub static COUNTRY_CODE_MISSING: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "migrator_country_code_missing_total",
        "Successful migrations without a parsable country code",
    )
    .unwrap()
});

/// Keeps [`INVOCATIONS_IN_FLIGHT`] raised while alive.
pub(crate) struct InFlightGuard;

impl InFlightGuard {
    pub(crate) fn new() -> Self {
        INVOCATIONS_IN_FLIGHT.inc();
        Self
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        INVOCATIONS_IN_FLIGHT.dec();
    }
}

/// All core collectors, for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(BATCHES_TOTAL.clone()),
        Box::new(INVOCATIONS_TOTAL.clone()),
        Box::new(INVOCATION_DURATION.clone()),
        Box::new(INVOCATIONS_IN_FLIGHT.clone()),
        Box::new(COUNTRY_CODE_MISSING.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        INVOCATIONS_TOTAL
            .with_label_values(&["beta", "succeeded"])
            .inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"migrator_invocations_total".to_string()));
    }
}
