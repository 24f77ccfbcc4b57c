//! Metrics collection and monitoring for the archive server
//!
//! Prometheus counters for the view pipeline, registered once in a
//! process-wide registry and served as text on `/metrics`.

use crate::core::Result;
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Histogram, IntCounter, IntGauge, Registry,
};
use std::time::Instant;

/// Global metrics registry
static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Counters for the enqueue side of the pipeline
pub struct EnqueueMetrics {
    /// Views appended to the queue table
    pub views_enqueued: IntCounter,
    /// Enqueue attempts that failed and were swallowed
    pub enqueue_failures: IntCounter,
}

/// Counters for the drain side of the pipeline
pub struct DrainMetrics {
    /// Completed drains, no-op drains included
    pub drains: IntCounter,
    /// Drains that returned an error
    pub drain_failures: IntCounter,
    /// Queue rows moved into the views table
    pub views_drained: IntCounter,
    /// Histogram of drain durations in seconds
    pub drain_duration: Histogram,
    /// Queue depth observed at the start of the last drain
    pub queue_pending: IntGauge,
}

/// Centralized metrics for all system components
pub struct Metrics {
    /// Enqueue metrics
    pub enqueue: EnqueueMetrics,
    /// Drain metrics
    pub drain: DrainMetrics,
}

impl Metrics {
    /// Create and register a metrics set in the given registry
    pub fn new(registry: &Registry) -> Result<Self> {
        Ok(Self {
            enqueue: EnqueueMetrics::new(registry)?,
            drain: DrainMetrics::new(registry)?,
        })
    }

    /// Get the global metrics instance
    pub fn global() -> &'static Metrics {
        static INSTANCE: Lazy<Metrics> = Lazy::new(|| {
            Metrics::new(&REGISTRY).expect("Failed to initialize metrics")
        });
        &INSTANCE
    }
}

impl EnqueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        Ok(Self {
            views_enqueued: register_int_counter_with_registry!(
                "archive_views_enqueued_total",
                "Total number of views appended to the queue",
                registry
            )?,
            enqueue_failures: register_int_counter_with_registry!(
                "archive_enqueue_failures_total",
                "Total number of enqueue attempts that failed",
                registry
            )?,
        })
    }
}

impl DrainMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        Ok(Self {
            drains: register_int_counter_with_registry!(
                "archive_drains_total",
                "Total number of completed queue drains",
                registry
            )?,
            drain_failures: register_int_counter_with_registry!(
                "archive_drain_failures_total",
                "Total number of failed queue drains",
                registry
            )?,
            views_drained: register_int_counter_with_registry!(
                "archive_views_drained_total",
                "Total number of queued views moved into permanent storage",
                registry
            )?,
            drain_duration: register_histogram_with_registry!(
                "archive_drain_duration_seconds",
                "Duration of queue drains in seconds",
                vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0],
                registry
            )?,
            queue_pending: register_int_gauge_with_registry!(
                "archive_queue_pending",
                "Queue depth observed at the start of the last drain",
                registry
            )?,
        })
    }
}

/// Timer for measuring operation duration with automatic histogram recording
pub struct Timer {
    start: Instant,
    histogram: Histogram,
}

impl Timer {
    /// Start a new timer
    pub fn start(histogram: Histogram) -> Self {
        Self {
            start: Instant::now(),
            histogram,
        }
    }

    /// Record the elapsed time and consume the timer
    pub fn finish(self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Register the global metrics; call once at startup
pub fn init_registry() {
    let _ = Metrics::global();
}

/// Get the Prometheus registry for serving metrics
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Collect and return all metrics as a Prometheus-formatted string
pub fn collect_metrics() -> String {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = registry().gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_in_private_registry() {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry).unwrap();
        metrics.enqueue.views_enqueued.inc();
        metrics.drain.views_drained.inc_by(5);

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"archive_views_enqueued_total".to_string()));
        assert!(names.contains(&"archive_drain_duration_seconds".to_string()));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        let _first = Metrics::new(&registry).unwrap();
        assert!(Metrics::new(&registry).is_err());
    }

    #[test]
    fn test_collect_metrics_exposes_global_names() {
        init_registry();
        Metrics::global().drain.drains.inc();
        assert!(collect_metrics().contains("archive_drains_total"));
    }
}
