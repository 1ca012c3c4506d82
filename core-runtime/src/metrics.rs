//! Prometheus metrics for sector jobs.
//!
//! # Metrics
//!
//! - `assembly_queued_seconds{job}`: time jobs spent waiting for the worker
//! - `assembly_run_seconds{job}`: time jobs spent running
//! - `assembly_completed_total{job}`: jobs finished successfully
//! - `assembly_failed_total{job}`: jobs stopped by an error
//! - `assembly_cancelled_total{job}`: jobs cancelled before or while running

use core_model::JobKind;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;
use std::time::Duration;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct JobLabels {
    job: String,
}

impl From<JobKind> for JobLabels {
    fn from(job: JobKind) -> Self {
        Self {
            job: job.as_str().to_string(),
        }
    }
}

/// Timing and outcome metrics of the sector job scheduler.
///
/// Cloning yields handles to the same underlying metrics.
#[derive(Debug, Clone)]
pub struct AssemblyMetrics {
    queued_seconds: Family<JobLabels, Histogram>,
    run_seconds: Family<JobLabels, Histogram>,
    completed_total: Family<JobLabels, Counter>,
    failed_total: Family<JobLabels, Counter>,
    cancelled_total: Family<JobLabels, Counter>,
}

impl AssemblyMetrics {
    /// Create the metrics and register them with a Prometheus registry.
    ///
    /// ```rust
    /// use core_runtime::metrics::AssemblyMetrics;
    /// use prometheus_client::registry::Registry;
    ///
    /// let mut registry = Registry::default();
    /// let metrics = AssemblyMetrics::new(&mut registry);
    /// ```
    pub fn new(registry: &mut Registry) -> Self {
        let metrics = Self::unregistered();

        registry.register(
            "assembly_queued_seconds",
            "Time sector jobs waited in the queue in seconds",
            metrics.queued_seconds.clone(),
        );
        registry.register(
            "assembly_run_seconds",
            "Run time of sector jobs in seconds",
            metrics.run_seconds.clone(),
        );
        registry.register(
            "assembly_completed",
            "Sector jobs finished successfully",
            metrics.completed_total.clone(),
        );
        registry.register(
            "assembly_failed",
            "Sector jobs stopped by an error",
            metrics.failed_total.clone(),
        );
        registry.register(
            "assembly_cancelled",
            "Sector jobs cancelled before or while running",
            metrics.cancelled_total.clone(),
        );

        metrics
    }

    /// Metrics not exposed through any registry
    pub fn unregistered() -> Self {
        Self {
            // 100ms to ~27h
            queued_seconds: Family::new_with_constructor(|| Histogram::new(exponential_buckets(0.1, 4.0, 10))),
            // 10ms to ~3h
            run_seconds: Family::new_with_constructor(|| Histogram::new(exponential_buckets(0.01, 4.0, 10))),
            completed_total: Family::default(),
            failed_total: Family::default(),
            cancelled_total: Family::default(),
        }
    }

    /// Record a successful job
    pub fn record_completed(&self, job: JobKind, queued: Duration, run: Duration) {
        let labels = JobLabels::from(job);
        self.queued_seconds
            .get_or_create(&labels)
            .observe(queued.as_secs_f64());
        self.run_seconds.get_or_create(&labels).observe(run.as_secs_f64());
        self.completed_total.get_or_create(&labels).inc();
    }

    pub fn record_failed(&self, job: JobKind) {
        self.failed_total.get_or_create(&JobLabels::from(job)).inc();
    }

    pub fn record_cancelled(&self, job: JobKind) {
        self.cancelled_total.get_or_create(&JobLabels::from(job)).inc();
    }

    pub fn completed(&self, job: JobKind) -> u64 {
        self.completed_total.get_or_create(&JobLabels::from(job)).get()
    }

    pub fn failed(&self, job: JobKind) -> u64 {
        self.failed_total.get_or_create(&JobLabels::from(job)).get()
    }

    pub fn cancelled(&self, job: JobKind) -> u64 {
        self.cancelled_total.get_or_create(&JobLabels::from(job)).get()
    }
}

impl Default for AssemblyMetrics {
    fn default() -> Self {
        Self::unregistered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus_client::encoding::text::encode;

    #[test]
    fn test_counters_are_labelled_by_job() {
        let metrics = AssemblyMetrics::unregistered();
        metrics.record_completed(JobKind::Sync, Duration::from_millis(5), Duration::from_secs(2));
        metrics.record_failed(JobKind::Delete);
        metrics.record_cancelled(JobKind::Sync);

        assert_eq!(metrics.completed(JobKind::Sync), 1);
        assert_eq!(metrics.completed(JobKind::Delete), 0);
        assert_eq!(metrics.failed(JobKind::Delete), 1);
        assert_eq!(metrics.cancelled(JobKind::Sync), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let metrics = AssemblyMetrics::unregistered();
        metrics.clone().record_failed(JobKind::Sync);
        assert_eq!(metrics.failed(JobKind::Sync), 1);
    }

    #[test]
    fn test_registered_metrics_are_exported() {
        let mut registry = Registry::default();
        let metrics = AssemblyMetrics::new(&mut registry);
        metrics.record_completed(JobKind::Sync, Duration::from_secs(1), Duration::from_secs(3));

        let mut out = String::new();
        encode(&mut out, &registry).unwrap();
        assert!(out.contains("assembly_completed_total{job=\"sync\"} 1"));
        assert!(out.contains("assembly_run_seconds_count{job=\"sync\"} 1"));
    }
}
