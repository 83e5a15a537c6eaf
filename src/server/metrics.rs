//! Prometheus metrics for the pinger
//!
//! Exposes polling activity:
//! - Check results and response times
//! - Retries performed
//! - Cycle counts, skips and durations
//! - Checks currently in flight

use crate::pinger::CheckOutcome;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Pinger metrics registry
///
/// Thread-safe container for all Prometheus metrics.
/// Clone is cheap (Arc internally).
#[derive(Clone)]
pub struct PingerMetrics {
    registry: Registry,
    /// Completed checks by result (success, failure)
    pub checks_total: IntCounterVec,
    /// Response time of checks that received a response
    pub check_duration_seconds: Histogram,
    /// Retry attempts after a transport failure
    pub retries_total: IntCounter,
    /// Cycles run to completion
    pub cycles_total: IntCounter,
    /// Ticks skipped because a cycle was still running
    pub cycles_skipped_total: IntCounter,
    /// Wall-clock duration of whole cycles
    pub cycle_duration_seconds: Histogram,
    /// Checks currently holding a concurrency slot
    pub checks_in_flight: IntGauge,
}

impl PingerMetrics {
    /// Create a new metrics registry with all pinger metrics
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let checks_total = IntCounterVec::new(
            Opts::new("pinger_checks_total", "Total number of completed checks"),
            &["result"], // success, failure
        )?;
        registry.register(Box::new(checks_total.clone()))?;

        let check_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "pinger_check_duration_seconds",
                "Response time of checks that received a response",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(check_duration_seconds.clone()))?;

        let retries_total = IntCounter::new(
            "pinger_retries_total",
            "Total number of retry attempts after transport failures",
        )?;
        registry.register(Box::new(retries_total.clone()))?;

        let cycles_total = IntCounter::new("pinger_cycles_total", "Total number of completed cycles")?;
        registry.register(Box::new(cycles_total.clone()))?;

        let cycles_skipped_total = IntCounter::new(
            "pinger_cycles_skipped_total",
            "Ticks skipped because the previous cycle was still running",
        )?;
        registry.register(Box::new(cycles_skipped_total.clone()))?;

        let cycle_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "pinger_cycle_duration_seconds",
                "Duration of a full polling cycle in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;

        let checks_in_flight = IntGauge::new(
            "pinger_checks_in_flight",
            "Number of checks currently running",
        )?;
        registry.register(Box::new(checks_in_flight.clone()))?;

        Ok(Self {
            registry,
            checks_total,
            check_duration_seconds,
            retries_total,
            cycles_total,
            cycles_skipped_total,
            cycle_duration_seconds,
            checks_in_flight,
        })
    }

    /// Record one terminal check outcome
    pub fn record_check(&self, outcome: &CheckOutcome) {
        let result = if outcome.succeeded() { "success" } else { "failure" };
        self.checks_total.with_label_values(&[result]).inc();

        if let Some(latency) = outcome.latency() {
            self.check_duration_seconds.observe(latency.as_secs_f64());
        }

        self.retries_total
            .inc_by(u64::from(outcome.attempts().saturating_sub(1)));
    }

    /// Record a completed cycle
    pub fn record_cycle(&self, elapsed: Duration) {
        self.cycles_total.inc();
        self.cycle_duration_seconds.observe(elapsed.as_secs_f64());
    }

    /// Record a tick that did not start a cycle
    pub fn record_cycle_skipped(&self) {
        self.cycles_skipped_total.inc();
    }

    /// Track a check for as long as the returned guard lives
    pub fn check_in_flight(&self) -> InFlightGuard {
        self.checks_in_flight.inc();
        InFlightGuard {
            gauge: self.checks_in_flight.clone(),
        }
    }

    /// Encode all metrics to Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("Failed to encode metrics as UTF-8: {}", e))
        })
    }
}

/// Decrements the in-flight gauge on drop, including when a check panics
pub struct InFlightGuard {
    gauge: IntGauge,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

/// Shared metrics handle for use across the service
pub type SharedMetrics = Arc<PingerMetrics>;

/// Create a new shared metrics instance
pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    Ok(Arc::new(PingerMetrics::new()?))
}
