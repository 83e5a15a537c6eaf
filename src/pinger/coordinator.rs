//! Fan-out of one polling cycle across all targets

use crate::pinger::{CheckError, CheckOutcome, ResultSink, TargetChecker};
use crate::server::SharedMetrics;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info_span, Instrument};
use uuid::Uuid;

/// Summary of a finished cycle; the outcomes themselves went to the sink
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    /// Targets the cycle was started with
    pub targets: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl CycleReport {
    /// Outcomes forwarded to the sink
    pub fn outcomes(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Runs cycles: one concurrent check per target, outcomes forwarded as they
/// complete
pub struct CycleCoordinator {
    checker: Arc<TargetChecker>,
    sink: Arc<dyn ResultSink>,
    metrics: SharedMetrics,
    /// Shared by every cycle, so overlapping cycles share the bound
    limiter: Option<Arc<Semaphore>>,
}

impl CycleCoordinator {
    /// `max_concurrent_checks == 0` leaves fan-out unbounded; values above
    /// [`Semaphore::MAX_PERMITS`] are clamped to it
    pub fn new(
        checker: Arc<TargetChecker>,
        sink: Arc<dyn ResultSink>,
        metrics: SharedMetrics,
        max_concurrent_checks: usize,
    ) -> Self {
        let permits = max_concurrent_checks.min(Semaphore::MAX_PERMITS);
        let limiter = (permits > 0).then(|| Arc::new(Semaphore::new(permits)));

        Self {
            checker,
            sink,
            metrics,
            limiter,
        }
    }

    pub fn checker(&self) -> &TargetChecker {
        &self.checker
    }

    /// Check every target once
    ///
    /// Returns after every target's outcome has been forwarded to the sink,
    /// exactly once each, in completion order.
    pub async fn run_cycle(&self, targets: &[String]) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", cycle_id = %cycle_id);
        self.fan_out(cycle_id, targets).instrument(span).await
    }

    async fn fan_out(&self, cycle_id: Uuid, targets: &[String]) -> CycleReport {
        let started = Instant::now();
        let mut checks = JoinSet::new();
        let mut pending = HashMap::with_capacity(targets.len());

        for url in targets {
            let checker = Arc::clone(&self.checker);
            let limiter = self.limiter.clone();
            let metrics = Arc::clone(&self.metrics);
            let target = url.clone();

            let handle = checks.spawn(
                async move {
                    let _permit = match limiter {
                        Some(semaphore) => semaphore.acquire_owned().await.ok(),
                        None => None,
                    };
                    let _in_flight = metrics.check_in_flight();
                    checker.check(&target).await
                }
                .in_current_span(),
            );
            pending.insert(handle.id(), url.clone());
        }

        let mut report = CycleReport {
            cycle_id,
            targets: targets.len(),
            succeeded: 0,
            failed: 0,
            elapsed: Duration::ZERO,
        };

        while let Some(joined) = checks.join_next_with_id().await {
            let outcome = match joined {
                Ok((id, outcome)) => {
                    pending.remove(&id);
                    outcome
                }
                Err(e) => {
                    let url = pending.remove(&e.id()).unwrap_or_default();
                    error!(url = %url, error = %e, "Check task failed");
                    CheckOutcome::failed(url, CheckError::TaskFailed(e.to_string()), 0)
                }
            };

            if outcome.succeeded() {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
            self.metrics.record_check(&outcome);
            self.sink.record_outcome(&outcome).await;
        }

        report.elapsed = started.elapsed();
        self.metrics.record_cycle(report.elapsed);
        debug!(
            targets = report.targets,
            succeeded = report.succeeded,
            failed = report.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Cycle completed"
        );

        report
    }
}
