//! Fixed-interval tick loop and shutdown drain

use crate::config::{OverlapPolicy, Settings};
use crate::pinger::{CycleCoordinator, CycleReport};
use crate::server::{ReadinessState, SharedMetrics, ShutdownSignal};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub overlap_policy: OverlapPolicy,
    /// How long to await in-flight cycles once stopped; zero abandons them,
    /// `None` waits until every one has finished
    pub drain_timeout: Option<Duration>,
}

impl From<&Settings> for SchedulerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            interval: settings.interval,
            overlap_policy: settings.overlap_policy,
            drain_timeout: settings.drain_timeout,
        }
    }
}

/// What happened between start and stop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerSummary {
    pub cycles_started: u64,
    pub cycles_skipped: u64,
    /// Cycles still running at stop that finished within the drain timeout
    pub cycles_drained: usize,
    /// Cycles still running when the drain timeout expired
    pub cycles_abandoned: usize,
}

/// Drives cycles on a fixed interval until shutdown
pub struct Scheduler {
    coordinator: Arc<CycleCoordinator>,
    targets: Arc<[String]>,
    config: SchedulerConfig,
    metrics: SharedMetrics,
    readiness: Option<ReadinessState>,
}

impl Scheduler {
    pub fn new(
        coordinator: Arc<CycleCoordinator>,
        targets: Vec<String>,
        config: SchedulerConfig,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            coordinator,
            targets: targets.into(),
            config,
            metrics,
            readiness: None,
        }
    }

    /// Mark `readiness` ready once the loop starts
    pub fn with_readiness(mut self, readiness: ReadinessState) -> Self {
        self.readiness = Some(readiness);
        self
    }

    /// Run until `shutdown` fires, then drain in-flight cycles
    ///
    /// The first cycle starts immediately. Cycles run as their own tasks, so
    /// a slow cycle never delays the next tick. Shutdown is only observed
    /// while waiting; it never interrupts a running cycle.
    pub async fn run(&self, mut shutdown: ShutdownSignal) -> SchedulerSummary {
        info!(
            url_count = self.targets.len(),
            interval_secs = self.config.interval.as_secs_f64(),
            timeout_secs = self.coordinator.checker().config().request_timeout.as_secs_f64(),
            overlap_policy = ?self.config.overlap_policy,
            "Pinger started"
        );

        let mut summary = SchedulerSummary::default();
        let mut cycles: JoinSet<CycleReport> = JoinSet::new();

        // tokio's interval fires its first tick immediately, which gives us
        // the startup cycle without a special case.
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        if let Some(readiness) = &self.readiness {
            readiness.set_ready();
        }

        loop {
            tokio::select! {
                biased;

                _ = shutdown.wait() => {
                    info!(in_flight = cycles.len(), "Shutdown observed, stopping scheduler");
                    break;
                }
                _ = ticker.tick() => {
                    while let Some(joined) = cycles.try_join_next() {
                        log_cycle_join(joined);
                    }

                    if self.config.overlap_policy == OverlapPolicy::Skip && !cycles.is_empty() {
                        warn!(in_flight = cycles.len(), "Previous cycle still running, skipping tick");
                        self.metrics.record_cycle_skipped();
                        summary.cycles_skipped += 1;
                        continue;
                    }

                    let coordinator = Arc::clone(&self.coordinator);
                    let targets = Arc::clone(&self.targets);
                    cycles.spawn(async move { coordinator.run_cycle(&targets).await });
                    summary.cycles_started += 1;
                }
                Some(joined) = cycles.join_next(), if !cycles.is_empty() => {
                    log_cycle_join(joined);
                }
            }
        }

        if let Some(readiness) = &self.readiness {
            readiness.set_not_ready();
        }

        self.drain(&mut cycles, &mut summary).await;

        info!(
            cycles_started = summary.cycles_started,
            cycles_skipped = summary.cycles_skipped,
            cycles_drained = summary.cycles_drained,
            cycles_abandoned = summary.cycles_abandoned,
            "Pinger stopped"
        );

        summary
    }

    async fn drain(&self, cycles: &mut JoinSet<CycleReport>, summary: &mut SchedulerSummary) {
        if cycles.is_empty() {
            return;
        }

        info!(
            in_flight = cycles.len(),
            timeout_secs = self.config.drain_timeout.map(|t| t.as_secs_f64()),
            "Draining in-flight cycles"
        );

        let drained = &mut summary.cycles_drained;
        let join_all = async {
            while let Some(joined) = cycles.join_next().await {
                log_cycle_join(joined);
                *drained += 1;
            }
        };

        let finished = match self.config.drain_timeout {
            Some(limit) => tokio::time::timeout(limit, join_all).await.is_ok(),
            None => {
                join_all.await;
                true
            }
        };

        if !finished {
            summary.cycles_abandoned = cycles.len();
            warn!(
                abandoned = summary.cycles_abandoned,
                "Drain timeout expired, abandoning in-flight cycles"
            );
            cycles.shutdown().await;
        }
    }
}

fn log_cycle_join(joined: Result<CycleReport, JoinError>) {
    if let Err(e) = joined {
        if !e.is_cancelled() {
            error!(error = %e, "Cycle task failed");
        }
    }
}
