//! Result sinks
//!
//! Where outcomes go once a check is done. The service logs them through
//! [`TracingSink`]; [`MemorySink`] keeps them for inspection instead.

use crate::pinger::CheckOutcome;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, field, info};

/// Receives check outcomes and retry notifications
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Called exactly once per target per cycle, in completion order
    async fn record_outcome(&self, outcome: &CheckOutcome);

    /// Called before retry number `attempt` (1-based) for `url`
    fn record_retry(&self, url: &str, attempt: u32);
}

/// Emits outcomes as structured tracing events
#[derive(Debug, Clone, Default)]
pub struct TracingSink {
    log_body: bool,
}

impl TracingSink {
    pub fn new(log_body: bool) -> Self {
        Self { log_body }
    }
}

#[async_trait]
impl ResultSink for TracingSink {
    async fn record_outcome(&self, outcome: &CheckOutcome) {
        let response_time_ms = outcome.latency().map(|l| l.as_millis() as u64);

        if outcome.succeeded() {
            let body = outcome
                .body()
                .filter(|b| self.log_body && !b.is_empty());
            info!(
                url = outcome.url(),
                success = true,
                status_code = outcome.status_code(),
                response_time_ms,
                body,
                "Ping successful"
            );
        } else {
            error!(
                url = outcome.url(),
                success = false,
                error = outcome.error().map(field::display),
                status_code = outcome.status_code(),
                response_time_ms,
                attempts = outcome.attempts(),
                "Ping failed"
            );
        }
    }

    fn record_retry(&self, url: &str, attempt: u32) {
        debug!(url, attempt, "Retrying request");
    }
}

/// Keeps every outcome and retry in memory
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    outcomes: Arc<Mutex<Vec<CheckOutcome>>>,
    retries: Arc<Mutex<Vec<(String, u32)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes in the order they were recorded
    pub fn outcomes(&self) -> Vec<CheckOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// `(url, attempt)` for every retry announced
    pub fn retries(&self) -> Vec<(String, u32)> {
        self.retries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn outcome_count(&self) -> usize {
        self.outcomes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn record_outcome(&self, outcome: &CheckOutcome) {
        self.outcomes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(outcome.clone());
    }

    fn record_retry(&self, url: &str, attempt: u32) {
        self.retries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((url.to_string(), attempt));
    }
}
