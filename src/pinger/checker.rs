//! Single-target HTTP check with linear retry backoff

use crate::config::Settings;
use crate::pinger::{CheckError, CheckOutcome, ResultSink};
use crate::server::ShutdownSignal;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sent as `User-Agent` on every attempt
pub const USER_AGENT: &str = "Pinger/1.0";

/// Per-check behaviour shared by every target
#[derive(Debug, Clone, PartialEq)]
pub struct CheckerConfig {
    /// Timeout for one attempt, connect through response headers
    pub request_timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Retry `k` waits `k * backoff_unit`
    pub backoff_unit: Duration,
    /// Abort a backoff wait when shutdown is triggered
    pub backoff_cancellable: bool,
    /// Read and keep the response body
    pub capture_body: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            request_timeout: crate::config::DEFAULT_REQUEST_TIMEOUT,
            max_retries: crate::config::DEFAULT_MAX_RETRIES,
            backoff_unit: crate::config::DEFAULT_BACKOFF_UNIT,
            backoff_cancellable: false,
            capture_body: false,
        }
    }
}

impl CheckerConfig {
    /// Attempts made before a check gives up
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl From<&Settings> for CheckerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            request_timeout: settings.request_timeout,
            max_retries: settings.max_retries,
            backoff_unit: settings.backoff_unit,
            backoff_cancellable: settings.backoff_cancellable,
            capture_body: settings.log_response_body,
        }
    }
}

/// Checks one URL at a time; share it behind an `Arc` across tasks
pub struct TargetChecker {
    client: reqwest::Client,
    config: CheckerConfig,
    sink: Arc<dyn ResultSink>,
    shutdown: Option<ShutdownSignal>,
}

impl TargetChecker {
    /// Build a checker with its own HTTP client
    pub fn new(config: CheckerConfig, sink: Arc<dyn ResultSink>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            config,
            sink,
            shutdown: None,
        })
    }

    /// Observe `shutdown` during backoff waits (only with `backoff_cancellable`)
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Check `url`, retrying transport failures
    ///
    /// Any HTTP response ends the check, whatever its status. Only when
    /// every attempt failed without a response does the outcome carry the
    /// last attempt's error.
    pub async fn check(&self, url: &str) -> CheckOutcome {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                self.sink.record_retry(url, attempt);
                if !self.backoff(attempt).await {
                    return CheckOutcome::failed(url, CheckError::Cancelled, attempt);
                }
            }

            let start = Instant::now();
            match self.client.get(url).send().await {
                Ok(response) => {
                    let latency = start.elapsed();
                    let status = response.status().as_u16();
                    let body = if self.config.capture_body {
                        Some(response.text().await.unwrap_or_default())
                    } else {
                        None
                    };
                    return CheckOutcome::responded(url, status, latency, body, attempt + 1);
                }
                Err(e) => last_error = Some(CheckError::from(e)),
            }
        }

        let error = last_error
            .unwrap_or_else(|| CheckError::Transport("no attempt was made".to_string()));
        CheckOutcome::failed(url, error, self.config.max_attempts())
    }

    /// Wait before retry `attempt`. Returns false if shutdown cut it short.
    async fn backoff(&self, attempt: u32) -> bool {
        let delay = self
            .config
            .backoff_unit
            .checked_mul(attempt)
            .unwrap_or(Duration::MAX);

        match (&self.shutdown, self.config.backoff_cancellable) {
            (Some(shutdown), true) => {
                let mut shutdown = shutdown.clone();
                tokio::select! {
                    _ = tokio::time::sleep(delay) => true,
                    _ = shutdown.wait() => false,
                }
            }
            _ => {
                tokio::time::sleep(delay).await;
                true
            }
        }
    }
}
