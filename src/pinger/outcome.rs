use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

/// Why a check ended without receiving any HTTP response
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckError {
    #[error("failed to create request: {0}")]
    InvalidRequest(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("retry backoff cancelled by shutdown")]
    Cancelled,

    #[error("check task failed: {0}")]
    TaskFailed(String),
}

impl From<reqwest::Error> for CheckError {
    fn from(err: reqwest::Error) -> Self {
        let detail = error_chain(&err);
        if err.is_builder() {
            CheckError::InvalidRequest(detail)
        } else if err.is_timeout() {
            CheckError::Timeout(detail)
        } else if err.is_connect() {
            CheckError::Connect(detail)
        } else {
            CheckError::Transport(detail)
        }
    }
}

/// reqwest hides the useful part (refused, DNS) in the source chain
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Terminal result of checking one target, after its own retries
///
/// Either a response was received (status code and latency present, no
/// error) or none was (error present, no status code). The constructors
/// are the only way to build one, so both can never be missing at once.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    url: String,
    succeeded: bool,
    status_code: Option<u16>,
    latency: Option<Duration>,
    error: Option<CheckError>,
    body: Option<String>,
    attempts: u32,
}

impl CheckOutcome {
    /// The last attempt received a response
    pub fn responded(
        url: impl Into<String>,
        status_code: u16,
        latency: Duration,
        body: Option<String>,
        attempts: u32,
    ) -> Self {
        Self {
            url: url.into(),
            succeeded: (200..300).contains(&status_code),
            status_code: Some(status_code),
            latency: Some(latency),
            error: None,
            body,
            attempts,
        }
    }

    /// No attempt received a response
    pub fn failed(url: impl Into<String>, error: CheckError, attempts: u32) -> Self {
        Self {
            url: url.into(),
            succeeded: false,
            status_code: None,
            latency: None,
            error: Some(error),
            body: None,
            attempts,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// A response with a 2xx status was received
    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Time until response headers arrived, for the attempt that responded
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    pub fn error(&self) -> Option<&CheckError> {
        self.error.as_ref()
    }

    /// Captured response body; only present when body capture is enabled
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Attempts performed, including the first
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
