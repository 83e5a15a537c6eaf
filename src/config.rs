//! Service settings
//!
//! Loaded once at startup from environment variables, optionally seeded
//! from a `.env` file in the working directory. Nothing reloads them while
//! the service runs.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Default time between polling cycles
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(60);

/// Default per-attempt HTTP timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default port for the self-health server
pub const DEFAULT_PORT: u16 = 8080;

/// Default cap on checks in flight across all cycles
pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 64;

/// Default linear backoff unit (attempt k waits k units)
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);


#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PING_URLS is required")]
    MissingUrls,

    #[error("no valid URLs found in PING_URLS")]
    NoValidUrls,

    #[error("invalid {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("error loading .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),
}

/// What the scheduler does when a tick fires while a cycle is still running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Start the new cycle anyway; cycles run concurrently
    #[default]
    Allow,
    /// Skip the tick until the running cycle finishes
    Skip,
}

impl FromStr for OverlapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(OverlapPolicy::Allow),
            "skip" => Ok(OverlapPolicy::Skip),
            other => Err(format!("expected \"allow\" or \"skip\", got {:?}", other)),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "compact" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected \"text\" or \"json\", got {:?}", other)),
        }
    }
}

/// Fully resolved service settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Target URLs, in configuration order
    pub urls: Vec<String>,
    pub interval: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    /// Default tracing filter directive (`RUST_LOG` takes precedence)
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_response_body: bool,
    pub port: u16,
    /// 0 disables the limit
    pub max_concurrent_checks: usize,
    pub overlap_policy: OverlapPolicy,
    pub backoff_unit: Duration,
    pub backoff_cancellable: bool,
    /// Bound on awaiting in-flight cycles at shutdown; `None` waits for all
    /// of them, which the per-attempt timeouts already bound
    pub drain_timeout: Option<Duration>,
}

impl Settings {
    /// Settings for the given targets with every other value at its default
    pub fn with_urls(urls: Vec<String>) -> Self {
        Self {
            urls,
            interval: DEFAULT_PING_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            log_response_body: false,
            port: DEFAULT_PORT,
            max_concurrent_checks: DEFAULT_MAX_CONCURRENT_CHECKS,
            overlap_policy: OverlapPolicy::Allow,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            backoff_cancellable: false,
            drain_timeout: None,
        }
    }

    /// Load settings from the process environment
    ///
    /// A `.env` file is optional; a file that exists but cannot be parsed
    /// is an error. Variables already set in the environment win over the
    /// file.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let raw_urls = get("PING_URLS").ok_or(ConfigError::MissingUrls)?;
        let urls: Vec<String> = raw_urls
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();
        if urls.is_empty() {
            return Err(ConfigError::NoValidUrls);
        }

        let interval = positive_secs("PING_INTERVAL", get("PING_INTERVAL"), 60)?;
        let request_timeout = positive_secs("REQUEST_TIMEOUT", get("REQUEST_TIMEOUT"), 10)?;
        let max_retries = parse_or("MAX_RETRIES", get("MAX_RETRIES"), DEFAULT_MAX_RETRIES)?;

        let log_level = get("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_format = parse_or("LOG_FORMAT", get("LOG_FORMAT"), LogFormat::Text)?;

        // Unrecognized values silently disable body logging.
        let log_response_body = get("LOG_RESPONSE_BODY")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(false);

        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
        let max_concurrent_checks = parse_or(
            "MAX_CONCURRENT_CHECKS",
            get("MAX_CONCURRENT_CHECKS"),
            DEFAULT_MAX_CONCURRENT_CHECKS,
        )?;
        if max_concurrent_checks > Semaphore::MAX_PERMITS {
            return Err(ConfigError::InvalidValue {
                key: "MAX_CONCURRENT_CHECKS",
                value: max_concurrent_checks.to_string(),
                reason: format!("must be at most {}", Semaphore::MAX_PERMITS),
            });
        }
        let overlap_policy = parse_or("OVERLAP_POLICY", get("OVERLAP_POLICY"), OverlapPolicy::Allow)?;

        let backoff_unit = Duration::from_millis(parse_or(
            "RETRY_BACKOFF_UNIT_MS",
            get("RETRY_BACKOFF_UNIT_MS"),
            DEFAULT_BACKOFF_UNIT.as_millis() as u64,
        )?);

        let backoff_cancellable = match get("RETRY_BACKOFF_CANCELLABLE") {
            None => false,
            Some(v) => parse_bool(&v).ok_or_else(|| ConfigError::InvalidValue {
                key: "RETRY_BACKOFF_CANCELLABLE",
                value: v.clone(),
                reason: "expected a boolean".to_string(),
            })?,
        };

        let drain_timeout = match get("SHUTDOWN_DRAIN_TIMEOUT") {
            None => None,
            raw => Some(Duration::from_secs(parse_or("SHUTDOWN_DRAIN_TIMEOUT", raw, 0)?)),
        };

        Ok(Self {
            urls,
            interval,
            request_timeout,
            max_retries,
            log_level,
            log_format,
            log_response_body,
            port,
            max_concurrent_checks,
            overlap_policy,
            backoff_unit,
            backoff_cancellable,
            drain_timeout,
        })
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key,
                reason: e.to_string(),
                value,
            }),
    }
}

fn positive_secs(
    key: &'static str,
    raw: Option<String>,
    default_secs: u64,
) -> Result<Duration, ConfigError> {
    let original = raw.clone();
    let secs: u64 = parse_or(key, raw, default_secs)?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue {
            key,
            value: original.unwrap_or_default(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

/// Accepts the usual spellings: 1/0, t/f, true/false in any case
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
