//! Tracing subscriber setup

use crate::config::LogFormat;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Filter from `RUST_LOG` when set, else from `default_directive`
pub fn env_filter(default_directive: &str) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(default_directive)?),
    }
}

/// Install the global subscriber
///
/// Fails on an unparsable directive or if a subscriber is already set.
pub fn init(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter = env_filter(level)?;

    let layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_filter(filter)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .compact()
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(layer).try_init()?;
    Ok(())
}
