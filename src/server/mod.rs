//! HTTP server for health and metrics endpoints
//!
//! Provides the self-health surface for external monitoring:
//! - `/health` - Liveness JSON document
//! - `/readyz` - Readiness probe (scheduler is running)
//! - `/metrics` - Prometheus metrics
//!
//! Also provides graceful shutdown handling for SIGTERM/SIGINT.

mod health;
pub mod metrics;
pub mod shutdown;

pub use health::{
    bind_health_listener, health_service, run_health_server, serve_health, HealthResponse,
    HealthState, ReadinessState, SERVICE_NAME,
};
pub use metrics::{create_metrics, PingerMetrics, SharedMetrics};
pub use shutdown::{shutdown_channel, wait_for_signal, ShutdownController, ShutdownSignal};

#[cfg(test)]
#[path = "health_test.rs"]
mod health_tests;

#[cfg(test)]
#[path = "metrics_test.rs"]
mod metrics_tests;

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;
