//! Self-health endpoints
//!
//! - `/health` - Liveness for external monitoring, JSON status document
//! - `/readyz` - Readiness: is the scheduler running?
//! - `/metrics` - Prometheus text exposition

use crate::server::{SharedMetrics, ShutdownSignal};
use axum::{
    extract::{connect_info::IntoMakeServiceWithConnectInfo, ConnectInfo, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Name reported in the health document
pub const SERVICE_NAME: &str = "pinger";

/// Shared state for readiness tracking
///
/// The scheduler sets this to ready once its loop is running, and back to
/// not ready when it stops.
#[derive(Debug, Clone)]
pub struct ReadinessState {
    ready: Arc<AtomicBool>,
}

impl ReadinessState {
    /// Create a new readiness state (initially not ready)
    pub fn new() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

impl Default for ReadinessState {
    fn default() -> Self {
        Self::new()
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    /// Serialized as RFC 3339
    pub timestamp: DateTime<Utc>,
    pub service: String,
}

/// State shared by all health handlers
#[derive(Clone)]
pub struct HealthState {
    pub readiness: ReadinessState,
    pub metrics: SharedMetrics,
}

impl HealthState {
    pub fn new(readiness: ReadinessState, metrics: SharedMetrics) -> Self {
        Self { readiness, metrics }
    }
}

/// Liveness handler
///
/// GET only; every other method gets 405.
async fn health(method: Method, ConnectInfo(remote): ConnectInfo<SocketAddr>) -> Response {
    if method != Method::GET {
        return (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response();
    }

    debug!(remote_addr = %remote, "Health check requested");

    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        service: SERVICE_NAME.to_string(),
    })
    .into_response()
}

/// Readiness handler
///
/// Returns 200 OK if ready, 503 Service Unavailable if not.
async fn readyz(State(state): State<HealthState>) -> StatusCode {
    if state.readiness.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics(State(state): State<HealthState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", any(health))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// The health endpoints as a service for `axum::serve`
///
/// `/health` reads the peer address, so the router only comes wrapped with
/// connect info.
pub fn health_service(state: HealthState) -> IntoMakeServiceWithConnectInfo<Router, SocketAddr> {
    health_router(state).into_make_service_with_connect_info::<SocketAddr>()
}

/// Bind the health port on all interfaces
pub async fn bind_health_listener(port: u16) -> Result<TcpListener, std::io::Error> {
    TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await
}

/// Run the health server on the specified port until `shutdown` fires
pub async fn run_health_server(
    port: u16,
    state: HealthState,
    shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    let listener = bind_health_listener(port).await?;
    serve_health(listener, state, shutdown).await
}

/// Serve the health router on an already bound listener
pub async fn serve_health(
    listener: TcpListener,
    state: HealthState,
    mut shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    // Log after successful bind - server is actually listening
    info!(addr = %addr, "HTTP server starting");

    axum::serve(listener, health_service(state))
        .with_graceful_shutdown(async move {
            shutdown.wait().await;
            info!("HTTP server shutting down");
        })
        .await
}
