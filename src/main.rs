use anyhow::Context as _;
use pinger::pinger::{
    CheckerConfig, CycleCoordinator, ResultSink, Scheduler, SchedulerConfig, TargetChecker,
    TracingSink,
};
use pinger::server::{
    bind_health_listener, create_metrics, serve_health, shutdown_channel, wait_for_signal,
    HealthState, ReadinessState,
};
use pinger::Settings;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// How long the health server gets to finish in-flight requests
const HTTP_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("failed to load config")?;

    pinger::logging::init(&settings.log_level, settings.log_format)
        .context("failed to initialize logger")?;

    info!(
        target_count = settings.urls.len(),
        interval_secs = settings.interval.as_secs(),
        "Starting Pinger service"
    );

    let metrics = create_metrics().context("failed to create metrics registry")?;
    let (controller, signal) = shutdown_channel();

    let sink: Arc<dyn ResultSink> = Arc::new(TracingSink::new(settings.log_response_body));
    let checker = TargetChecker::new(CheckerConfig::from(&settings), Arc::clone(&sink))
        .context("failed to build HTTP client")?
        .with_shutdown(signal.clone());
    let coordinator = Arc::new(CycleCoordinator::new(
        Arc::new(checker),
        sink,
        metrics.clone(),
        settings.max_concurrent_checks,
    ));

    let readiness = ReadinessState::new();
    let scheduler = Scheduler::new(
        coordinator,
        settings.urls.clone(),
        SchedulerConfig::from(&settings),
        metrics.clone(),
    )
    .with_readiness(readiness.clone());

    let listener = bind_health_listener(settings.port)
        .await
        .with_context(|| format!("failed to bind health server on port {}", settings.port))?;

    // Serving failures after a successful bind stop the whole service
    let health_state = HealthState::new(readiness, metrics);
    let health_controller = controller.clone();
    let health_signal = signal.clone();
    let health_server = tokio::spawn(async move {
        if let Err(e) = serve_health(listener, health_state, health_signal).await {
            error!(error = %e, "HTTP server error");
            health_controller.shutdown();
        }
    });

    let signal_controller = controller.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_controller.shutdown();
    });

    scheduler.run(signal).await;

    // The scheduler can also stop because the health server failed; make
    // sure the server sees shutdown either way.
    controller.shutdown();
    if tokio::time::timeout(HTTP_SHUTDOWN_TIMEOUT, health_server)
        .await
        .is_err()
    {
        warn!("HTTP server did not shut down in time");
    }

    info!("Pinger service stopped gracefully");
    Ok(())
}
