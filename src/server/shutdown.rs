//! Process-wide shutdown signalling
//!
//! One [`ShutdownController`] triggers shutdown; any number of
//! [`ShutdownSignal`] clones observe it. Backed by a `watch` channel so a
//! signal created after shutdown was triggered still sees it.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Triggers shutdown for every associated [`ShutdownSignal`]
#[derive(Debug, Clone)]
pub struct ShutdownController {
    tx: Arc<watch::Sender<bool>>,
}

/// Observes shutdown triggered by a [`ShutdownController`]
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected controller/signal pair
pub fn shutdown_channel() -> (ShutdownController, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (
        ShutdownController { tx: Arc::new(tx) },
        ShutdownSignal { rx },
    )
}

impl ShutdownController {
    /// Trigger shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    /// Whether shutdown has been triggered
    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    /// A new signal observing this controller
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownSignal {
    /// Whether shutdown has been triggered
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is triggered
    ///
    /// Also resolves if every controller has been dropped: nobody is left
    /// who could keep the service running.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

/// Wait for SIGINT (ctrl-c) or, on unix, SIGTERM
///
/// If a handler cannot be installed the corresponding branch never
/// resolves; the other one still works.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "SIGINT", "Received shutdown signal"),
        _ = terminate => info!(signal = "SIGTERM", "Received shutdown signal"),
    }
}
