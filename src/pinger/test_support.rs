//! Local upstream servers for exercising checks over real HTTP, and a
//! JSON log capture for asserting on emitted events

use axum::{extract::State, http::StatusCode, Router};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// How a test upstream answers
#[derive(Clone)]
pub struct Behavior {
    pub status: StatusCode,
    pub body: &'static str,
    pub delay: Duration,
    /// Only the first `n` requests are delayed; `None` delays all of them
    pub slow_requests: Option<usize>,
}

impl Behavior {
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: "",
            delay: Duration::ZERO,
            slow_requests: None,
        }
    }

    pub fn ok() -> Self {
        Self::status(StatusCode::OK)
    }

    pub fn with_body(mut self, body: &'static str) -> Self {
        self.body = body;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn slow_first(mut self, n: usize) -> Self {
        self.slow_requests = Some(n);
        self
    }
}

#[derive(Clone)]
struct UpstreamState {
    behavior: Behavior,
    hits: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

/// A running upstream
pub struct Upstream {
    pub url: String,
    hits: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl Upstream {
    /// Requests received so far, including ones the client gave up on
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Highest number of requests handled at the same time
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn respond(State(state): State<UpstreamState>) -> (StatusCode, &'static str) {
    let index = state.hits.fetch_add(1, Ordering::SeqCst);
    let active = state.active.fetch_add(1, Ordering::SeqCst) + 1;
    let _guard = ActiveGuard(state.active.clone());
    state.max_active.fetch_max(active, Ordering::SeqCst);

    let delayed = state.behavior.slow_requests.map_or(true, |n| index < n);
    if delayed && !state.behavior.delay.is_zero() {
        tokio::time::sleep(state.behavior.delay).await;
    }

    (state.behavior.status, state.behavior.body)
}

/// Serve `behavior` on an ephemeral local port
pub async fn spawn_upstream(behavior: Behavior) -> Upstream {
    let state = UpstreamState {
        behavior,
        hits: Arc::new(AtomicUsize::new(0)),
        active: Arc::new(AtomicUsize::new(0)),
        max_active: Arc::new(AtomicUsize::new(0)),
    };
    let upstream = Upstream {
        url: String::new(),
        hits: state.hits.clone(),
        max_active: state.max_active.clone(),
    };

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream listener");
    let addr = listener.local_addr().expect("upstream local addr");
    let app = Router::new().fallback(respond).with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Upstream {
        url: format!("http://{}/", addr),
        ..upstream
    }
}

/// A URL nothing listens on
pub fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe listener");
    let port = listener.local_addr().expect("probe local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{}/", port)
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn wait_until<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Log lines written by a [`capture_logs`] subscriber
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("log buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    /// Every captured event, fields flattened to the top level
    pub fn events(&self) -> Vec<serde_json::Value> {
        let raw = self.0.lock().expect("log buffer lock").clone();
        String::from_utf8(raw)
            .expect("utf-8 log output")
            .lines()
            .map(|line| serde_json::from_str(line).expect("json log line"))
            .collect()
    }

    /// Events with the given message
    pub fn with_message(&self, message: &str) -> Vec<serde_json::Value> {
        self.events()
            .into_iter()
            .filter(|event| event["message"] == message)
            .collect()
    }

    /// First event with the given message
    pub fn find(&self, message: &str) -> Option<serde_json::Value> {
        self.with_message(message).into_iter().next()
    }
}

/// Capture events at debug and above as JSON on the current thread
///
/// Events are only captured while the guard lives, and only on the thread
/// that called this; use the default current-thread `#[tokio::test]`.
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(move || writer.clone())
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}
