//! Local upstreams for end-to-end tests

use axum::{extract::State, http::StatusCode, Router};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Clone)]
struct Reply {
    status: StatusCode,
    delay: Duration,
    hits: Arc<AtomicUsize>,
}

async fn reply(State(reply): State<Reply>) -> StatusCode {
    reply.hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(reply.delay).await;
    reply.status
}

/// Serve `status` after `delay` on an ephemeral port; returns the URL and
/// a request counter
pub async fn upstream(status: StatusCode, delay: Duration) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let state = Reply {
        status,
        delay,
        hits: hits.clone(),
    };

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream listener");
    let addr = listener.local_addr().expect("upstream local addr");
    let app = Router::new().fallback(reply).with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{}/", addr), hits)
}
