//! Fixed slowdown middleware for testing client timeouts

use axum::body::Body;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::IntoResponse;
use std::time::Duration;

const SLOWDOWN: Duration = Duration::from_millis(1500);

/// Delays every request by a fixed amount before handling it.
pub async fn slowdown_request(request: Request<Body>, next: Next) -> impl IntoResponse {
    tokio::time::sleep(SLOWDOWN).await;
    next.run(request).await
}
