//! Metrics tracking middleware
//!
//! Tracks request latency, counts and status codes for `/metrics`, keyed by
//! route template so the map stays bounded by the router.
//!
//! Author: hephaex@gmail.com

use crate::state::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

/// Key shared by every request that matched no route
pub const UNMATCHED: &str = "unmatched";

/// Count the request under its route template, with latency and status
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED.to_string());
    let response = next.run(request).await;

    let latency_us = start.elapsed().as_micros() as u64;
    let status = response.status();

    state
        .record_request(endpoint, status.as_u16(), latency_us)
        .await;

    response
}
