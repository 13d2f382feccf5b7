//! HTTP middleware
//!
//! Author: hephaex@gmail.com

pub mod metrics;

pub use metrics::metrics_middleware;

use std::any::Any;

use axum::{
    BoxError,
    http::{HeaderValue, Method},
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowOrigin, Any as AnyOrigin, CorsLayer};

use crate::error::AppError;

/// CORS layer for the configured origins; any origin when the list is empty or holds `*`
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(AnyOrigin);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(AnyOrigin);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

/// Panics become the API's 500 body
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "erro desconhecido".to_string()
    };
    AppError::Internal(detail).into_response()
}

/// Timeouts become 408 with the API's error body
pub async fn handle_timeout_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::Timeout
    } else {
        AppError::Internal(err.to_string())
    }
}
