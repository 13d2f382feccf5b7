//! Health, configuration and metrics handlers
//!
//! Author: hephaex@gmail.com

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::ToSchema;

use super::{timestamp, API_VERSION};
use crate::state::AppState;

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    pub timestamp: String,
    #[schema(example = "1.0")]
    pub versao: String,
    /// Whether reports go through the language model
    pub llm_disponivel: bool,
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: timestamp(),
        versao: API_VERSION.to_string(),
        llm_disponivel: state.assistant.llm_available().await,
    })
}

/// Database settings with the password masked
#[derive(Serialize, ToSchema)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    #[schema(example = "***")]
    pub password: String,
    pub sslmode: String,
}

#[derive(Serialize, ToSchema)]
pub struct ConfigResponse {
    pub configuracao_banco: DatabaseSettings,
    pub timestamp: String,
}

/// Effective database configuration
#[utoipa::path(
    get,
    path = "/config",
    tag = "health",
    responses(
        (status = 200, description = "Database settings", body = ConfigResponse)
    )
)]
pub async fn config_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db = &state.config.database;
    Json(ConfigResponse {
        configuracao_banco: DatabaseSettings {
            host: db.host.clone(),
            port: db.port,
            database: db.name.clone(),
            user: db.user.clone(),
            password: db.masked_password().to_string(),
            sslmode: db.sslmode.clone(),
        },
        timestamp: timestamp(),
    })
}

#[derive(Serialize)]
pub struct EndpointSummary {
    pub requests: u64,
    pub average_latency_ms: f64,
    pub status_counts: BTreeMap<u16, u64>,
}

/// JSON metrics response
#[derive(Serialize)]
pub struct MetricsResponse {
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub requests_per_second: f64,
    pub endpoints: BTreeMap<String, EndpointSummary>,
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.uptime_secs();
    let total_requests = state.get_request_count();
    let rps = if uptime > 0 {
        total_requests as f64 / uptime as f64
    } else {
        0.0
    };

    let endpoints = state
        .metrics
        .read()
        .await
        .iter()
        .map(|(endpoint, m)| {
            (
                endpoint.clone(),
                EndpointSummary {
                    requests: m.requests,
                    average_latency_ms: m.average_latency_ms(),
                    status_counts: m.status_counts.clone(),
                },
            )
        })
        .collect();

    Json(MetricsResponse {
        uptime_seconds: uptime,
        total_requests,
        requests_per_second: rps,
        endpoints,
    })
}
