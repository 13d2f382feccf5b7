//! LeIA API Server
//!
//! HTTP JSON API and web chat for the LeIA assistant.
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;

use anyhow::Context;
use leia_api::{create_router, state::AppState};
use leia_core::config::{AppConfig, LoggingConfig};
use leia_query::{EntityExtractor, PgExecutor, QueryEngine};
use leia_rag::Assistant;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig, debug: bool) {
    let fallback = if debug {
        "leia=debug,tower_http=debug".to_string()
    } else {
        format!("leia={},tower_http=info", logging.level)
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    if logging.json_format {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config.logging, config.server.debug);

    let db = PgExecutor::connect_lazy(&config.database)?;
    let engine = QueryEngine::new(
        Arc::new(db),
        EntityExtractor::new(config.assistant.known_clients.clone()),
    );
    let assistant = Assistant::new(engine, config.llm.clone(), config.rag.clone());

    if assistant.llm_available().await {
        tracing::info!("AI mode: reports are answered through RAG");
    } else {
        tracing::warn!("AI unavailable: reports will be returned as raw data");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, assistant));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("LeIA API starting on http://{}", addr);
    tracing::info!("Web chat at http://{}/chat", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
