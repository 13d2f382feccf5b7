//! LeIA API - HTTP JSON API and web chat
//!
//! Every route answers through the shared [`leia_rag::Assistant`]; errors use
//! the `{"sucesso": false, "erro", "timestamp"}` body.
//!
//! Author: hephaex@gmail.com

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{error_handling::HandleErrorLayer, Router};
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "LeIA API",
        version = "1.0",
        description = "Assistente virtual para perguntas em português sobre linhas, custos e termos"
    ),
    paths(
        handlers::info::home,
        handlers::info::exemplos,
        handlers::pergunta::pergunta_handler,
        handlers::health::health_check,
        handlers::health::config_handler,
        handlers::chat::create_session,
        handlers::chat::get_session,
        handlers::chat::post_message,
        handlers::chat::clear_session,
    ),
    components(schemas(
        error::ApiError,
        handlers::pergunta::PerguntaRequest,
        handlers::pergunta::PerguntaResponse,
        handlers::health::HealthResponse,
        handlers::health::ConfigResponse,
        handlers::health::DatabaseSettings,
        handlers::chat::ChatRole,
        handlers::chat::ChatMessage,
        handlers::chat::SessionResponse,
        handlers::chat::NewMessage,
        handlers::chat::MessageResponse,
    )),
    tags(
        (name = "pergunta", description = "Perguntas em linguagem natural"),
        (name = "chat", description = "Sessões do chat web"),
        (name = "health", description = "Saúde e configuração"),
        (name = "info", description = "Descrição da API e exemplos")
    )
)]
pub struct ApiDoc;

/// Full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let cors = middleware::cors_layer(&state.config.server.cors_origins);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(routes::api_routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::metrics_middleware,
        ))
        .layer(CatchPanicLayer::custom(middleware::handle_panic))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(middleware::handle_timeout_error))
                .layer(TimeoutLayer::new(timeout)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Router over an empty in-memory database and no language model
#[cfg(feature = "test-utils")]
pub fn create_router_for_testing() -> Router {
    create_router(testing::state(leia_query::testing::InMemoryExecutor::new()))
}

#[cfg(feature = "test-utils")]
pub mod testing {
    use std::sync::Arc;

    use leia_core::AppConfig;
    use leia_query::{testing::InMemoryExecutor, EntityExtractor, QueryEngine};
    use leia_rag::Assistant;

    use crate::state::AppState;

    /// State answering from `db`, with reports shown raw
    pub fn state(db: InMemoryExecutor) -> Arc<AppState> {
        let engine = QueryEngine::new(Arc::new(db), EntityExtractor::default());
        Arc::new(AppState::new(
            AppConfig::default(),
            Assistant::with_pipeline(engine, None),
        ))
    }
}
