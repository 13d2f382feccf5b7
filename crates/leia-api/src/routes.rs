//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::handlers::{chat, health, info, pergunta};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// JSON API, chat page and chat session routes
pub fn api_routes() -> Router<Arc<AppState>> {
    let api = Router::new()
        .route("/", get(info::home))
        .route("/pergunta", post(pergunta::pergunta_handler))
        .route("/exemplos", get(info::exemplos))
        .route("/health", get(health::health_check))
        .route("/config", get(health::config_handler))
        .route("/metrics", get(health::metrics));

    let chat = Router::new()
        .route("/chat", get(chat::chat_page))
        .route("/chat/sessions", post(chat::create_session))
        .route(
            "/chat/sessions/:id",
            get(chat::get_session).delete(chat::clear_session),
        )
        .route("/chat/sessions/:id/mensagens", post(chat::post_message));

    api.merge(chat)
}
