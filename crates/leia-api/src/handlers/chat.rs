//! Web chat page and in-memory chat sessions

use std::sync::Arc;

use std::time::Instant;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse},
    Json,
};
use leia_rag::{assistant::EMPTY_QUESTION, ReplySource};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::timestamp;
use crate::error::AppError;
use crate::state::AppState;

pub const WELCOME: &str = "Olá, sou a sua assistente virtual LeIA, como posso te ajudar hoje?";

const CHAT_PAGE: &str = include_str!("../../static/chat.html");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: String,
}

impl ChatMessage {
    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: timestamp(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub mensagens: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewMessage {
    #[schema(example = "Quantas linhas ociosas tem o cliente Safra?")]
    pub conteudo: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub resposta: ChatMessage,
    /// direct, generated or raw_data
    #[schema(value_type = String, example = "direct")]
    pub fonte: ReplySource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub erro_ia: Option<String>,
}

fn session_not_found() -> AppError {
    AppError::NotFound("Sessão não encontrada".to_string())
}

/// A malformed id names no session
fn session_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, AppError> {
    path.map(|Path(id)| id).map_err(|_| session_not_found())
}

/// Chat page
pub async fn chat_page() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

/// Start a session seeded with the welcome message
#[utoipa::path(
    post,
    path = "/chat/sessions",
    tag = "chat",
    responses((status = 201, description = "Session created", body = SessionResponse))
)]
pub async fn create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mensagens = vec![ChatMessage::new(ChatRole::Assistant, WELCOME)];
    let id = state.open_session(mensagens.clone()).await;
    tracing::debug!(session = %id, "Chat session created");

    (StatusCode::CREATED, Json(SessionResponse { id, mensagens }))
}

/// Session history
#[utoipa::path(
    get,
    path = "/chat/sessions/{id}",
    tag = "chat",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session history", body = SessionResponse),
        (status = 404, description = "Unknown session", body = crate::error::ApiError)
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<SessionResponse>, AppError> {
    let id = session_id(path)?;
    let sessions = state.sessions.read().await;
    let mensagens = sessions
        .get(&id)
        .map(|session| session.messages.clone())
        .ok_or_else(session_not_found)?;
    Ok(Json(SessionResponse { id, mensagens }))
}

/// Ask a question inside a session
#[utoipa::path(
    post,
    path = "/chat/sessions/{id}/mensagens",
    tag = "chat",
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = NewMessage,
    responses(
        (status = 200, description = "Assistant reply", body = MessageResponse),
        (status = 400, description = "Blank message or invalid JSON", body = crate::error::ApiError),
        (status = 404, description = "Unknown session", body = crate::error::ApiError)
    )
)]
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<NewMessage>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = session_id(path)?;
    let Json(message) = payload?;
    let question = message.conteudo.trim();
    if question.is_empty() {
        return Err(AppError::BadRequest(EMPTY_QUESTION.to_string()));
    }
    if !state.sessions.read().await.contains_key(&id) {
        return Err(session_not_found());
    }

    // the lock is not held while the assistant works
    let reply = state.assistant.answer(question).await;
    let answer = ChatMessage::new(ChatRole::Assistant, reply.text);

    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&id).ok_or_else(session_not_found)?;
    session.messages.push(ChatMessage::new(ChatRole::User, question));
    session.messages.push(answer.clone());
    session.last_used = Instant::now();

    Ok(Json(MessageResponse {
        resposta: answer,
        fonte: reply.source,
        erro_ia: reply.ai_error,
    }))
}

/// End a session and drop its history
#[utoipa::path(
    delete,
    path = "/chat/sessions/{id}",
    tag = "chat",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 204, description = "Session removed"),
        (status = 404, description = "Unknown session", body = crate::error::ApiError)
    )
)]
pub async fn clear_session(
    State(state): State<Arc<AppState>>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let id = session_id(path)?;
    state
        .sessions
        .write()
        .await
        .remove(&id)
        .ok_or_else(session_not_found)?;
    tracing::debug!(session = %id, "Chat session removed");
    Ok(StatusCode::NO_CONTENT)
}
