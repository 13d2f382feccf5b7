//! Question endpoint
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use leia_rag::assistant::EMPTY_QUESTION;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

use super::{timestamp, API_VERSION};
use crate::error::AppError;
use crate::state::AppState;

/// Fields accepted for the question, in priority order
const QUESTION_FIELDS: [&str; 3] = ["pergunta", "question", "query"];

/// Question request body; any one of the three fields is accepted
#[derive(Debug, Deserialize, ToSchema)]
pub struct PerguntaRequest {
    #[schema(example = "Quantas linhas ativas tem o cliente Safra?")]
    pub pergunta: Option<String>,
    pub question: Option<String>,
    pub query: Option<String>,
}

/// Question response body
#[derive(Debug, Serialize, ToSchema)]
pub struct PerguntaResponse {
    pub sucesso: bool,
    pub pergunta: String,
    #[schema(example = "O Cliente Safra possui 1.262.790 linhas.")]
    pub resposta: String,
    #[schema(example = "2024-01-01 12:00:00")]
    pub timestamp: String,
    #[schema(example = "1.0")]
    pub versao: String,
    /// `erro` when the question is missing, `erro_ia` when the AI pass failed
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub dados_extras: Option<Value>,
}

impl PerguntaResponse {
    fn new(sucesso: bool, pergunta: &str, resposta: impl Into<String>) -> Self {
        Self {
            sucesso,
            pergunta: pergunta.to_string(),
            resposta: resposta.into(),
            timestamp: timestamp(),
            versao: API_VERSION.to_string(),
            dados_extras: None,
        }
    }

    fn with_extras(mut self, extras: Value) -> Self {
        self.dados_extras = Some(extras);
        self
    }
}

/// First non-empty question field, if any
fn question_from(fields: &serde_json::Map<String, Value>) -> Option<&str> {
    QUESTION_FIELDS
        .iter()
        .find_map(|key| fields.get(*key))
        .and_then(Value::as_str)
        .filter(|question| !question.is_empty())
}

/// Answer a question
#[utoipa::path(
    post,
    path = "/pergunta",
    tag = "pergunta",
    request_body = PerguntaRequest,
    responses(
        (status = 200, description = "Question processed", body = PerguntaResponse),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 500, description = "Internal error", body = crate::error::ApiError)
    )
)]
pub async fn pergunta_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PerguntaResponse>, AppError> {
    let Json(body) = payload?;

    let fields = match &body {
        Value::Object(fields) if !fields.is_empty() => fields,
        _ => return Err(AppError::BadRequest("JSON vazio ou inválido".to_string())),
    };

    let Some(question) = question_from(fields) else {
        return Ok(Json(PerguntaResponse::new(false, "", "").with_extras(
            json!({ "erro": "Campo 'pergunta' não encontrado no JSON" }),
        )));
    };

    if question.trim().is_empty() {
        return Ok(Json(PerguntaResponse::new(false, question, EMPTY_QUESTION)));
    }

    let reply = state.assistant.answer(question).await;
    tracing::info!(source = ?reply.source, "Question answered");

    let response = PerguntaResponse::new(true, question, reply.text);
    Ok(Json(match reply.ai_error {
        Some(error) => response.with_extras(json!({ "erro_ia": error })),
        None => response,
    }))
}
