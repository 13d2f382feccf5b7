//! API error handling
//!
//! Errors use the same `{"sucesso": false, "erro", "timestamp"}` body as the
//! rest of the API.
//!
//! Author: hephaex@gmail.com

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::handlers::timestamp;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Always false
    pub sucesso: bool,
    /// Human-readable message
    #[schema(example = "JSON vazio ou inválido")]
    pub erro: String,
    #[schema(example = "2024-01-01 12:00:00")]
    pub timestamp: String,
}

impl ApiError {
    pub fn new(erro: impl Into<String>) -> Self {
        Self {
            sucesso: false,
            erro: erro.into(),
            timestamp: timestamp(),
        }
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Timeout,
    Internal(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                AppError::BadRequest("Content-Type deve ser application/json".to_string())
            }
            other => {
                tracing::debug!(error = %other, "Rejected request body");
                AppError::BadRequest("JSON vazio ou inválido".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::new(msg)),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::new(msg)),
            AppError::Timeout => (
                StatusCode::REQUEST_TIMEOUT,
                ApiError::new("Tempo limite da requisição excedido"),
            ),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new(format!("Erro interno do servidor: {msg}")),
                )
            }
        };

        (status, Json(error)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::BadRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Timeout.into_response().status(),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            AppError::Internal("x".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
