//! LeIA Core - Shared types, configuration and traits
//!
//! This crate holds everything the query, RAG and front-end crates agree on:
//! the error type, the tabular result buffer, Brazilian number formatting and
//! the seams towards PostgreSQL and the hosted language models.
//!
//! Author: hephaex@gmail.com

pub mod config;
pub mod format;
pub mod table;

pub use config::{AppConfig, ConfigError, DatabaseConfig, LlmConfig, LlmProvider, RagConfig};
pub use table::{Cell, QueryTable};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error type for LeIA operations
#[derive(Error, Debug)]
pub enum LeiaError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Table not found: {table}")]
    TableNotFound { table: String },

    #[error("Column for role '{role}' not found in table {table}")]
    UnmappedColumn { table: String, role: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error(
        "Não foi possível gerar embeddings para recuperar o contexto. \
         Verifique sua chave de API e o modelo de embeddings. Detalhe: {0}"
    )]
    Embedding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for LeiaError {
    fn from(err: ConfigError) -> Self {
        LeiaError::Config(err.to_string())
    }
}

/// Result type alias for LeIA operations
pub type Result<T> = std::result::Result<T, LeiaError>;

// ============================================================================
// Database seam
// ============================================================================

/// A column as reported by `information_schema.columns`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    /// Whether the SQL type is a calendar type (date, timestamp with or without zone)
    pub fn is_date_like(&self) -> bool {
        let ty = self.data_type.to_lowercase();
        ty.contains("date") || ty.contains("timestamp")
    }
}

/// Read-only SQL access used by the table handlers
///
/// Implementations must treat `query` as opaque SQL text and return every
/// column of the result in select order.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Check `information_schema.tables` for a table with this name
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Columns of a table in ordinal order
    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Base tables outside the system schemas, as `(schema, table)` pairs
    async fn list_tables(&self) -> Result<Vec<(String, String)>>;

    /// Run a read-only statement
    async fn query(&self, sql: &str) -> Result<QueryTable>;
}

// ============================================================================
// Language model seams
// ============================================================================

/// Text generation client
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for a single prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Model identifier, used in logs
    fn model(&self) -> &str;
}

/// Embedding client
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a single query text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of documents, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_date_like() {
        assert!(ColumnInfo::new("mes_referencia", "date").is_date_like());
        assert!(ColumnInfo::new("mes_referencia", "timestamp without time zone").is_date_like());
        assert!(!ColumnInfo::new("mes_referencia", "character varying").is_date_like());
        assert!(!ColumnInfo::new("total", "numeric").is_date_like());
    }

    #[test]
    fn test_embedding_error_message() {
        let err = LeiaError::Embedding("quota".to_string());
        let text = err.to_string();
        assert!(text.starts_with("Não foi possível gerar embeddings"));
        assert!(text.ends_with("Detalhe: quota"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: LeiaError = ConfigError::MissingRequired("GOOGLE_API_KEY".to_string()).into();
        assert!(matches!(err, LeiaError::Config(_)));
    }
}
