//! LeIA Configuration Management
//!
//! Configuration comes from environment variables (optionally seeded from a
//! `.env` file), an optional TOML file, and development defaults. No
//! credential has a default value.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Clients recognised by name before any regex pattern is tried
pub const DEFAULT_KNOWN_CLIENTS: &[&str] =
    &["safra", "sotreq", "verzani", "sonda", "direcional", "mdr"];

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// PostgreSQL connection
    pub database: DatabaseConfig,

    /// LLM and embedding provider configuration
    pub llm: LlmConfig,

    /// RAG pipeline configuration
    pub rag: RagConfig,

    /// Question analysis configuration
    pub assistant: AssistantConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load the effective configuration.
    ///
    /// Reads `.env` if present, then either `LEIA_CONFIG` (a TOML file) with
    /// environment overrides on top, or the environment alone.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

        match std::env::var("LEIA_CONFIG") {
            Ok(path) => Self::from_file(path)?.with_env_override(),
            Err(_) => Self::from_env(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Apply every variable the lookup knows about on top of `self`
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = parse_value("API_PORT", port)?;
        }
        if let Some(debug) = lookup("API_DEBUG") {
            self.server.debug = parse_bool("API_DEBUG", debug)?;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = split_list(&origins);
        }

        // PostgreSQL
        if let Some(host) = lookup("DB_HOST") {
            self.database.host = host;
        }
        if let Some(port) = lookup("DB_PORT") {
            self.database.port = parse_value("DB_PORT", port)?;
        }
        if let Some(name) = lookup("DB_NAME") {
            self.database.name = name;
        }
        if let Some(user) = lookup("DB_USER") {
            self.database.user = user;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            self.database.password = Some(password).filter(|p| !p.is_empty());
        }
        if let Some(sslmode) = lookup("DB_SSLMODE") {
            self.database.sslmode = sslmode;
        }
        if let Some(timeout) = lookup("DB_STATEMENT_TIMEOUT_MS") {
            self.database.statement_timeout_ms = parse_value("DB_STATEMENT_TIMEOUT_MS", timeout)?;
        }

        // LLM
        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
            if lookup("LLM_MODEL").is_none() {
                self.llm.model = self.llm.provider.default_model().to_string();
            }
            if lookup("EMBEDDING_MODEL").is_none() {
                self.llm.embedding_model = self.llm.provider.default_embedding_model().to_string();
            }
        }
        if let Some(key) = lookup("GOOGLE_API_KEY") {
            self.llm.google_api_key = Some(key).filter(|k| !k.trim().is_empty());
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(key).filter(|k| !k.trim().is_empty());
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.llm.openai_base_url = Some(url);
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.llm.embedding_model = model;
        }

        // Question analysis
        if let Some(clients) = lookup("LEIA_KNOWN_CLIENTS") {
            self.assistant.known_clients = split_list(&clients)
                .into_iter()
                .map(|c| c.to_lowercase())
                .collect();
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("LOG_JSON") {
            self.logging.json_format = parse_bool("LOG_JSON", json)?;
        }

        Ok(self)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

fn parse_bool(key: &str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Verbose request logging
    pub debug: bool,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Allowed origins for CORS, any origin when empty
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            debug: false,
            request_timeout_secs: 120,
            cors_origins: vec![],
        }
    }
}

/// PostgreSQL connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,

    /// Never defaulted; comes from DB_PASSWORD or the config file
    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// libpq-style ssl mode (disable, prefer, require, ...)
    pub sslmode: String,

    /// Maximum pooled connections
    pub pool_size: u32,

    /// Seconds to wait for a connection
    pub connect_timeout_secs: u64,

    /// Applied to every connection with `SET statement_timeout`
    pub statement_timeout_ms: u64,
}

impl DatabaseConfig {
    /// Password placeholder for display
    pub fn masked_password(&self) -> &'static str {
        match &self.password {
            Some(_) => "***",
            None => "NÃO DEFINIDA",
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            name: "LeIA".to_string(),
            user: "postgres".to_string(),
            password: None,
            sslmode: "prefer".to_string(),
            pool_size: 5,
            connect_timeout_secs: 10,
            statement_timeout_ms: 15_000,
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider used for both generation and embeddings
    pub provider: LlmProvider,

    /// Google AI Studio key (Gemini)
    #[serde(skip_serializing)]
    pub google_api_key: Option<String>,

    /// OpenAI API key
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL (for compatible APIs)
    pub openai_base_url: Option<String>,

    /// Generation model name
    pub model: String,

    /// Embedding model name
    pub embedding_model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// API key for the selected provider, if any
    pub fn api_key(&self) -> Option<&str> {
        match self.provider {
            LlmProvider::Gemini => self.google_api_key.as_deref(),
            LlmProvider::OpenAI => self.openai_api_key.as_deref(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Gemini,
            google_api_key: None,
            openai_api_key: None,
            openai_base_url: None,
            model: LlmProvider::Gemini.default_model().to_string(),
            embedding_model: LlmProvider::Gemini.default_embedding_model().to_string(),
            max_tokens: 2048,
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Gemini,
    OpenAI,
}

impl LlmProvider {
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.5-flash",
            Self::OpenAI => "gpt-4o-mini",
        }
    }

    pub fn default_embedding_model(&self) -> &'static str {
        match self {
            Self::Gemini => "models/text-embedding-004",
            Self::OpenAI => "text-embedding-3-small",
        }
    }

    /// Environment variable holding the key for this provider
    pub fn key_variable(&self) -> &'static str {
        match self {
            Self::Gemini => "GOOGLE_API_KEY",
            Self::OpenAI => "OPENAI_API_KEY",
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAI),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// RAG pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Chunk size in characters
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,

    /// Chunks kept as prompt context
    pub top_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 300,
            chunk_overlap: 30,
            top_k: 6,
        }
    }
}

/// Question analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Lower-case client names matched by substring
    pub known_clients: Vec<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            known_clients: DEFAULT_KNOWN_CLIENTS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.statement_timeout_ms, 15_000);
        assert!(config.database.password.is_none());
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.llm.embedding_model, "models/text-embedding-004");
        assert_eq!(config.rag.chunk_size, 300);
        assert_eq!(config.rag.chunk_overlap, 30);
        assert_eq!(config.rag.top_k, 6);
        assert_eq!(config.assistant.known_clients.len(), 6);
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::default()
            .apply_env(lookup(&[
                ("DB_HOST", "db.internal"),
                ("DB_PORT", "6543"),
                ("DB_NAME", "leia"),
                ("DB_PASSWORD", "segredo"),
                ("DB_SSLMODE", "require"),
                ("API_PORT", "8000"),
                ("API_DEBUG", "True"),
                ("GOOGLE_API_KEY", "abc"),
                ("LEIA_KNOWN_CLIENTS", "Safra, Acme ,"),
            ]))
            .unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.name, "leia");
        assert_eq!(config.database.sslmode, "require");
        assert_eq!(config.database.masked_password(), "***");
        assert_eq!(config.server.port, 8000);
        assert!(config.server.debug);
        assert_eq!(config.llm.api_key(), Some("abc"));
        assert_eq!(config.assistant.known_clients, vec!["safra", "acme"]);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let err = AppConfig::default()
            .apply_env(lookup(&[("API_PORT", "cinco mil")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "API_PORT"));
    }

    #[test]
    fn test_blank_key_is_unset() {
        let config = AppConfig::default()
            .apply_env(lookup(&[("GOOGLE_API_KEY", "  ")]))
            .unwrap();
        assert!(config.llm.api_key().is_none());
        assert_eq!(config.database.masked_password(), "NÃO DEFINIDA");
    }

    #[test]
    fn test_provider_switch_sets_models() {
        let config = AppConfig::default()
            .apply_env(lookup(&[("LLM_PROVIDER", "openai"), ("OPENAI_API_KEY", "sk")]))
            .unwrap();
        assert_eq!(config.llm.provider, LlmProvider::OpenAI);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.api_key(), Some("sk"));
    }

    #[test]
    fn test_llm_provider_parse() {
        assert_eq!("gemini".parse::<LlmProvider>().unwrap(), LlmProvider::Gemini);
        assert_eq!("OpenAI".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAI);
        assert!("invalid".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[database]\nhost = \"pg\"\nport = 5441\n\n[rag]\ntop_k = 3\n"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.database.host, "pg");
        assert_eq!(config.database.port, 5441);
        assert_eq!(config.database.name, "LeIA");
        assert_eq!(config.rag.top_k, 3);
        assert_eq!(config.rag.chunk_size, 300);
    }

    #[test]
    fn test_from_file_missing() {
        let err = AppConfig::from_file("/nonexistent/leia.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }
}
