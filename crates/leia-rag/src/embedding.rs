//! Embedding clients for the retrieval step
//!
//! Failures surface as [`LeiaError::Embedding`], whose message tells the user
//! to check the API key and the embedding model.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use leia_core::{EmbeddingClient, LeiaError, LlmConfig, LlmProvider, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm::{http_client, require_key, GeminiContent, GEMINI_BASE_URL, OPENAI_BASE_URL};

// ============================================================================
// Gemini Embedding Client
// ============================================================================

/// Gemini `embedContent` / `batchEmbedContents` client
pub struct GeminiEmbedding {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest {
    model: String,
    content: GeminiContent,
    task_type: &'static str,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedContentRequest>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

/// Resource name in the `models/<id>` form the API expects
fn resource_name(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

impl GeminiEmbedding {
    pub fn new(api_key: impl Into<String>, model: impl AsRef<str>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            model: resource_name(model.as_ref()),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            api_key: require_key(config)?,
            base_url: GEMINI_BASE_URL.to_string(),
            model: resource_name(&config.embedding_model),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn request(&self, text: &str, task_type: &'static str) -> EmbedContentRequest {
        EmbedContentRequest {
            model: self.model.clone(),
            content: GeminiContent::text(text),
            task_type,
        }
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<R> {
        let response = self
            .client
            .post(format!("{}/{}:{method}", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| LeiaError::Embedding(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LeiaError::Embedding(format!("{status}: {error_text}")));
        }

        response
            .json()
            .await
            .map_err(|e| LeiaError::Embedding(format!("failed to parse response: {e}")))
    }
}

#[async_trait]
impl EmbeddingClient for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let result: EmbedContentResponse = self
            .post("embedContent", &self.request(text, "RETRIEVAL_QUERY"))
            .await?;
        Ok(result.embedding.values)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| self.request(text, "RETRIEVAL_DOCUMENT"))
                .collect(),
        };
        let result: BatchEmbedResponse = self.post("batchEmbedContents", &request).await?;

        if result.embeddings.len() != texts.len() {
            return Err(LeiaError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                result.embeddings.len()
            )));
        }
        Ok(result.embeddings.into_iter().map(|e| e.values).collect())
    }
}

// ============================================================================
// OpenAI Embedding Client
// ============================================================================

/// OpenAI embedding API client
pub struct OpenAiEmbedding {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbedding {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            api_key: require_key(config)?,
            base_url: config
                .openai_base_url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            model: config.embedding_model.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| LeiaError::Embedding("no embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = OpenAiEmbeddingRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| LeiaError::Embedding(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LeiaError::Embedding(format!("OpenAI: {error_text}")));
        }

        let result: OpenAiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LeiaError::Embedding(format!("failed to parse response: {e}")))?;

        let mut embeddings = result.data;
        embeddings.sort_by_key(|e| e.index);
        Ok(embeddings.into_iter().map(|e| e.embedding).collect())
    }
}

/// Create an embedding client for the configured provider
pub fn create_embedding_client(config: &LlmConfig) -> Result<Box<dyn EmbeddingClient>> {
    match config.provider {
        LlmProvider::Gemini => Ok(Box::new(GeminiEmbedding::from_config(config)?)),
        LlmProvider::OpenAI => Ok(Box::new(OpenAiEmbedding::from_config(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_name() {
        assert_eq!(resource_name("text-embedding-004"), "models/text-embedding-004");
        assert_eq!(
            resource_name("models/text-embedding-004"),
            "models/text-embedding-004"
        );
    }

    #[test]
    fn test_batch_request_shape() {
        let client = GeminiEmbedding::new("key", "models/text-embedding-004");
        let request = BatchEmbedRequest {
            requests: vec![client.request("linhas", "RETRIEVAL_DOCUMENT")],
        };
        let json = serde_json::to_value(&request).unwrap();
        let first = &json["requests"][0];
        assert_eq!(first["model"], "models/text-embedding-004");
        assert_eq!(first["taskType"], "RETRIEVAL_DOCUMENT");
        assert_eq!(first["content"]["parts"][0]["text"], "linhas");
    }

    #[test]
    fn test_parse_responses() {
        let single: EmbedContentResponse =
            serde_json::from_str(r#"{"embedding":{"values":[0.1,0.2]}}"#).unwrap();
        assert_eq!(single.embedding.values, vec![0.1, 0.2]);

        let batch: BatchEmbedResponse =
            serde_json::from_str(r#"{"embeddings":[{"values":[1.0]},{"values":[2.0]}]}"#).unwrap();
        assert_eq!(batch.embeddings.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let client = GeminiEmbedding::new("key", "text-embedding-004")
            .with_base_url("http://127.0.0.1:1");
        assert!(client.embed_batch(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_embedding_error() {
        let client = OpenAiEmbedding::new("key", "text-embedding-3-small");
        let client = OpenAiEmbedding {
            base_url: "http://127.0.0.1:1".to_string(),
            ..client
        };
        let err = client.embed("teste").await.unwrap_err();
        assert!(matches!(err, LeiaError::Embedding(_)));
        assert!(err.to_string().starts_with("Não foi possível gerar embeddings"));
    }

    #[test]
    fn test_factory_requires_key() {
        let err = create_embedding_client(&LlmConfig::default()).err().unwrap();
        assert!(matches!(err, LeiaError::Config(_)));
    }
}
