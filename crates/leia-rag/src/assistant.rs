//! Response formatting shared by the API, the chat and the CLI
//!
//! Direct answers pass through untouched. Reports go through the RAG pass
//! when a language model is configured, and are shown raw otherwise.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use leia_core::{LlmConfig, RagConfig};
use leia_query::{HandlerOutcome, QueryEngine};
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::embedding::create_embedding_client;
use crate::llm::create_llm_client;
use crate::RagPipeline;

pub const EMPTY_QUESTION: &str = "Por favor, digite uma pergunta válida.";

/// Where the reply text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    /// Sentence built by a table handler
    Direct,
    /// LLM answer over retrieved report chunks
    Generated,
    /// Report shown without AI processing
    RawData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssistantReply {
    pub text: String,
    pub source: ReplySource,
    /// Why the RAG pass was skipped, when it failed
    pub ai_error: Option<String>,
}

impl AssistantReply {
    fn direct(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: ReplySource::Direct,
            ai_error: None,
        }
    }
}

/// Question in, Portuguese reply out
pub struct Assistant {
    engine: QueryEngine,
    llm_config: LlmConfig,
    rag_config: RagConfig,
    rag: OnceCell<Option<Arc<RagPipeline>>>,
}

impl Assistant {
    /// The RAG pipeline is built from `llm_config` on first use
    pub fn new(engine: QueryEngine, llm_config: LlmConfig, rag_config: RagConfig) -> Self {
        Self {
            engine,
            llm_config,
            rag_config,
            rag: OnceCell::new(),
        }
    }

    /// Use a ready pipeline, or none at all
    pub fn with_pipeline(engine: QueryEngine, rag: Option<RagPipeline>) -> Self {
        Self {
            engine,
            llm_config: LlmConfig::default(),
            rag_config: RagConfig::default(),
            rag: OnceCell::from(rag.map(Arc::new)),
        }
    }

    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    async fn rag(&self) -> Option<&Arc<RagPipeline>> {
        self.rag
            .get_or_init(|| async {
                let built = create_llm_client(&self.llm_config).and_then(|llm| {
                    let embedder = create_embedding_client(&self.llm_config)?;
                    Ok(RagPipeline::new(
                        Arc::from(llm),
                        Arc::from(embedder),
                        self.rag_config.clone(),
                    ))
                });
                match built {
                    Ok(pipeline) => {
                        tracing::info!(
                            provider = ?self.llm_config.provider,
                            model = %self.llm_config.model,
                            "LLM initialized"
                        );
                        Some(Arc::new(pipeline))
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "LLM unavailable, reports will be shown raw");
                        None
                    }
                }
            })
            .await
            .as_ref()
    }

    /// Whether reports can go through the RAG pass
    pub async fn llm_available(&self) -> bool {
        self.rag().await.is_some()
    }

    pub async fn answer(&self, question: &str) -> AssistantReply {
        self.answer_at(question, Local::now().date_naive()).await
    }

    /// Answer relative to a fixed reference date
    pub async fn answer_at(&self, question: &str, today: NaiveDate) -> AssistantReply {
        let question = question.trim();
        if question.is_empty() {
            return AssistantReply::direct(EMPTY_QUESTION);
        }

        let dump = match self.engine.search_at(question, today).await {
            HandlerOutcome::Answer(text) => return AssistantReply::direct(text),
            HandlerOutcome::Report(dump) => dump,
        };

        let Some(rag) = self.rag().await else {
            return AssistantReply {
                text: format!("Dados do banco de dados:\n\n{dump}"),
                source: ReplySource::RawData,
                ai_error: None,
            };
        };

        match rag.answer(question, &dump).await {
            Ok(text) => AssistantReply {
                text,
                source: ReplySource::Generated,
                ai_error: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "RAG failed, returning raw data");
                AssistantReply {
                    text: format!("Dados do banco (sem processamento IA):\n\n{dump}"),
                    source: ReplySource::RawData,
                    ai_error: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FixedLlm, KeywordEmbedder};
    use leia_core::{Cell, QueryTable};
    use leia_query::testing::InMemoryExecutor;
    use leia_query::EntityExtractor;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn idle_db() -> InMemoryExecutor {
        InMemoryExecutor::new()
            .with_table(
                "ia_linhas_ociosas",
                &[
                    ("cliente", "text"),
                    ("operadora", "text"),
                    ("mes_referencia", "date"),
                ],
            )
            .respond(
                "COUNT(*)",
                QueryTable::new(vec!["total_ociosas".into()]).with_row(vec![Cell::Int(3)]),
            )
            .respond(
                "LIMIT 5",
                QueryTable::new(vec!["cliente".into(), "operadora".into()])
                    .with_row(vec![Cell::Text("Safra".into()), Cell::Text("Vivo".into())]),
            )
    }

    fn engine() -> QueryEngine {
        QueryEngine::new(Arc::new(idle_db()), EntityExtractor::default())
    }

    fn pipeline(fail: bool) -> RagPipeline {
        RagPipeline::new(
            Arc::new(FixedLlm::new("O Cliente Safra tem linhas ociosas na Vivo.")),
            Arc::new(KeywordEmbedder { fail }),
            RagConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let assistant = Assistant::with_pipeline(engine(), None);
        let reply = assistant
            .answer_at("Quantas linhas ociosas o Safra possui atualmente?", today())
            .await;
        assert_eq!(reply.source, ReplySource::Direct);
        assert_eq!(reply.text, "O Cliente Safra possui atualmente 3 linhas ociosas.");
    }

    #[tokio::test]
    async fn test_report_without_llm() {
        let assistant = Assistant::with_pipeline(engine(), None);
        let reply = assistant.answer_at("Linhas ociosas do Safra", today()).await;
        assert_eq!(reply.source, ReplySource::RawData);
        assert!(reply
            .text
            .starts_with("Dados do banco de dados:\n\n\n--- AMOSTRA DOS DADOS"));
        assert!(reply.ai_error.is_none());
    }

    #[tokio::test]
    async fn test_report_through_rag() {
        let assistant = Assistant::with_pipeline(engine(), Some(pipeline(false)));
        assert!(assistant.llm_available().await);
        let reply = assistant.answer_at("Linhas ociosas do Safra", today()).await;
        assert_eq!(reply.source, ReplySource::Generated);
        assert_eq!(reply.text, "O Cliente Safra tem linhas ociosas na Vivo.");
    }

    #[tokio::test]
    async fn test_rag_failure_degrades_to_raw_data() {
        let assistant = Assistant::with_pipeline(engine(), Some(pipeline(true)));
        let reply = assistant.answer_at("Linhas ociosas do Safra", today()).await;
        assert_eq!(reply.source, ReplySource::RawData);
        assert!(reply
            .text
            .starts_with("Dados do banco (sem processamento IA):\n\n"));
        assert!(reply
            .ai_error
            .as_deref()
            .unwrap()
            .starts_with("Não foi possível gerar embeddings"));
    }

    #[tokio::test]
    async fn test_blank_question() {
        let assistant = Assistant::with_pipeline(engine(), None);
        assert_eq!(assistant.answer("   ").await.text, EMPTY_QUESTION);
    }

    #[tokio::test]
    async fn test_missing_key_disables_llm() {
        let assistant = Assistant::new(engine(), LlmConfig::default(), RagConfig::default());
        assert!(!assistant.llm_available().await);
    }
}
