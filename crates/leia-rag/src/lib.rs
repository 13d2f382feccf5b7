//! LeIA RAG - Turns raw database reports into prose answers
//!
//! The pipeline chunks a report, embeds the chunks and the question, keeps
//! the chunks closest to the question by cosine similarity and asks the LLM
//! to answer from those chunks only.
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;
use std::time::Instant;

use leia_core::format::reformat_currency_in_text;
use leia_core::{EmbeddingClient, LeiaError, LlmClient, RagConfig, Result};
use ndarray::ArrayView1;

pub mod assistant;
pub mod chunking;
pub mod embedding;
pub mod llm;

pub use assistant::{Assistant, AssistantReply, ReplySource};
pub use chunking::{chunk_text, ChunkConfig};
pub use embedding::{create_embedding_client, GeminiEmbedding, OpenAiEmbedding};
pub use llm::{create_llm_client, GeminiClient, OpenAiClient};

pub const NO_DATA: &str = "Não há dados disponíveis no banco para responder à pergunta.";
pub const NO_CONTEXT: &str = "Não foi possível preparar o contexto para a resposta.";

// ============================================================================
// Prompt
// ============================================================================

const PROMPT_TEMPLATE: &str = "Você é um assistente analista de dados. Responda APENAS com base no CONTEXTO fornecido.\n\
- IMPORTANTE: Use EXATAMENTE os números que aparecem no contexto. NÃO faça cálculos, somas ou multiplicações.\n\
- Se a informação não estiver no contexto, diga que não encontrou nos dados.\n\
- SEMPRE inclua o tipo de contrato quando disponível nos dados.\n\
- Para números grandes (milhares), use ponto como separador de milhar (ex: 1.234.567).\n\
- Para perguntas sobre fornecedor com maior custo, use o formato: 'O Cliente [nome], o fornecedor com o maior custo no mês de [mês] de [ano] é [fornecedor], com um custo total de [valor], tipo de contrato [tipo_contrato].'\n\
- Para perguntas sobre linhas por fornecedor, use o formato: '* **[Fornecedor]**: [número] linhas, tipo de contrato [tipo_contrato].'\n\
- CRÍTICO: Se você vir 'total_linhas: 1.262.790' no contexto, use EXATAMENTE 1.262.790, não faça nenhum cálculo.\n\
- CRÍTICO: Se você vir 'total_linhas: 58.643' no contexto, use EXATAMENTE 58.643, não faça nenhum cálculo.\n\n\
Pergunta: {pergunta}\n\n\
Contexto (trechos relevantes):\n{contexto}\n\n\
Resposta objetiva e concisa em PT-BR:";

/// Fill the answer prompt
pub fn build_prompt(question: &str, context: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{pergunta}", question)
        .replace("{contexto}", context)
}

// ============================================================================
// Similarity
// ============================================================================

/// Cosine similarity; 0 when either vector has zero norm or the lengths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);

    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    a.dot(&b) / (norm_a * norm_b)
}

/// Indices of the `top_k` best scores, best first; always at least one when non-empty
pub fn top_k_indices(scores: &[f32], top_k: usize) -> Vec<usize> {
    let mut ranked: Vec<usize> = (0..scores.len()).collect();
    ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    ranked.truncate(top_k.min(scores.len()).max(1));
    ranked
}

// ============================================================================
// Pipeline
// ============================================================================

/// Retrieval-augmented answer over a textual report
pub struct RagPipeline {
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn EmbeddingClient>,
    config: RagConfig,
}

impl RagPipeline {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn EmbeddingClient>,
        config: RagConfig,
    ) -> Self {
        Self {
            llm,
            embedder,
            config,
        }
    }

    /// Chunks of `data` most similar to `question`, joined by blank lines
    pub async fn retrieve(&self, question: &str, chunks: &[String]) -> Result<String> {
        if chunks.is_empty() {
            return Ok(String::new());
        }
        let chunk_vectors = self.embedder.embed_batch(chunks).await?;
        let query_vector = self.embedder.embed(question).await?;

        if chunk_vectors.len() != chunks.len() {
            return Err(LeiaError::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                chunk_vectors.len()
            )));
        }

        let scores: Vec<f32> = chunk_vectors
            .iter()
            .map(|vector| cosine_similarity(&query_vector, vector))
            .collect();
        let selected = top_k_indices(&scores, self.config.top_k);
        tracing::debug!(
            chunks = chunks.len(),
            selected = selected.len(),
            best = selected.first().map(|&i| scores[i]).unwrap_or_default(),
            "Retrieved context"
        );

        Ok(selected
            .into_iter()
            .map(|i| chunks[i].as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    /// Answer `question` from `data`.
    ///
    /// Blank data and unchunkable data come back as fixed sentences; embedding
    /// and generation failures are errors.
    pub async fn answer(&self, question: &str, data: &str) -> Result<String> {
        if data.trim().is_empty() {
            return Ok(NO_DATA.to_string());
        }

        let chunks = chunk_text(data, &ChunkConfig::from(&self.config));
        if chunks.is_empty() {
            return Ok(NO_CONTEXT.to_string());
        }

        let start = Instant::now();
        let context = self.retrieve(question, &chunks).await?;
        let prompt = build_prompt(question, &context);
        let reply = self.llm.generate(&prompt).await?;

        tracing::info!(
            model = self.llm.model(),
            chunks = chunks.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "RAG answer generated"
        );
        Ok(reformat_currency_in_text(reply.trim()))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use leia_core::{EmbeddingClient, LeiaError, LlmClient, Result};
    use std::sync::Mutex;

    /// Echoes a fixed reply and records the prompts it was given
    pub struct FixedLlm {
        pub reply: String,
        pub prompts: Mutex<Vec<String>>,
    }

    impl FixedLlm {
        pub fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }

        fn model(&self) -> &str {
            "fixed"
        }
    }

    /// Embeds text by counting a few marker words
    pub struct KeywordEmbedder {
        pub fail: bool,
    }

    const MARKERS: [&str; 3] = ["vivo", "claro", "tim"];

    fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        MARKERS
            .iter()
            .map(|m| lower.matches(m).count() as f32)
            .collect()
    }

    #[async_trait]
    impl EmbeddingClient for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.fail {
                return Err(LeiaError::Embedding("quota exceeded".to_string()));
            }
            Ok(vector(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if self.fail {
                return Err(LeiaError::Embedding("quota exceeded".to_string()));
            }
            Ok(texts.iter().map(|t| vector(t)).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{FixedLlm, KeywordEmbedder};
    use super::*;

    fn pipeline(llm: Arc<FixedLlm>, fail: bool, top_k: usize) -> RagPipeline {
        RagPipeline::new(
            llm,
            Arc::new(KeywordEmbedder { fail }),
            RagConfig {
                chunk_size: 16,
                chunk_overlap: 0,
                top_k,
            },
        )
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_top_k_indices() {
        assert_eq!(top_k_indices(&[0.1, 0.9, 0.5], 2), vec![1, 2]);
        assert_eq!(top_k_indices(&[0.1, 0.9], 10), vec![1, 0]);
        assert_eq!(top_k_indices(&[0.3, 0.2], 0), vec![0]);
        assert!(top_k_indices(&[], 6).is_empty());
    }

    #[test]
    fn test_prompt() {
        let prompt = build_prompt("Quantas linhas?", "total_linhas: 10");
        assert!(prompt.starts_with("Você é um assistente analista de dados."));
        assert!(prompt.contains("Pergunta: Quantas linhas?\n\nContexto (trechos relevantes):\ntotal_linhas: 10"));
        assert!(prompt.ends_with("Resposta objetiva e concisa em PT-BR:"));
    }

    #[tokio::test]
    async fn test_blank_data() {
        let llm = Arc::new(FixedLlm::new("x"));
        let answer = pipeline(llm.clone(), false, 6).answer("?", "  \n ").await.unwrap();
        assert_eq!(answer, NO_DATA);
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_answer_uses_closest_chunk() {
        let llm = Arc::new(FixedLlm::new("O fornecedor Claro custou 1234.50 reais"));
        let data = "Vivo custo 100\n\nClaro custo 200\n\nTim custo 300";
        let answer = pipeline(llm.clone(), false, 1)
            .answer("Quanto custou a Claro?", data)
            .await
            .unwrap();
        assert_eq!(answer, "O fornecedor Claro custou R$ 1.234,50 reais");

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("Contexto (trechos relevantes):\nClaro custo 200\n\n"));
        assert!(!prompts[0].contains("Tim custo 300"));
    }

    #[tokio::test]
    async fn test_embedding_failure() {
        let llm = Arc::new(FixedLlm::new("x"));
        let err = pipeline(llm, true, 6)
            .answer("?", "Vivo custo 100")
            .await
            .unwrap_err();
        assert!(matches!(err, LeiaError::Embedding(_)));
        assert!(err.to_string().contains("Detalhe: quota exceeded"));
    }
}
