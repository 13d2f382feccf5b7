//! LeIA Query - From a Portuguese question to database results
//!
//! The pipeline is: route the question to a table, extract entities, resolve
//! the table's columns from the catalog, build and run SQL, and hand back
//! either a finished sentence or a report for the RAG pass.
//!
//! Author: hephaex@gmail.com

pub mod extractor;
pub mod handlers;
pub mod postgres;
pub mod router;
pub mod schema;
pub mod sql;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use extractor::{Entities, EntityExtractor, LineStatus, Month, Period, TimeScope};
pub use handlers::{HandlerOutcome, QueryContext, TableHandler};
pub use postgres::PgExecutor;
pub use router::{route, Intent};

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use leia_core::{LeiaError, SqlExecutor};
use serde::Serialize;

use crate::schema::{TableSpec, SUPPLIER_COSTS};

/// Router and extractor output for one question
#[derive(Debug, Clone, Serialize)]
pub struct QuestionAnalysis {
    pub intent: Intent,
    pub entities: Entities,
}

/// Answers questions against the business tables
pub struct QueryEngine {
    db: Arc<dyn SqlExecutor>,
    extractor: EntityExtractor,
}

impl QueryEngine {
    pub fn new(db: Arc<dyn SqlExecutor>, extractor: EntityExtractor) -> Self {
        Self { db, extractor }
    }

    pub fn analyze(&self, question: &str) -> QuestionAnalysis {
        QuestionAnalysis {
            intent: route(question),
            entities: self.extractor.extract(question),
        }
    }

    /// Search with today's date as the reference month
    pub async fn search(&self, question: &str) -> HandlerOutcome {
        self.search_at(question, Local::now().date_naive()).await
    }

    /// Search relative to a fixed date.
    ///
    /// Never fails: database problems come back as Portuguese sentences.
    pub async fn search_at(&self, question: &str, today: NaiveDate) -> HandlerOutcome {
        let analysis = self.analyze(question);
        let handler = handlers::handler_for(analysis.intent);
        let spec = handler.spec();

        tracing::info!(
            intent = %analysis.intent,
            table = spec.name,
            client = analysis.entities.client.as_deref().unwrap_or("-"),
            "Routing question"
        );

        let result = async {
            let schema = schema::introspect(self.db.as_ref(), spec).await?;
            let ctx = QueryContext::new(question, &analysis.entities, today, self.db.as_ref());
            handler.handle(&ctx, &schema).await
        }
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(err) => HandlerOutcome::Answer(self.describe_failure(spec, err).await),
        }
    }

    async fn describe_failure(&self, spec: &'static TableSpec, err: LeiaError) -> String {
        match err {
            LeiaError::Connection(detail) => {
                tracing::warn!(table = spec.name, error = %detail, "Database unreachable");
                "Não foi possível conectar ao banco de dados.".to_string()
            }
            LeiaError::TableNotFound { table } => {
                tracing::warn!(table = %table, "Table missing");
                let mut lines = vec![
                    "\n--- ERRO: TABELA NÃO ENCONTRADA ---".to_string(),
                    format!("A tabela '{table}' não existe no banco de dados."),
                    "Verifique se:".to_string(),
                    "- O banco de dados está correto".to_string(),
                    "- A tabela foi criada".to_string(),
                    "- O nome da tabela está correto".to_string(),
                ];
                if spec.name == SUPPLIER_COSTS.name {
                    if let Ok(tables) = self.db.list_tables().await {
                        lines.push("\nTabelas disponíveis no banco:".to_string());
                        lines.extend(
                            tables
                                .iter()
                                .map(|(schema, name)| format!("- {schema}.{name}")),
                        );
                    }
                }
                lines.join("\n")
            }
            other => {
                tracing::warn!(table = spec.name, error = %other, "Search failed");
                format!("Erro durante a pesquisa de {}: {other}", spec.subject)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryExecutor;
    use leia_core::{Cell, QueryTable};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn engine(db: InMemoryExecutor) -> QueryEngine {
        QueryEngine::new(Arc::new(db), EntityExtractor::default())
    }

    #[test]
    fn test_analyze() {
        let analysis = engine(InMemoryExecutor::new())
            .analyze("Quantas linhas ociosas tem o cliente Safra?");
        assert_eq!(analysis.intent, Intent::IdleLines);
        assert_eq!(analysis.entities.client.as_deref(), Some("safra"));
    }

    #[tokio::test]
    async fn test_idle_question_end_to_end() {
        let db = InMemoryExecutor::new()
            .with_table(
                "ia_linhas_ociosas",
                &[
                    ("cliente", "character varying"),
                    ("operadora", "character varying"),
                    ("mes_referencia", "date"),
                ],
            )
            .respond(
                "COUNT(*)",
                QueryTable::new(vec!["total_ociosas".into()]).with_row(vec![Cell::Int(8)]),
            );
        let outcome = engine(db)
            .search_at("Quantas linhas ociosas o cliente Safra tem atualmente?", today())
            .await;
        assert_eq!(
            outcome,
            HandlerOutcome::Answer("O Cliente Safra possui atualmente 8 linhas ociosas.".into())
        );
    }

    #[tokio::test]
    async fn test_unreachable_database() {
        let outcome = engine(InMemoryExecutor::new().unreachable())
            .search_at("Quantas linhas ativas?", today())
            .await;
        assert_eq!(
            outcome.text(),
            "Não foi possível conectar ao banco de dados."
        );
    }

    #[tokio::test]
    async fn test_missing_table() {
        let outcome = engine(InMemoryExecutor::new())
            .search_at("Quantas linhas ativas?", today())
            .await;
        let text = outcome.text();
        assert!(text.contains("--- ERRO: TABELA NÃO ENCONTRADA ---"));
        assert!(text.contains("A tabela 'ia_linhas' não existe no banco de dados."));
        assert!(!text.contains("Tabelas disponíveis"));
    }

    #[tokio::test]
    async fn test_missing_supplier_table_lists_tables() {
        let db = InMemoryExecutor::new().with_table("ia_linhas", &[("cliente", "text")]);
        let outcome = engine(db)
            .search_at("Qual o fornecedor mais caro?", today())
            .await;
        let text = outcome.text();
        assert!(text.contains("A tabela 'ia_custo_fornecedor' não existe"));
        assert!(text.contains("Tabelas disponíveis no banco:\n- public.ia_linhas"));
    }

    #[tokio::test]
    async fn test_unmapped_column_is_reported() {
        let db = InMemoryExecutor::new()
            .with_table("ia_termos_numeros", &[("cliente", "text")]);
        let outcome = engine(db)
            .search_at("Quantas linhas sem termo o Safra possui?", today())
            .await;
        assert!(outcome
            .text()
            .starts_with("Erro durante a pesquisa de termos: "));
        assert!(outcome.text().contains("has_term"));
    }
}
