//! Line term status (`ia_termos_numeros`)

use async_trait::async_trait;
use leia_core::format::format_integer;
use leia_core::Result;

use super::{number_or_zero, text_or_na, HandlerOutcome, QueryContext, Report, TableHandler};
use crate::schema::{ResolvedSchema, Role, TableSpec, TERMS};
use crate::sql::{no_term_predicate, quote_ident, ClientMatch, ClientScope, SelectQuery};

pub struct TermsHandler;

/// Which of the term questions is being asked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TermsQuestion {
    ActiveByType,
    TotalByType,
    Count,
    Listing,
}

impl TermsQuestion {
    fn classify(lower: &str) -> Self {
        let has = |phrase: &str| lower.contains(phrase);

        if (has("linhas sem termos") && has("tipo de linha") && has("linhas ativas"))
            || (has("estão ativas") && has("tipo"))
        {
            Self::ActiveByType
        } else if (has("total de linhas sem termos") && has("tipo de linha"))
            || has("me mostre o total por tipo")
            || has("por tipo de linha")
        {
            Self::TotalByType
        } else if has("não possuem termo") || has("nao possuem termo") || has("sem termo") {
            Self::Count
        } else {
            Self::Listing
        }
    }
}

#[async_trait]
impl TableHandler for TermsHandler {
    fn spec(&self) -> &'static TableSpec {
        &TERMS
    }

    async fn handle(
        &self,
        ctx: &QueryContext<'_>,
        schema: &ResolvedSchema,
    ) -> Result<HandlerOutcome> {
        let client = schema.column(Role::Client)?;
        let scope = ClientScope::new(ctx.entities.client.as_deref(), ClientMatch::Exact);
        let display = scope.display();

        let question = TermsQuestion::classify(&ctx.lower);
        tracing::debug!(?question, "Classified terms question");

        let without_term = || -> Result<SelectQuery> {
            let has_term = schema.column(Role::HasTerm)?;
            Ok(SelectQuery::from(TERMS.name)
                .filter(scope.predicate(client))
                .and(format!("AND {}", no_term_predicate(has_term))))
        };

        match question {
            TermsQuestion::Listing => self.listing(ctx, schema, &scope).await,

            TermsQuestion::ActiveByType => {
                let line_type = schema.column(Role::LineType)?;
                let line_status = schema.column(Role::LineStatus)?;

                let total = ctx
                    .fetch(&without_term()?.expr("COUNT(*) AS total_sem_termo").build())
                    .await?;
                let total = number_or_zero(total.scalar());

                let status_col = quote_ident(&line_status.name);
                let active = ctx
                    .fetch(
                        &without_term()?
                            .column_as(line_type, "tipo_linha")
                            .column_as(line_status, "status_linha")
                            .expr("COUNT(*) AS total_ativas")
                            .and(format!(
                                "AND ({status_col} ILIKE '%ATIVA%' OR {status_col} ILIKE '%ATIVO%')"
                            ))
                            .group_by(line_type)
                            .group_by(line_status)
                            .order_by("total_ativas DESC")
                            .build(),
                    )
                    .await?;

                if active.is_empty() {
                    return Ok(HandlerOutcome::Answer(format!(
                        "O Cliente {display} possui {} linhas sem termos, mas nenhuma está ativa.",
                        format_integer(total)
                    )));
                }

                // several status spellings per type collapse into one entry
                let mut per_type: Vec<(String, f64)> = Vec::new();
                for row in 0..active.len() {
                    let kind = text_or_na(active.get(row, "tipo_linha"));
                    let count = number_or_zero(active.get(row, "total_ativas"));
                    match per_type.iter_mut().find(|(k, _)| *k == kind) {
                        Some((_, sum)) => *sum += count,
                        None => per_type.push((kind, count)),
                    }
                }

                let details: Vec<String> = per_type
                    .iter()
                    .map(|(kind, count)| {
                        format!(
                            "{} linhas que estão Ativas são do tipo {kind}",
                            format_integer(*count)
                        )
                    })
                    .collect();
                Ok(HandlerOutcome::Answer(format!(
                    "O Cliente {display} possui {} linhas sem termos e {}.",
                    format_integer(total),
                    details.join(", ")
                )))
            }

            TermsQuestion::TotalByType => {
                let line_type = schema.column(Role::LineType)?;
                let by_type = ctx
                    .fetch(
                        &without_term()?
                            .column_as(line_type, "tipo_linha")
                            .expr("COUNT(*) AS total_sem_termo")
                            .group_by(line_type)
                            .order_by("total_sem_termo DESC")
                            .build(),
                    )
                    .await?;

                if by_type.is_empty() {
                    return Ok(HandlerOutcome::Answer(format!(
                        "O Cliente {display} possui 0 linhas sem termos."
                    )));
                }

                let details: Vec<String> = (0..by_type.len())
                    .map(|row| {
                        format!(
                            "{} linhas são do tipo {}",
                            format_integer(number_or_zero(by_type.get(row, "total_sem_termo"))),
                            text_or_na(by_type.get(row, "tipo_linha"))
                        )
                    })
                    .collect();
                Ok(HandlerOutcome::Answer(format!(
                    "O Cliente {display} possui {} linhas sem termos, sendo que {}.",
                    format_integer(by_type.sum("total_sem_termo")),
                    details.join(", ")
                )))
            }

            TermsQuestion::Count => {
                let total = ctx
                    .fetch(&without_term()?.expr("COUNT(*) AS total_sem_termo").build())
                    .await?;
                Ok(HandlerOutcome::Answer(format!(
                    "O Cliente {display} possui {} linhas sem termos.",
                    format_integer(number_or_zero(total.scalar()))
                )))
            }
        }
    }
}

impl TermsHandler {
    async fn listing(
        &self,
        ctx: &QueryContext<'_>,
        schema: &ResolvedSchema,
        scope: &ClientScope,
    ) -> Result<HandlerOutcome> {
        let client = schema.column(Role::Client)?;
        let rows = ctx
            .fetch(
                &SelectQuery::from(TERMS.name)
                    .column_as(client, "cliente")
                    .maybe_column_as(schema.get(Role::LineNumber), "numero_linha")
                    .maybe_column_as(schema.get(Role::LineType), "tipo_linha")
                    .maybe_column_as(schema.get(Role::HasTerm), "possui_termo")
                    .maybe_column_as(schema.get(Role::TermStatus), "status_termo")
                    .maybe_column_as(schema.get(Role::TermType), "tipo_termo")
                    .filter(scope.predicate(client))
                    .limit(10)
                    .build(),
            )
            .await?;

        if rows.is_empty() {
            return Ok(HandlerOutcome::Answer(format!(
                "Não foram encontrados dados de termos para o Cliente {}.",
                scope.display()
            )));
        }

        let mut report = Report::new();
        report.section(format!("DADOS DE TERMOS - CLIENTE {}", scope.heading()), &rows);
        Ok(HandlerOutcome::Report(report.finish()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::EntityExtractor;
    use crate::schema::map_columns;
    use crate::testing::InMemoryExecutor;
    use chrono::NaiveDate;
    use leia_core::{Cell, ColumnInfo, QueryTable};

    fn schema() -> ResolvedSchema {
        let columns: Vec<ColumnInfo> = [
            ("cliente", "text"),
            ("numero_linha", "text"),
            ("status_linha", "text"),
            ("tipo_linha", "text"),
            ("possui_termo", "text"),
            ("status_termo", "text"),
            ("tipo_termo", "text"),
        ]
        .iter()
        .map(|(n, t)| ColumnInfo::new(*n, *t))
        .collect();
        map_columns(&TERMS, &columns)
    }

    fn count(column: &str, value: i64) -> QueryTable {
        QueryTable::new(vec![column.into()]).with_row(vec![Cell::Int(value)])
    }

    async fn run(db: &InMemoryExecutor, question: &str) -> HandlerOutcome {
        let entities = EntityExtractor::default().extract(question);
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let ctx = QueryContext::new(question, &entities, today, db);
        TermsHandler.handle(&ctx, &schema()).await.unwrap()
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            TermsQuestion::classify(
                "quantas linhas sem termos por tipo de linha e quantas linhas ativas?"
            ),
            TermsQuestion::ActiveByType
        );
        assert_eq!(
            TermsQuestion::classify("me mostre o total por tipo"),
            TermsQuestion::TotalByType
        );
        assert_eq!(
            TermsQuestion::classify("quantas linhas não possuem termo?"),
            TermsQuestion::Count
        );
        assert_eq!(TermsQuestion::classify("termos do safra"), TermsQuestion::Listing);
    }

    #[tokio::test]
    async fn test_count() {
        let db = InMemoryExecutor::new().respond("total_sem_termo", count("total_sem_termo", 1523));
        let outcome = run(&db, "Quantas linhas não possuem termo no cliente Safra?").await;
        assert_eq!(
            outcome,
            HandlerOutcome::Answer("O Cliente Safra possui 1.523 linhas sem termos.".into())
        );
        let sql = &db.executed()[0];
        assert!(sql.contains("\"cliente\" = 'Safra'"));
        assert!(sql.contains("AND (\"possui_termo\" = 'N' OR"));
    }

    #[tokio::test]
    async fn test_total_by_type() {
        let by_type = QueryTable::new(vec!["tipo_linha".into(), "total_sem_termo".into()])
            .with_row(vec![Cell::Text("Dados".into()), Cell::Int(10)])
            .with_row(vec![Cell::Null, Cell::Int(2)]);
        let db = InMemoryExecutor::new().respond("GROUP BY", by_type);
        let outcome = run(&db, "Me mostre o total por tipo das linhas sem termo do Safra").await;
        assert_eq!(
            outcome.text(),
            "O Cliente Safra possui 12 linhas sem termos, sendo que 10 linhas são do tipo Dados, \
             2 linhas são do tipo N/A."
        );
    }

    #[tokio::test]
    async fn test_active_by_type_groups_statuses() {
        let active = QueryTable::new(vec![
            "tipo_linha".into(),
            "status_linha".into(),
            "total_ativas".into(),
        ])
        .with_row(vec![Cell::Text("Voz".into()), Cell::Text("ATIVA".into()), Cell::Int(5)])
        .with_row(vec![Cell::Text("Dados".into()), Cell::Text("ATIVA".into()), Cell::Int(3)])
        .with_row(vec![Cell::Text("Voz".into()), Cell::Text("Ativo".into()), Cell::Int(1)]);
        let db = InMemoryExecutor::new()
            .respond("total_ativas", active)
            .respond("total_sem_termo", count("total_sem_termo", 20));
        let outcome = run(
            &db,
            "Das linhas sem termos do Safra, quantas estão ativas por tipo?",
        )
        .await;
        assert_eq!(
            outcome.text(),
            "O Cliente Safra possui 20 linhas sem termos e 6 linhas que estão Ativas são do tipo Voz, \
             3 linhas que estão Ativas são do tipo Dados."
        );
    }

    #[tokio::test]
    async fn test_active_by_type_none_active() {
        let db = InMemoryExecutor::new().respond("total_sem_termo", count("total_sem_termo", 4));
        let outcome = run(&db, "Quais estão ativas por tipo no termo do Safra?").await;
        assert_eq!(
            outcome.text(),
            "O Cliente Safra possui 4 linhas sem termos, mas nenhuma está ativa."
        );
    }

    #[tokio::test]
    async fn test_listing() {
        let rows = QueryTable::new(vec!["cliente".into(), "numero_linha".into()])
            .with_row(vec![Cell::Text("Safra".into()), Cell::Text("11999990000".into())]);
        let db = InMemoryExecutor::new().respond("LIMIT 10", rows);
        let outcome = run(&db, "Mostre os termos do Safra").await;
        assert!(outcome.is_report());
        assert!(outcome.text().contains("--- DADOS DE TERMOS - CLIENTE SAFRA ---"));
    }
}
