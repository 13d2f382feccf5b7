//! Idle lines (`ia_linhas_ociosas`)
//!
//! One row per idle line, so every figure here is a `COUNT(*)`.

use async_trait::async_trait;
use leia_core::format::format_integer;
use leia_core::Result;

use super::{number_or_zero, text_or_na, HandlerOutcome, QueryContext, Report, TableHandler};
use crate::extractor::{last_three_months, TimeScope};
use crate::schema::{ResolvedSchema, Role, TableSpec, IDLE_LINES};
use crate::sql::{self, ClientMatch, ClientScope, SelectQuery};

pub struct IdleLinesHandler;

fn idle_lines(count: f64) -> String {
    if count == 1.0 {
        "1 linha ociosa".to_string()
    } else {
        format!("{} linhas ociosas", format_integer(count))
    }
}

async fn count(ctx: &QueryContext<'_>, query: SelectQuery) -> Result<f64> {
    let table = ctx
        .fetch(&query.expr("COUNT(*) AS total_ociosas").build())
        .await?;
    Ok(number_or_zero(table.scalar()))
}

#[async_trait]
impl TableHandler for IdleLinesHandler {
    fn spec(&self) -> &'static TableSpec {
        &IDLE_LINES
    }

    async fn handle(
        &self,
        ctx: &QueryContext<'_>,
        schema: &ResolvedSchema,
    ) -> Result<HandlerOutcome> {
        let client = schema.column(Role::Client)?;
        let scope = ClientScope::new(ctx.entities.client.as_deref(), ClientMatch::Exact);
        let display = scope.display();
        let idle = || SelectQuery::from(IDLE_LINES.name).filter(scope.predicate(client));

        if ctx.mentions("operadora") {
            let operator = schema.column(Role::Operator)?;
            let month = schema.column(Role::ReferenceMonth)?;
            let (year, current) = ctx.current_month();

            let per_operator = ctx
                .fetch(
                    &idle()
                        .column_as(operator, "operadora")
                        .expr("COUNT(*) AS total_ociosas")
                        .and(sql::month_filter(month, year, current))
                        .group_by(operator)
                        .order_by("total_ociosas DESC")
                        .build(),
                )
                .await?;

            if per_operator.is_empty() {
                return Ok(HandlerOutcome::Answer(format!(
                    "O Cliente {display} não possui linhas ociosas atualmente."
                )));
            }

            let parts: Vec<String> = (0..per_operator.len())
                .map(|row| {
                    format!(
                        "{}, Operadora {}",
                        idle_lines(number_or_zero(per_operator.get(row, "total_ociosas"))),
                        text_or_na(per_operator.get(row, "operadora"))
                    )
                })
                .collect();
            return Ok(HandlerOutcome::Answer(format!(
                "O Cliente {display} possui atualmente {}.",
                parts.join(", ")
            )));
        }

        match TimeScope::detect(ctx.question, &ctx.entities.period) {
            TimeScope::CurrentMonth => {
                let month = schema.column(Role::ReferenceMonth)?;
                let (year, current) = ctx.current_month();
                let total = count(ctx, idle().and(sql::month_filter(month, year, current))).await?;
                Ok(HandlerOutcome::Answer(format!(
                    "O Cliente {display} possui atualmente {}.",
                    idle_lines(total)
                )))
            }

            TimeScope::Month { year, month: m } => {
                let month = schema.column(Role::ReferenceMonth)?;
                let total = count(ctx, idle().and(sql::month_filter(month, year, m.number))).await?;
                Ok(HandlerOutcome::Answer(format!(
                    "O Cliente {display} possuiu em {} de {year} {}.",
                    m.name,
                    idle_lines(total)
                )))
            }

            TimeScope::LastThreeMonths => {
                let month = schema.column(Role::ReferenceMonth)?;
                let (start, end) = last_three_months(ctx.today);
                let total = count(ctx, idle().and(sql::date_range_filter(month, start, end))).await?;
                Ok(HandlerOutcome::Answer(format!(
                    "O Cliente {display} possuiu nos últimos 3 meses {} linhas ociosas.",
                    format_integer(total)
                )))
            }

            TimeScope::Unspecified => {
                let sample = ctx.fetch(&idle().limit(5).build()).await?;
                if sample.is_empty() {
                    return Ok(HandlerOutcome::Answer(
                        "Nenhum resultado encontrado na tabela ia_linhas_ociosas para a pesquisa."
                            .to_string(),
                    ));
                }
                let mut report = Report::new();
                report.section("AMOSTRA DOS DADOS (PRIMEIRAS 5 LINHAS)", &sample);
                Ok(HandlerOutcome::Report(report.finish()))
            }
        }
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
            ("operadora", "text"),
            ("numero", "text"),
            ("mes_referencia", "character varying"),
        ]
        .iter()
        .map(|(n, t)| ColumnInfo::new(*n, *t))
        .collect();
        map_columns(&IDLE_LINES, &columns)
    }

    fn total(value: i64) -> QueryTable {
        QueryTable::new(vec!["total_ociosas".into()]).with_row(vec![Cell::Int(value)])
    }

    async fn run(db: &InMemoryExecutor, question: &str) -> HandlerOutcome {
        let entities = EntityExtractor::default().extract(question);
        let today = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let ctx = QueryContext::new(question, &entities, today, db);
        IdleLinesHandler.handle(&ctx, &schema()).await.unwrap()
    }

    #[tokio::test]
    async fn test_current_month() {
        let db = InMemoryExecutor::new().respond("total_ociosas", total(37));
        let outcome = run(&db, "Quantas linhas ociosas o cliente Safra possui atualmente?").await;
        assert_eq!(
            outcome,
            HandlerOutcome::Answer("O Cliente Safra possui atualmente 37 linhas ociosas.".into())
        );
        let sql = &db.executed()[0];
        assert!(sql.contains("\"cliente\" = 'Safra'"));
        assert!(sql.contains("\"mes_referencia\"::text ILIKE '%2024-05%'"));
    }

    #[tokio::test]
    async fn test_singular() {
        let db = InMemoryExecutor::new().respond("total_ociosas", total(1));
        let outcome = run(&db, "Quantas linhas ociosas o Sonda possuiu em março de 2024?").await;
        assert_eq!(
            outcome.text(),
            "O Cliente Sonda possuiu em Março de 2024 1 linha ociosa."
        );
    }

    #[tokio::test]
    async fn test_last_three_months() {
        let db = InMemoryExecutor::new().respond("total_ociosas", total(1262));
        let outcome = run(&db, "Quantas linhas ociosas o Safra teve nos últimos 3 meses?").await;
        assert_eq!(
            outcome.text(),
            "O Cliente Safra possuiu nos últimos 3 meses 1.262 linhas ociosas."
        );
        let sql = &db.executed()[0];
        assert!(sql.contains("\"mes_referencia\"::text >= '2024-02-01'"));
        assert!(sql.contains("\"mes_referencia\"::text < '2024-05-01'"));
    }

    #[tokio::test]
    async fn test_per_operator() {
        let rows = QueryTable::new(vec!["operadora".into(), "total_ociosas".into()])
            .with_row(vec![Cell::Text("Vivo".into()), Cell::Int(12)])
            .with_row(vec![Cell::Text("Claro".into()), Cell::Int(1)]);
        let db = InMemoryExecutor::new().respond("GROUP BY", rows);
        let outcome = run(&db, "Quantas linhas ociosas por operadora o Safra tem atualmente?").await;
        assert_eq!(
            outcome.text(),
            "O Cliente Safra possui atualmente 12 linhas ociosas, Operadora Vivo, \
             1 linha ociosa, Operadora Claro."
        );
    }

    #[tokio::test]
    async fn test_per_operator_empty() {
        let db = InMemoryExecutor::new();
        let outcome = run(&db, "Linhas ociosas por operadora do Safra").await;
        assert_eq!(
            outcome.text(),
            "O Cliente Safra não possui linhas ociosas atualmente."
        );
    }

    #[tokio::test]
    async fn test_sample_or_nothing() {
        let db = InMemoryExecutor::new();
        let outcome = run(&db, "Linhas ociosas do Safra").await;
        assert_eq!(
            outcome.text(),
            "Nenhum resultado encontrado na tabela ia_linhas_ociosas para a pesquisa."
        );
    }
}
