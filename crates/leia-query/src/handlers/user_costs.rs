//! Per-user costs (`ia_custo_usuarios_linhas`)

use async_trait::async_trait;
use leia_core::format::{format_currency, format_integer};
use leia_core::Result;

use super::{
    month_label, number_or_zero, text_or_na, HandlerOutcome, QueryContext, Report, TableHandler,
};
use crate::extractor::{last_three_months, TimeScope};
use crate::schema::{ResolvedSchema, Role, TableSpec, USER_COSTS};
use crate::sql::{self, quote_ident, ClientMatch, ClientScope, SelectQuery};

pub struct UserCostsHandler;

#[async_trait]
impl TableHandler for UserCostsHandler {
    fn spec(&self) -> &'static TableSpec {
        &USER_COSTS
    }

    async fn handle(
        &self,
        ctx: &QueryContext<'_>,
        schema: &ResolvedSchema,
    ) -> Result<HandlerOutcome> {
        let client = schema.column(Role::Client)?;
        let user = schema.column(Role::UserName)?;
        let cost = schema.column(Role::Cost)?;
        let month = schema.column(Role::ReferenceMonth)?;

        let scope = ClientScope::new(ctx.entities.client.as_deref(), ClientMatch::Exact);
        let costs = || {
            SelectQuery::from(USER_COSTS.name)
                .column_as(user, "nome_usuario")
                .column_as(cost, "total")
                .column_as(month, "mes_referencia")
                .filter(scope.predicate(client))
        };

        match TimeScope::detect(ctx.question, &ctx.entities.period) {
            TimeScope::CurrentMonth => {
                let (year, current) = ctx.current_month();
                let top = ctx
                    .fetch(
                        &costs()
                            .and(sql::month_filter(month, year, current))
                            .order_by_desc(cost)
                            .limit(1)
                            .build(),
                    )
                    .await?;

                if top.is_empty() {
                    return Ok(HandlerOutcome::Answer(format!(
                        "Não foram encontrados dados de custos para o Cliente {} no mês atual.",
                        scope.display()
                    )));
                }
                Ok(HandlerOutcome::Answer(format!(
                    "O Usuário {} possui o custo no valor de {} no mês atual ({current:02}/{year}).",
                    text_or_na(top.get(0, "nome_usuario")),
                    format_currency(number_or_zero(top.get(0, "total"))),
                )))
            }

            TimeScope::Month { year, month: m } => {
                let top = ctx
                    .fetch(
                        &costs()
                            .and(sql::month_filter(month, year, m.number))
                            .order_by_desc(cost)
                            .limit(1)
                            .build(),
                    )
                    .await?;

                if !top.is_empty() {
                    return Ok(HandlerOutcome::Answer(format!(
                        "O Usuário {} teve o custo no valor de {} no mês {}/{year}.",
                        text_or_na(top.get(0, "nome_usuario")),
                        format_currency(number_or_zero(top.get(0, "total"))),
                        m.padded(),
                    )));
                }

                self.diagnose(ctx, schema, &scope).await.map(|report| {
                    report.unwrap_or_else(|| {
                        HandlerOutcome::Answer(format!(
                            "Não foram encontrados dados de custos para o Cliente {} no mês {} de {year}.",
                            scope.display(),
                            m.name
                        ))
                    })
                })
            }

            TimeScope::LastThreeMonths => {
                let (start, end) = last_three_months(ctx.today);
                let top = ctx
                    .fetch(
                        &costs()
                            .and(sql::date_range_filter(month, start, end))
                            .order_by_desc(cost)
                            .limit(3)
                            .build(),
                    )
                    .await?;

                if top.is_empty() {
                    return Ok(HandlerOutcome::Answer(format!(
                        "Não foram encontrados dados de custos para o Cliente {} nos últimos 3 meses.",
                        scope.display()
                    )));
                }

                let users: Vec<String> = (0..top.len())
                    .map(|row| {
                        format!(
                            "{} {} no mês {}",
                            text_or_na(top.get(row, "nome_usuario")),
                            format_currency(number_or_zero(top.get(row, "total"))),
                            month_label(top.get(row, "mes_referencia")),
                        )
                    })
                    .collect();
                Ok(HandlerOutcome::Answer(format!(
                    "Nos últimos 3 meses os usuários que tiveram os maiores custos foram: {}.",
                    users.join("; ")
                )))
            }

            TimeScope::Unspecified => {
                let top = ctx
                    .fetch(
                        &costs()
                            .maybe_column_as(schema.get(Role::Operator), "operadora")
                            .order_by_desc(cost)
                            .limit(10)
                            .build(),
                    )
                    .await?;

                if top.is_empty() {
                    return Ok(HandlerOutcome::Answer(format!(
                        "Não foram encontrados dados de custos por usuários para o Cliente {}.",
                        scope.display()
                    )));
                }

                let mut report = Report::new();
                report.section(
                    format!("CUSTOS POR USUÁRIOS - CLIENTE {}", scope.heading()),
                    &top,
                );
                Ok(HandlerOutcome::Report(report.finish()))
            }
        }
    }
}

impl UserCostsHandler {
    /// What the table holds for the client when the requested month is empty.
    /// `None` when the client has no rows at all.
    async fn diagnose(
        &self,
        ctx: &QueryContext<'_>,
        schema: &ResolvedSchema,
        scope: &ClientScope,
    ) -> Result<Option<HandlerOutcome>> {
        let client = schema.column(Role::Client)?;
        let month = schema.column(Role::ReferenceMonth)?;
        let heading = scope.heading();
        let mut report = Report::new();

        let dates = ctx
            .fetch(
                &SelectQuery::from(USER_COSTS.name)
                    .expr(format!("DISTINCT {}", quote_ident(&month.name)))
                    .filter(scope.predicate(client))
                    .order_by_desc(month)
                    .limit(10)
                    .build(),
            )
            .await?;
        if !dates.is_empty() {
            report.section(format!("DATAS DISPONÍVEIS PARA {heading}"), &dates);
        }

        let records = ctx
            .fetch(
                &SelectQuery::from(USER_COSTS.name)
                    .expr("COUNT(*) AS total_registros")
                    .filter(scope.predicate(client))
                    .build(),
            )
            .await?;
        let total = number_or_zero(records.scalar());
        if total > 0.0 {
            report.note(
                format!("TOTAL DE REGISTROS PARA {heading} (TODOS OS MESES)"),
                format!("Total: {} registros", format_integer(total)),
            );
        }

        let sample = ctx
            .fetch(
                &SelectQuery::from(USER_COSTS.name)
                    .filter(scope.predicate(client))
                    .limit(5)
                    .build(),
            )
            .await?;
        if !sample.is_empty() {
            report.section(format!("AMOSTRA DOS DADOS PARA {heading}"), &sample);
        }

        Ok(report
            .has_data()
            .then(|| HandlerOutcome::Report(report.finish())))
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
            ("nome_usuario", "text"),
            ("operadora", "text"),
            ("total", "numeric"),
            ("mes_referencia", "date"),
        ]
        .iter()
        .map(|(n, t)| ColumnInfo::new(*n, *t))
        .collect();
        map_columns(&USER_COSTS, &columns)
    }

    fn cost_rows(rows: &[(&str, f64, &str)]) -> QueryTable {
        rows.iter().fold(
            QueryTable::new(vec![
                "nome_usuario".into(),
                "total".into(),
                "mes_referencia".into(),
            ]),
            |table, (user, total, month)| {
                table.with_row(vec![
                    Cell::Text(user.to_string()),
                    Cell::Float(*total),
                    Cell::Text(month.to_string()),
                ])
            },
        )
    }

    async fn run(db: &InMemoryExecutor, question: &str) -> HandlerOutcome {
        let entities = EntityExtractor::default().extract(question);
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let ctx = QueryContext::new(question, &entities, today, db);
        UserCostsHandler.handle(&ctx, &schema()).await.unwrap()
    }

    #[tokio::test]
    async fn test_current_month() {
        let db = InMemoryExecutor::new()
            .respond("LIMIT 1", cost_rows(&[("Maria Souza", 1234.5, "2024-03-01")]));
        let outcome = run(&db, "Qual usuário do cliente Safra teve maior custo no mês atual?").await;
        assert_eq!(
            outcome.text(),
            "O Usuário Maria Souza possui o custo no valor de R$ 1.234,50 no mês atual (03/2024)."
        );
        let executed = db.executed();
        assert!(executed[0].contains("\"cliente\" = 'Safra'"));
        assert!(executed[0].contains(">= DATE '2024-03-01'"));
    }

    #[tokio::test]
    async fn test_specific_month() {
        let db = InMemoryExecutor::new()
            .respond("LIMIT 1", cost_rows(&[("João", 99.9, "2023-12-01")]));
        let outcome = run(&db, "Qual usuário teve o maior custo em dezembro de 2023 no Safra?").await;
        assert_eq!(
            outcome,
            HandlerOutcome::Answer(
                "O Usuário João teve o custo no valor de R$ 99,90 no mês 12/2023.".into()
            )
        );
    }

    #[tokio::test]
    async fn test_specific_month_without_any_data() {
        let db = InMemoryExecutor::new();
        let outcome = run(&db, "Qual usuário teve o maior custo em dezembro de 2023 no Safra?").await;
        assert_eq!(
            outcome.text(),
            "Não foram encontrados dados de custos para o Cliente Safra no mês Dezembro de 2023."
        );
    }

    #[tokio::test]
    async fn test_specific_month_diagnostics() {
        let db = InMemoryExecutor::new().respond(
            "total_registros",
            QueryTable::new(vec!["total_registros".into()]).with_row(vec![Cell::Int(42)]),
        );
        let outcome = run(&db, "Qual usuário teve o maior custo em dezembro de 2023 no Safra?").await;
        assert!(outcome.is_report());
        assert!(outcome.text().contains("Total: 42 registros"));
    }

    #[tokio::test]
    async fn test_last_three_months() {
        let db = InMemoryExecutor::new().respond(
            "LIMIT 3",
            cost_rows(&[
                ("Ana", 500.0, "2024-02-01"),
                ("Bruno", 450.25, "2023-12-01T00:00:00"),
            ]),
        );
        let outcome = run(&db, "Quais usuários tiveram maior custo nos últimos 3 meses no Safra?").await;
        assert_eq!(
            outcome.text(),
            "Nos últimos 3 meses os usuários que tiveram os maiores custos foram: \
             Ana R$ 500,00 no mês 02/2024; Bruno R$ 450,25 no mês 12/2023."
        );
        let executed = db.executed();
        assert!(executed[0].contains(">= DATE '2023-12-01' AND \"mes_referencia\" < DATE '2024-03-01'"));
    }

    #[tokio::test]
    async fn test_general_report() {
        let db = InMemoryExecutor::new()
            .respond("LIMIT 10", cost_rows(&[("Ana", 500.0, "2024-02-01")]));
        let outcome = run(&db, "Custos por usuário do cliente Sonda").await;
        assert!(outcome.is_report());
        assert!(outcome.text().contains("--- CUSTOS POR USUÁRIOS - CLIENTE SONDA ---"));
        assert!(db.executed()[0].contains("\"operadora\" AS operadora"));
    }

    #[tokio::test]
    async fn test_general_without_data() {
        let db = InMemoryExecutor::new();
        let outcome = run(&db, "Custos por usuário").await;
        assert_eq!(
            outcome.text(),
            "Não foram encontrados dados de custos por usuários para o Cliente todos os clientes."
        );
    }
}
