//! Supplier costs (`ia_custo_fornecedor`)
//!
//! Also the fallback for questions the router could not place.

use async_trait::async_trait;
use leia_core::format::format_currency;
use leia_core::{ColumnInfo, Result};

use super::{number_or_zero, text_or_na, HandlerOutcome, QueryContext, Report, TableHandler};
use crate::schema::{ResolvedSchema, Role, TableSpec, SUPPLIER_COSTS};
use crate::sql::{self, quote_ident, ClientMatch, ClientScope, SelectQuery};

pub struct SupplierCostsHandler;

/// Columns needed to rank suppliers by cost
struct CostColumns<'a> {
    client: &'a ColumnInfo,
    supplier: &'a ColumnInfo,
    cost: &'a ColumnInfo,
    contract: Option<&'a ColumnInfo>,
}

impl CostColumns<'_> {
    /// Summed cost per client, supplier and (when present) contract type
    fn ranked(&self, scope: &ClientScope) -> SelectQuery {
        SelectQuery::from(SUPPLIER_COSTS.name)
            .column_as(self.client, "cliente")
            .column_as(self.supplier, "fornecedor")
            .expr(format!("SUM({}) AS custo_total", quote_ident(&self.cost.name)))
            .maybe_column_as(self.contract, "tipo_contrato")
            .filter(scope.predicate(self.client))
            .group_by(self.client)
            .group_by(self.supplier)
            .maybe_group_by(self.contract)
            .order_by("custo_total DESC")
    }
}

#[async_trait]
impl TableHandler for SupplierCostsHandler {
    fn spec(&self) -> &'static TableSpec {
        &SUPPLIER_COSTS
    }

    async fn handle(
        &self,
        ctx: &QueryContext<'_>,
        schema: &ResolvedSchema,
    ) -> Result<HandlerOutcome> {
        let client = schema.column(Role::Client)?;
        let month = schema.get(Role::ReferenceMonth);
        let costs = match (schema.get(Role::Supplier), schema.get(Role::Cost)) {
            (Some(supplier), Some(cost)) => Some(CostColumns {
                client,
                supplier,
                cost,
                contract: schema.get(Role::ContractType),
            }),
            _ => None,
        };

        let scope = ClientScope::new(ctx.entities.client.as_deref(), ClientMatch::Fuzzy);
        let period = ctx.entities.period.year_month();

        if let (Some((year, m)), Some(month), Some(costs)) = (period, month, &costs) {
            let top = ctx
                .fetch(
                    &costs
                        .ranked(&scope)
                        .and(sql::month_filter(month, year, m.number))
                        .limit(1)
                        .build(),
                )
                .await?;

            if !top.is_empty() {
                let who = top
                    .get(0, "cliente")
                    .and_then(|c| c.as_text())
                    .unwrap_or_else(|| scope.display());
                let contract = match top.get(0, "tipo_contrato") {
                    Some(cell) => format!(", tipo de contrato {}", text_or_na(Some(cell))),
                    None => String::new(),
                };
                return Ok(HandlerOutcome::Answer(format!(
                    "O Cliente {who}, o fornecedor com o maior custo no mês de {} de {year} é {}, \
                     com um custo total de {}{contract}.",
                    m.name,
                    text_or_na(top.get(0, "fornecedor")),
                    format_currency(number_or_zero(top.get(0, "custo_total"))),
                )));
            }
        }

        let heading = scope.heading();
        let mut report = Report::new();

        let (year, month_number, month_name) = ctx.entities.period.as_parts();
        report.heading("INFORMAÇÕES EXTRAÍDAS DA PERGUNTA");
        report.line(format!("Pergunta: {}", ctx.question));
        report.line(format!(
            "Ano extraído: {}",
            year.as_deref().unwrap_or("não identificado")
        ));
        report.line(format!(
            "Mês extraído: {} ({})",
            month_name.as_deref().unwrap_or("não identificado"),
            month_number.as_deref().unwrap_or("-")
        ));
        report.line(format!(
            "Cliente extraído: {}",
            ctx.entities.client.as_deref().unwrap_or("não identificado")
        ));

        if let (Some((year, m)), Some(month), Some(costs)) = (period, month, &costs) {
            let exact = ctx
                .fetch(
                    &SelectQuery::from(SUPPLIER_COSTS.name)
                        .column_as(client, "cliente")
                        .column_as(costs.supplier, "fornecedor")
                        .column_as(month, "mes_referencia")
                        .column_as(costs.cost, "custo")
                        .maybe_column_as(costs.contract, "tipo_contrato")
                        .filter(scope.predicate(client))
                        .and(sql::month_filter(month, year, m.number))
                        .order_by_desc(costs.cost)
                        .limit(10)
                        .build(),
                )
                .await?;
            if exact.is_empty() {
                report.heading(format!(
                    "NENHUM DADO ENCONTRADO PARA {} {year} - CLIENTE {heading}",
                    m.name
                ));
            } else {
                report.section(
                    format!("DADOS EXATOS PARA {} {year} - CLIENTE {heading}", m.name),
                    &exact,
                );
            }
        }

        if let Some(month) = month {
            let dates = ctx
                .fetch(
                    &SelectQuery::from(SUPPLIER_COSTS.name)
                        .expr(format!("DISTINCT {}", quote_ident(&month.name)))
                        .filter(scope.predicate(client))
                        .and(format!("AND {} IS NOT NULL", quote_ident(&month.name)))
                        .order_by_desc(month)
                        .limit(12)
                        .build(),
                )
                .await?;
            if !dates.is_empty() {
                report.section(format!("DATAS DISPONÍVEIS PARA {heading}"), &dates);
            }
        }

        if let Some(costs) = &costs {
            let totals = ctx.fetch(&costs.ranked(&scope).limit(10).build()).await?;
            if !totals.is_empty() {
                report.section(
                    format!("CUSTO TOTAL POR FORNECEDOR - CLIENTE {heading}"),
                    &totals,
                );
            }
        }

        let clients = ctx
            .fetch(
                &SelectQuery::from(SUPPLIER_COSTS.name)
                    .expr(format!("DISTINCT {}", quote_ident(&client.name)))
                    .filter(format!("{} IS NOT NULL", quote_ident(&client.name)))
                    .order_by(quote_ident(&client.name))
                    .limit(20)
                    .build(),
            )
            .await?;
        if !clients.is_empty() {
            report.section("CLIENTES DISPONÍVEIS NO BANCO", &clients);
        }

        if !report.has_data() {
            return Ok(HandlerOutcome::Answer(format!(
                "Não foram encontrados dados de custos para o Cliente {}.",
                scope.display()
            )));
        }

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
    use leia_core::{Cell, QueryTable};

    fn schema(with_contract: bool) -> ResolvedSchema {
        let mut columns = vec![
            ColumnInfo::new("cliente", "text"),
            ColumnInfo::new("fornecedor", "text"),
            ColumnInfo::new("mes_referencia", "date"),
            ColumnInfo::new("custo", "numeric"),
        ];
        if with_contract {
            columns.push(ColumnInfo::new("tipo_contrato", "text"));
        }
        map_columns(&SUPPLIER_COSTS, &columns)
    }

    async fn run(db: &InMemoryExecutor, question: &str, with_contract: bool) -> HandlerOutcome {
        let entities = EntityExtractor::default().extract(question);
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let ctx = QueryContext::new(question, &entities, today, db);
        SupplierCostsHandler
            .handle(&ctx, &schema(with_contract))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_top_supplier_sentence() {
        let top = QueryTable::new(vec![
            "cliente".into(),
            "fornecedor".into(),
            "custo_total".into(),
            "tipo_contrato".into(),
        ])
        .with_row(vec![
            Cell::Text("Safra".into()),
            Cell::Text("Vivo".into()),
            Cell::Float(1234567.89),
            Cell::Text("Móvel".into()),
        ]);
        let db = InMemoryExecutor::new().respond("LIMIT 1", top);
        let outcome = run(
            &db,
            "Qual o fornecedor com maior custo em janeiro de 2024 do cliente Safra?",
            true,
        )
        .await;
        assert_eq!(
            outcome.text(),
            "O Cliente Safra, o fornecedor com o maior custo no mês de Janeiro de 2024 é Vivo, \
             com um custo total de R$ 1.234.567,89, tipo de contrato Móvel."
        );

        let sql = &db.executed()[0];
        assert!(sql.contains("\"cliente\" ILIKE '%safra%'"));
        assert!(sql.contains("SUM(\"custo\") AS custo_total"));
        assert!(sql.contains("GROUP BY \"cliente\", \"fornecedor\", \"tipo_contrato\""));
        assert!(sql.contains(">= DATE '2024-01-01' AND \"mes_referencia\" < DATE '2024-02-01'"));
    }

    #[tokio::test]
    async fn test_top_supplier_without_contract_column() {
        let top = QueryTable::new(vec!["cliente".into(), "fornecedor".into(), "custo_total".into()])
            .with_row(vec![
                Cell::Text("Safra".into()),
                Cell::Text("Claro".into()),
                Cell::Float(10.0),
            ]);
        let db = InMemoryExecutor::new().respond("LIMIT 1", top);
        let outcome = run(&db, "Maior custo de fevereiro de 2024 do Safra", false).await;
        assert_eq!(
            outcome.text(),
            "O Cliente Safra, o fornecedor com o maior custo no mês de Fevereiro de 2024 é Claro, \
             com um custo total de R$ 10,00."
        );
    }

    #[tokio::test]
    async fn test_report_when_month_is_empty() {
        let totals = QueryTable::new(vec!["fornecedor".into(), "custo_total".into()])
            .with_row(vec![Cell::Text("Vivo".into()), Cell::Float(99.0)]);
        let db = InMemoryExecutor::new().respond("LIMIT 10", totals);
        let outcome = run(&db, "Custos de janeiro de 2030 do Safra", true).await;
        assert!(outcome.is_report());
        let text = outcome.text();
        assert!(text.contains("--- INFORMAÇÕES EXTRAÍDAS DA PERGUNTA ---"));
        assert!(text.contains("Mês extraído: Janeiro (01)"));
        assert!(text.contains("DADOS EXATOS PARA Janeiro 2030 - CLIENTE SAFRA"));
    }

    #[tokio::test]
    async fn test_nothing_found() {
        let db = InMemoryExecutor::new();
        let outcome = run(&db, "Qual o custo total?", true).await;
        assert_eq!(
            outcome,
            HandlerOutcome::Answer(
                "Não foram encontrados dados de custos para o Cliente todos os clientes.".into()
            )
        );
    }
}
