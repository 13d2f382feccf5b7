//! Line inventory (`ia_linhas`)

use async_trait::async_trait;
use leia_core::format::format_integer;
use leia_core::Result;

use super::{HandlerOutcome, QueryContext, Report, TableHandler};
use crate::schema::{ResolvedSchema, Role, TableSpec, LINES};
use crate::sql::{self, quote_ident, ClientMatch, ClientScope, SelectQuery};

pub struct LinesHandler;

#[async_trait]
impl TableHandler for LinesHandler {
    fn spec(&self) -> &'static TableSpec {
        &LINES
    }

    async fn handle(
        &self,
        ctx: &QueryContext<'_>,
        schema: &ResolvedSchema,
    ) -> Result<HandlerOutcome> {
        let client = schema.column(Role::Client)?;
        let supplier = schema.column(Role::Supplier)?;
        let status = schema.column(Role::LicenseStatus)?;
        let month = schema.column(Role::ReferenceMonth)?;
        let count = schema.column(Role::LineCount)?;
        let contract = schema.get(Role::ContractType);

        let scope = ClientScope::new(ctx.entities.client.as_deref(), ClientMatch::Fuzzy);
        let status_filter = ctx
            .entities
            .status
            .map(|s| sql::status_filter(status, s))
            .unwrap_or_default();
        let month_filter = ctx
            .entities
            .period
            .year_month()
            .map(|(year, m)| sql::month_filter(month, year, m.number))
            .unwrap_or_default();

        let filtered = |query: SelectQuery| {
            query
                .filter(scope.predicate(client))
                .and(status_filter.as_str())
                .and(month_filter.as_str())
        };
        let base_columns = |query: SelectQuery| {
            query
                .column_as(client, "cliente")
                .column_as(supplier, "fornecedor")
                .column_as(status, "status_licenca")
                .column_as(month, "mes_referencia")
                .column_as(count, "total_linhas")
        };

        let mut report = Report::new();

        let raw = ctx
            .fetch(
                &filtered(base_columns(SelectQuery::from(LINES.name)))
                    .order_by_desc(count)
                    .limit(20)
                    .build(),
            )
            .await?;
        if !raw.is_empty() {
            report.section(format!("DADOS BRUTOS - CLIENTE {}", scope.heading()), &raw);
            report.line(format!(
                "\n--- TOTAL CALCULADO: {} linhas ---",
                format_integer(raw.sum("total_linhas"))
            ));
        }

        let per_supplier = ctx
            .fetch(
                &filtered(
                    base_columns(SelectQuery::from(LINES.name))
                        .maybe_column_as(contract, "tipo_contrato"),
                )
                .order_by_desc(count)
                .limit(10)
                .build(),
            )
            .await?;
        if !per_supplier.is_empty() {
            let mut suffix = String::new();
            if let Some(s) = ctx.entities.status {
                suffix.push_str(&format!(" STATUS {}", s.as_str().to_uppercase()));
            }
            if let Some((year, m)) = ctx.entities.period.year_month() {
                suffix.push_str(&format!(" MÊS {} {year}", m.name));
            }
            report.section_with_suffix(
                format!("LINHAS POR FORNECEDOR - CLIENTE {}", scope.heading()),
                &suffix,
                &per_supplier,
            );
        }

        let total = ctx
            .fetch(
                &filtered(
                    SelectQuery::from(LINES.name)
                        .expr(format!("SUM({}) AS total_geral", quote_ident(&count.name))),
                )
                .build(),
            )
            .await?;
        if let Some(value) = total.scalar().and_then(|c| c.as_f64()) {
            report.line(format!(
                "\n--- TOTAL GERAL (USANDO SUM): {} linhas ---",
                format_integer(value)
            ));
        }

        let by_contract = filtered(
            SelectQuery::from(LINES.name)
                .column_as(supplier, "fornecedor")
                .column_as(count, "total_linhas")
                .maybe_column_as(contract, "tipo_contrato"),
        );
        let by_contract = if ctx.mentions("atual") {
            let latest = filtered(
                SelectQuery::from(LINES.name)
                    .expr(format!("MAX({})", quote_ident(&month.name))),
            )
            .build();
            by_contract.and(format!("AND {} = ({latest})", quote_ident(&month.name)))
        } else {
            by_contract.and(format!("AND {} > 0", quote_ident(&count.name)))
        };
        let by_contract = ctx.fetch(&by_contract.order_by_desc(count).build()).await?;
        if !by_contract.is_empty() {
            report.section("LINHAS POR FORNECEDOR E TIPO DE CONTRATO", &by_contract);
        }

        let sample = ctx
            .fetch(&filtered(SelectQuery::from(LINES.name)).limit(5).build())
            .await?;
        if !sample.is_empty() {
            report.section("AMOSTRA DOS DADOS (PRIMEIRAS 5 LINHAS)", &sample);
        }

        if !report.has_data() {
            return Ok(HandlerOutcome::Answer(
                "Nenhum resultado encontrado na tabela ia_linhas para a pesquisa.".to_string(),
            ));
        }

        Ok(HandlerOutcome::Report(report.finish()))
    }
}
