//! Table handlers
//!
//! One handler per business table. A handler receives the analysed question
//! and the resolved schema of its table, runs one or more statements and
//! returns either a finished sentence or a textual report for the RAG pass.

mod idle;
mod lines;
mod supplier_costs;
mod terms;
mod user_costs;

pub use idle::IdleLinesHandler;
pub use lines::LinesHandler;
pub use supplier_costs::SupplierCostsHandler;
pub use terms::TermsHandler;
pub use user_costs::UserCostsHandler;

use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use leia_core::{Cell, QueryTable, Result, SqlExecutor};
use serde::{Deserialize, Serialize};

use crate::extractor::Entities;
use crate::router::Intent;
use crate::schema::{ResolvedSchema, TableSpec};

/// What a handler produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum HandlerOutcome {
    /// A complete sentence for the user
    Answer(String),
    /// Raw tabular dump that still needs to be turned into prose
    Report(String),
}

impl HandlerOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Answer(text) | Self::Report(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Answer(text) | Self::Report(text) => text,
        }
    }

    pub fn is_report(&self) -> bool {
        matches!(self, Self::Report(_))
    }
}

/// Per-question input shared by all handlers
pub struct QueryContext<'a> {
    pub question: &'a str,
    /// Lower-cased question, for phrase checks
    pub lower: String,
    pub entities: &'a Entities,
    /// Reference date for "current month" and "last 3 months"
    pub today: NaiveDate,
    pub db: &'a dyn SqlExecutor,
}

impl<'a> QueryContext<'a> {
    pub fn new(
        question: &'a str,
        entities: &'a Entities,
        today: NaiveDate,
        db: &'a dyn SqlExecutor,
    ) -> Self {
        Self {
            question,
            lower: question.to_lowercase(),
            entities,
            today,
            db,
        }
    }

    pub fn mentions(&self, phrase: &str) -> bool {
        self.lower.contains(phrase)
    }

    /// `(year, month)` of `today`
    pub fn current_month(&self) -> (i32, u32) {
        (self.today.year(), self.today.month())
    }

    pub async fn fetch(&self, sql: &str) -> Result<QueryTable> {
        tracing::debug!(sql = %sql, "Executing statement");
        self.db.query(sql).await
    }
}

/// Answers questions about one table
#[async_trait]
pub trait TableHandler: Send + Sync {
    fn spec(&self) -> &'static TableSpec;

    async fn handle(&self, ctx: &QueryContext<'_>, schema: &ResolvedSchema)
        -> Result<HandlerOutcome>;
}

/// Handler responsible for an intent
pub fn handler_for(intent: Intent) -> &'static dyn TableHandler {
    match intent {
        Intent::Terms => &TermsHandler,
        Intent::UserCosts => &UserCostsHandler,
        Intent::IdleLines => &IdleLinesHandler,
        Intent::Lines => &LinesHandler,
        Intent::SupplierCosts => &SupplierCostsHandler,
    }
}

// ============================================================================
// Report assembly
// ============================================================================

/// Text report made of titled sections, closed by the elapsed time
pub(crate) struct Report {
    lines: Vec<String>,
    sections: usize,
    started: Instant,
}

impl Report {
    pub(crate) fn new() -> Self {
        Self {
            lines: Vec::new(),
            sections: 0,
            started: Instant::now(),
        }
    }

    /// Titled table; counts as data
    pub(crate) fn section(&mut self, title: impl fmt::Display, table: &QueryTable) {
        self.section_with_suffix(title, "", table);
    }

    /// Titled table with qualifiers after the closing marker
    pub(crate) fn section_with_suffix(
        &mut self,
        title: impl fmt::Display,
        suffix: &str,
        table: &QueryTable,
    ) {
        self.lines.push(format!("\n--- {title} ---{suffix}"));
        self.lines.push(table.to_text());
        self.sections += 1;
    }

    /// Titled free text; counts as data
    pub(crate) fn note(&mut self, title: impl fmt::Display, body: impl Into<String>) {
        self.lines.push(format!("\n--- {title} ---"));
        self.lines.push(body.into());
        self.sections += 1;
    }

    /// Header line that carries no data
    pub(crate) fn heading(&mut self, title: impl fmt::Display) {
        self.lines.push(format!("\n--- {title} ---"));
    }

    pub(crate) fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub(crate) fn has_data(&self) -> bool {
        self.sections > 0
    }

    pub(crate) fn finish(mut self) -> String {
        let elapsed = self.started.elapsed().as_secs_f64();
        self.lines
            .push(format!("\n--- TEMPO DE EXECUÇÃO: {elapsed:.2} segundos ---"));
        self.lines.join("\n")
    }
}

// ============================================================================
// Cell helpers
// ============================================================================

/// Text of a cell, or "N/A" for NULL and empty values
pub(crate) fn text_or_na(cell: Option<&Cell>) -> String {
    cell.and_then(Cell::as_text).unwrap_or_else(|| "N/A".to_string())
}

/// Number of a cell, zero when absent
pub(crate) fn number_or_zero(cell: Option<&Cell>) -> f64 {
    cell.and_then(Cell::as_f64).unwrap_or(0.0)
}

/// `MM/YYYY` from a date-ish cell (`2024-01-01`, `2024-01-01T00:00:00`, ...)
pub(crate) fn month_label(cell: Option<&Cell>) -> String {
    let Some(text) = cell.and_then(Cell::as_text) else {
        return "N/A".to_string();
    };
    let label = {
        let mut parts = text.split('-');
        match (parts.next(), parts.next()) {
            (Some(year), Some(month)) if year.len() == 4 => {
                month.get(..2).map(|mm| format!("{mm}/{year}"))
            }
            _ => None,
        }
    };
    label.unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_label() {
        assert_eq!(month_label(Some(&Cell::Text("2024-01-01".into()))), "01/2024");
        assert_eq!(
            month_label(Some(&Cell::Text("2023-12-01T00:00:00".into()))),
            "12/2023"
        );
        assert_eq!(month_label(Some(&Cell::Text("dez/2023".into()))), "dez/2023");
        assert_eq!(month_label(Some(&Cell::Null)), "N/A");
        assert_eq!(month_label(None), "N/A");
    }

    #[test]
    fn test_report_sections() {
        let mut report = Report::new();
        report.heading("INFORMAÇÕES");
        assert!(!report.has_data());

        let table = QueryTable::new(vec!["a".into()]).with_row(vec![Cell::Int(1)]);
        report.section("DADOS", &table);
        assert!(report.has_data());

        let text = report.finish();
        assert!(text.starts_with("\n--- INFORMAÇÕES ---"));
        assert!(text.contains("\n--- DADOS ---\na\n1"));
        assert!(text.contains("--- TEMPO DE EXECUÇÃO: "));
        assert!(text.ends_with(" segundos ---"));
    }

    #[test]
    fn test_outcome_text() {
        let answer = HandlerOutcome::Answer("ok".into());
        assert_eq!(answer.text(), "ok");
        assert!(!answer.is_report());
        assert!(HandlerOutcome::Report("x".into()).is_report());
    }

    #[test]
    fn test_handler_for_intent() {
        assert_eq!(handler_for(Intent::Lines).spec().name, "ia_linhas");
        assert_eq!(handler_for(Intent::IdleLines).spec().name, "ia_linhas_ociosas");
        assert_eq!(handler_for(Intent::Terms).spec().name, "ia_termos_numeros");
        assert_eq!(
            handler_for(Intent::UserCosts).spec().name,
            "ia_custo_usuarios_linhas"
        );
        assert_eq!(
            handler_for(Intent::SupplierCosts).spec().name,
            "ia_custo_fornecedor"
        );
    }
}
