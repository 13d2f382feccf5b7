//! SQL construction
//!
//! Statements are assembled as text from catalog-resolved identifiers and
//! extracted values. Identifiers are always double-quoted and literals are
//! single-quoted with embedded quotes doubled.

use chrono::NaiveDate;
use leia_core::ColumnInfo;

use crate::extractor::LineStatus;

/// Quote an identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn ident(column: &ColumnInfo) -> String {
    quote_ident(&column.name)
}

/// First day of the month and first day of the following month
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    Some((start, end))
}

/// Filter fragment restricting a reference-month column to one month.
///
/// Calendar columns get a half-open date range; anything else is matched
/// as text against `YYYY-MM`.
pub fn month_filter(column: &ColumnInfo, year: i32, month: u32) -> String {
    let col = ident(column);
    match month_bounds(year, month) {
        Some((start, end)) if column.is_date_like() => format!(
            "AND {col} >= DATE '{}' AND {col} < DATE '{}'",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        ),
        _ => format!("AND {col}::text ILIKE '%{year:04}-{month:02}%'"),
    }
}

/// Filter fragment for `[start, end)`; text columns compare as ISO text
pub fn date_range_filter(column: &ColumnInfo, start: NaiveDate, end: NaiveDate) -> String {
    let col = ident(column);
    let (start, end) = (start.format("%Y-%m-%d"), end.format("%Y-%m-%d"));
    if column.is_date_like() {
        format!("AND {col} >= DATE '{start}' AND {col} < DATE '{end}'")
    } else {
        format!("AND {col}::text >= '{start}' AND {col}::text < '{end}'")
    }
}

/// Case-insensitive status filter fragment
pub fn status_filter(column: &ColumnInfo, status: LineStatus) -> String {
    format!("AND {} ILIKE '%{}%'", ident(column), status.as_str())
}

/// Rows whose "has term" flag is negative or missing
pub fn no_term_predicate(column: &ColumnInfo) -> String {
    let col = ident(column);
    format!(
        "({col} = 'N' OR {col} = 'Não' OR {col} = 'NAO' OR {col} = 'NÃO' OR {col} IS NULL OR {col} = '')"
    )
}

/// How a client name is compared against the client column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMatch {
    /// `ILIKE '%name%'`
    Fuzzy,
    /// `= 'Name'` with the first letter capitalised
    Exact,
}

/// The client a handler is restricted to, if any
#[derive(Debug, Clone)]
pub struct ClientScope {
    client: Option<String>,
    mode: ClientMatch,
}

impl ClientScope {
    pub fn new(client: Option<&str>, mode: ClientMatch) -> Self {
        let client = client.map(|c| match mode {
            ClientMatch::Exact => capitalize_first(c),
            ClientMatch::Fuzzy => c.to_string(),
        });
        Self { client, mode }
    }

    /// Predicate for the WHERE clause; all non-null clients when unscoped
    pub fn predicate(&self, column: &ColumnInfo) -> String {
        let col = ident(column);
        match (&self.client, self.mode) {
            (Some(name), ClientMatch::Exact) => format!("{col} = {}", quote_literal(name)),
            (Some(name), ClientMatch::Fuzzy) => {
                format!("{col} ILIKE {}", quote_literal(&format!("%{name}%")))
            }
            (None, _) => format!("{col} IS NOT NULL"),
        }
    }

    /// Name used in sentences
    pub fn display(&self) -> String {
        match &self.client {
            Some(name) => capitalize_first(name),
            None => "todos os clientes".to_string(),
        }
    }

    /// Name used in report headers
    pub fn heading(&self) -> String {
        self.display().to_uppercase()
    }

    pub fn is_scoped(&self) -> bool {
        self.client.is_some()
    }
}

fn capitalize_first(value: &str) -> String {
    let lower = value.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A SELECT statement assembled clause by clause
#[derive(Debug, Clone)]
pub struct SelectQuery {
    table: String,
    columns: Vec<String>,
    predicate: Option<String>,
    filters: Vec<String>,
    group_by: Vec<String>,
    order_by: Option<String>,
    limit: Option<usize>,
}

impl SelectQuery {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            predicate: None,
            filters: Vec::new(),
            group_by: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Raw select expression
    pub fn expr(mut self, expr: impl Into<String>) -> Self {
        self.columns.push(expr.into());
        self
    }

    /// `"column" AS alias`
    pub fn column_as(self, column: &ColumnInfo, alias: &str) -> Self {
        let expr = format!("{} AS {alias}", ident(column));
        self.expr(expr)
    }

    /// Optional column, skipped when the role did not resolve
    pub fn maybe_column_as(self, column: Option<&ColumnInfo>, alias: &str) -> Self {
        match column {
            Some(column) => self.column_as(column, alias),
            None => self,
        }
    }

    /// Main WHERE predicate
    pub fn filter(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    /// Additional `AND ...` fragment; empty fragments are ignored
    pub fn and(mut self, fragment: impl Into<String>) -> Self {
        let fragment = fragment.into();
        if !fragment.trim().is_empty() {
            self.filters.push(fragment);
        }
        self
    }

    pub fn group_by(mut self, column: &ColumnInfo) -> Self {
        self.group_by.push(ident(column));
        self
    }

    pub fn maybe_group_by(self, column: Option<&ColumnInfo>) -> Self {
        match column {
            Some(column) => self.group_by(column),
            None => self,
        }
    }

    /// ORDER BY a raw expression (alias or quoted column)
    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_by = Some(expr.into());
        self
    }

    pub fn order_by_desc(self, column: &ColumnInfo) -> Self {
        let expr = format!("{} DESC", ident(column));
        self.order_by(expr)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn build(&self) -> String {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };

        let mut sql = format!("SELECT {columns}\nFROM {}", self.table);
        if let Some(predicate) = &self.predicate {
            sql.push_str(&format!("\nWHERE {predicate}"));
        }
        for fragment in &self.filters {
            sql.push('\n');
            sql.push_str(fragment);
        }
        if !self.group_by.is_empty() {
            sql.push_str(&format!("\nGROUP BY {}", self.group_by.join(", ")));
        }
        if let Some(order) = &self.order_by {
            sql.push_str(&format!("\nORDER BY {order}"));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!("\nLIMIT {limit}"));
        }
        sql
    }
}
