//! In-memory SQL executor for tests
//!
//! Tables are declared with their columns; statements are answered by canned
//! results keyed on a SQL fragment. Every executed statement is recorded.

use std::sync::Mutex;

use async_trait::async_trait;
use leia_core::{ColumnInfo, LeiaError, QueryTable, Result, SqlExecutor};

#[derive(Default)]
pub struct InMemoryExecutor {
    tables: Vec<(String, Vec<ColumnInfo>)>,
    responses: Vec<(String, QueryTable)>,
    unreachable: bool,
    executed: Mutex<Vec<String>>,
}

impl InMemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table and its `(column, type)` pairs in ordinal order
    pub fn with_table(mut self, name: &str, columns: &[(&str, &str)]) -> Self {
        let columns = columns
            .iter()
            .map(|(column, ty)| ColumnInfo::new(*column, *ty))
            .collect();
        self.tables.push((name.to_string(), columns));
        self
    }

    /// Answer statements containing `fragment`; the first registered match wins
    pub fn respond(mut self, fragment: &str, table: QueryTable) -> Self {
        self.responses.push((fragment.to_string(), table));
        self
    }

    /// Fail every call as if the server could not be reached
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Statements run so far
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable {
            return Err(LeiaError::Connection("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SqlExecutor for InMemoryExecutor {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        self.check_reachable()?;
        Ok(self.tables.iter().any(|(name, _)| name == table))
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.check_reachable()?;
        Ok(self
            .tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, columns)| columns.clone())
            .unwrap_or_default())
    }

    async fn list_tables(&self) -> Result<Vec<(String, String)>> {
        self.check_reachable()?;
        Ok(self
            .tables
            .iter()
            .map(|(name, _)| ("public".to_string(), name.clone()))
            .collect())
    }

    async fn query(&self, sql: &str) -> Result<QueryTable> {
        self.check_reachable()?;
        if let Ok(mut log) = self.executed.lock() {
            log.push(sql.to_string());
        }
        Ok(self
            .responses
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, table)| table.clone())
            .unwrap_or_default())
    }
}
