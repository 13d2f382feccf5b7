//! PostgreSQL executor
//!
//! Statements are wrapped in `row_to_json` so that any result shape decodes
//! into a [`QueryTable`] without knowing its column types up front. Every
//! pooled connection gets the configured `statement_timeout` when it opens.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use leia_core::{ColumnInfo, DatabaseConfig, LeiaError, QueryTable, Result, SqlExecutor};
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use sqlx::{Executor, Row};

/// [`SqlExecutor`] over a sqlx connection pool
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    /// Connection options from the DB_* settings
    pub fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions> {
        let ssl_mode = PgSslMode::from_str(&config.sslmode).map_err(|e| {
            LeiaError::Config(format!("invalid sslmode '{}': {e}", config.sslmode))
        })?;

        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .ssl_mode(ssl_mode);
        if let Some(password) = &config.password {
            options = options.password(password);
        }
        Ok(options)
    }

    fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
        let timeout = format!("SET statement_timeout TO '{}ms'", config.statement_timeout_ms);

        PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .after_connect(move |conn, _meta| {
                let statement = timeout.clone();
                Box::pin(async move {
                    conn.execute(statement.as_str()).await?;
                    Ok(())
                })
            })
    }

    /// Build the pool without opening a connection; failures surface on first use
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self> {
        let pool = Self::pool_options(config).connect_lazy_with(Self::connect_options(config)?);
        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            pool_size = config.pool_size,
            "PostgreSQL pool configured"
        );
        Ok(Self { pool })
    }

    /// Build the pool and open a first connection
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = Self::pool_options(config)
            .connect_with(Self::connect_options(config)?)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip a trivial statement
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

/// Network-level failures become `Connection`, everything else `Database`
pub fn map_sqlx_error(err: sqlx::Error) -> LeiaError {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => LeiaError::Connection(err.to_string()),
        _ => LeiaError::Database(err.to_string()),
    }
}

fn wrap_as_json(sql: &str) -> String {
    let inner = sql.trim().trim_end_matches(';');
    format!("SELECT row_to_json(q)::text AS row FROM ({inner}) AS q")
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = $1",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(count > 0)
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let rows = sqlx::query(
            "SELECT column_name::text, data_type::text \
             FROM information_schema.columns \
             WHERE table_name = $1 \
             ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter()
            .map(|row| {
                Ok(ColumnInfo::new(
                    row.try_get::<String, _>(0).map_err(map_sqlx_error)?,
                    row.try_get::<String, _>(1).map_err(map_sqlx_error)?,
                ))
            })
            .collect()
    }

    async fn list_tables(&self) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query(
            "SELECT table_schema::text, table_name::text \
             FROM information_schema.tables \
             WHERE table_type = 'BASE TABLE' \
             AND table_schema NOT IN ('information_schema', 'pg_catalog', 'pgagent') \
             ORDER BY table_schema, table_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter()
            .map(|row| {
                Ok((
                    row.try_get::<String, _>(0).map_err(map_sqlx_error)?,
                    row.try_get::<String, _>(1).map_err(map_sqlx_error)?,
                ))
            })
            .collect()
    }

    async fn query(&self, sql: &str) -> Result<QueryTable> {
        let rows = sqlx::query(&wrap_as_json(sql))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let values = rows
            .iter()
            .map(|row| {
                let text: String = row.try_get(0).map_err(map_sqlx_error)?;
                serde_json::from_str::<Value>(&text)
                    .map_err(|e| LeiaError::Database(format!("undecodable row: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(rows = values.len(), "Statement returned");
        Ok(QueryTable::from_json_rows(&values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_options() {
        let config = DatabaseConfig {
            host: "db.internal".to_string(),
            port: 6543,
            name: "LeIA".to_string(),
            user: "reader".to_string(),
            password: Some("secret".to_string()),
            ..Default::default()
        };
        let options = PgExecutor::connect_options(&config).unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_database(), Some("LeIA"));
        assert_eq!(options.get_username(), "reader");
    }

    #[test]
    fn test_invalid_sslmode() {
        let config = DatabaseConfig {
            sslmode: "sometimes".to_string(),
            ..Default::default()
        };
        let err = PgExecutor::connect_options(&config).unwrap_err();
        assert!(matches!(err, LeiaError::Config(_)));
    }

    #[test]
    fn test_wrap_as_json() {
        assert_eq!(
            wrap_as_json("  SELECT 1 AS x;\n"),
            "SELECT row_to_json(q)::text AS row FROM (SELECT 1 AS x) AS q"
        );
    }

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            LeiaError::Connection(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            LeiaError::Database(_)
        ));
    }

    #[tokio::test]
    async fn test_lazy_pool_does_not_connect() {
        let executor = PgExecutor::connect_lazy(&DatabaseConfig::default()).unwrap();
        assert_eq!(executor.pool().size(), 0);
    }

    /// Needs a reachable database configured through DB_* variables
    #[tokio::test]
    #[ignore]
    async fn test_live_introspection() {
        let config = leia_core::AppConfig::load().unwrap();
        let executor = PgExecutor::connect(&config.database).await.unwrap();
        executor.ping().await.unwrap();
        let tables = executor.list_tables().await.unwrap();
        assert!(!tables.is_empty());
    }
}
