//! PostgreSQL destination.
//!
//! Opens one `PgConnection` (no pool) from a credential bundle, provisions
//! the destination table and writes records with multi-row `INSERT`
//! statements inside a single transaction.

use super::{
    Destination, DestinationKind, StoredRow, contains_pattern, insert_prefix, quote_identifier,
    rows_per_statement,
};
use crate::Result;
use crate::config::Credentials;
use crate::error::IngestError;
use crate::record::{Record, StoredRecord};
use async_trait::async_trait;
use sqlx::postgres::{PgConnection, Postgres};
use sqlx::{Connection, QueryBuilder};
use std::time::Duration;

/// Bind parameters PostgreSQL accepts in one statement.
const MAX_BIND_PARAMS: usize = 65_535;

/// Builds the `CREATE TABLE IF NOT EXISTS` statement for `table`.
pub fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id SERIAL PRIMARY KEY,
            name VARCHAR(255),
            salary DECIMAL(15, 2),
            address TEXT,
            gpa DECIMAL(3, 2),
            school VARCHAR(255),
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        quote_identifier(table)
    )
}

/// Builds the newest-first name search for `table`.
pub fn search_sql(table: &str) -> String {
    format!(
        "SELECT id::int8, name, salary::float8, address, gpa::float8, school, created_at::text
         FROM {}
         WHERE name ILIKE $1 ESCAPE '\\'
         ORDER BY created_at DESC, id DESC
         LIMIT $2",
        quote_identifier(table)
    )
}

/// A single PostgreSQL connection used for one call.
pub struct PostgresDestination {
    conn: PgConnection,
    target: String,
}

impl std::fmt::Debug for PostgresDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDestination")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl PostgresDestination {
    /// Opens one connection using `credentials`.
    ///
    /// # Errors
    /// `Connection` if the host is unreachable, authentication is rejected,
    /// the database does not exist, or `connect_timeout` elapses.
    pub async fn connect(credentials: &Credentials, connect_timeout: Duration) -> Result<Self> {
        let target = credentials.target();
        tracing::debug!("Connecting to {}", credentials);

        let conn = tokio::time::timeout(
            connect_timeout,
            PgConnection::connect_with(&credentials.pg_connect_options()),
        )
        .await
        .map_err(|_| IngestError::connection_timeout(target.clone(), connect_timeout))?
        .map_err(|e| IngestError::Connection {
            context: format!("connecting to {}", target),
            source: Box::new(e),
        })?;

        Ok(Self { conn, target })
    }

    /// Writes `records` through `conn` in bind-limit-sized statements.
    async fn insert_chunks(conn: &mut PgConnection, table: &str, records: &[Record]) -> Result<u64> {
        let mut written: u64 = 0;
        for chunk in records.chunks(rows_per_statement(MAX_BIND_PARAMS)) {
            let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(insert_prefix(table));
            builder.push_values(chunk, |mut row, record| {
                row.push_bind(record.name.clone())
                    .push_bind(record.salary)
                    .push_bind(record.address.clone())
                    .push_bind(record.gpa)
                    .push_bind(record.school.clone());
            });

            let result = builder.build().execute(&mut *conn).await.map_err(|e| {
                IngestError::persistence_failed(format!("inserting into {}", table), e)
            })?;
            written = written.saturating_add(result.rows_affected());
            tracing::trace!(rows = chunk.len(), "Inserted chunk");
        }
        Ok(written)
    }
}

#[async_trait]
impl Destination for PostgresDestination {
    fn kind(&self) -> DestinationKind {
        DestinationKind::PostgreSQL
    }

    async fn ensure_table(&mut self, table: &str) -> Result<()> {
        sqlx::query(&create_table_sql(table))
            .execute(&mut self.conn)
            .await
            .map_err(|e| IngestError::persistence_failed(format!("creating table {}", table), e))?;
        Ok(())
    }

    async fn insert_records(&mut self, table: &str, records: &[Record]) -> Result<u64> {
        let mut tx = self
            .conn
            .begin()
            .await
            .map_err(|e| IngestError::persistence_failed("starting transaction", e))?;

        let written = match Self::insert_chunks(&mut tx, table, records).await {
            Ok(written) => written,
            Err(error) => {
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::warn!("Rollback after failed insert also failed: {}", rollback_error);
                }
                return Err(error);
            }
        };

        tx.commit()
            .await
            .map_err(|e| IngestError::persistence_failed("committing transaction", e))?;
        Ok(written)
    }

    async fn row_count(&mut self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&mut self.conn)
            .await
            .map_err(|e| IngestError::persistence_failed(format!("counting rows in {}", table), e))
    }

    async fn search_by_name(
        &mut self,
        table: &str,
        needle: &str,
        limit: u32,
    ) -> Result<Vec<StoredRecord>> {
        let rows: Vec<StoredRow> = sqlx::query_as(&search_sql(table))
            .bind(contains_pattern(needle))
            .bind(i64::from(limit))
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| IngestError::persistence_failed(format!("searching {}", table), e))?;
        Ok(rows.into_iter().map(StoredRecord::from).collect())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let Self { conn, target } = *self;
        conn.close().await.map_err(|e| IngestError::Connection {
            context: format!("closing connection to {}", target),
            source: Box::new(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table_sql_shape() {
        let sql = create_table_sql("csv_data");
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"csv_data\""));
        assert!(sql.contains("id SERIAL PRIMARY KEY"));
        assert!(sql.contains("salary DECIMAL(15, 2)"));
        assert!(sql.contains("gpa DECIMAL(3, 2)"));
        assert!(sql.contains("created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP"));
    }

    #[test]
    fn test_search_sql_binds_pattern_and_limit() {
        let sql = search_sql("csv_data");
        assert!(sql.contains("FROM \"csv_data\""));
        assert!(sql.contains("WHERE name ILIKE $1 ESCAPE '\\'"));
        assert!(sql.contains("ORDER BY created_at DESC, id DESC"));
        assert!(sql.contains("LIMIT $2"));
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        // Nothing listens on port 1.
        let credentials = Credentials::new("127.0.0.1", 1, "postgres", "postgres", "secret");
        let result = PostgresDestination::connect(&credentials, Duration::from_secs(5)).await;

        match result {
            Err(IngestError::Connection { context, .. }) => {
                assert!(context.contains("127.0.0.1:1/postgres"));
                assert!(!context.contains("secret"));
            }
            other => panic!("expected Connection error, got {other:?}"),
        }
    }
}
