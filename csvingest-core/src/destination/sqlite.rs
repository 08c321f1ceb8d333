//! SQLite destination.
//!
//! Opens one `SqliteConnection`, creating the database file when missing.
//!
//! # Connection String Formats
//! - `sqlite:///path/to/database.db` or `sqlite://./relative.db`
//! - `/path/to/database.db` (plain path)
//! - `sqlite::memory:` (private to the connection; gone once closed)

use super::{
    Destination, DestinationKind, StoredRow, contains_pattern, insert_prefix, quote_identifier,
    rows_per_statement,
};
use crate::Result;
use crate::error::IngestError;
use crate::record::{Record, StoredRecord};
use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, QueryBuilder};
use std::str::FromStr;
use std::time::Duration;

/// Default `SQLITE_MAX_VARIABLE_NUMBER` of the bundled SQLite.
const MAX_BIND_PARAMS: usize = 32_766;

/// Builds the `CREATE TABLE IF NOT EXISTS` statement for `table`.
pub fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
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
///
/// `LIKE` ignores case for ASCII letters only.
pub fn search_sql(table: &str) -> String {
    format!(
        "SELECT id, name, CAST(salary AS REAL), address, CAST(gpa AS REAL), school,
                CAST(created_at AS TEXT)
         FROM {}
         WHERE name LIKE ?1 ESCAPE '\\'
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
        quote_identifier(table)
    )
}

/// A single SQLite connection used for one call.
pub struct SqliteDestination {
    conn: SqliteConnection,
    location: String,
}

impl std::fmt::Debug for SqliteDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDestination")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl SqliteDestination {
    /// Opens (and if needed creates) the database at `location`.
    ///
    /// # Errors
    /// - `Configuration` if `location` is not a usable SQLite connection string
    /// - `Connection` if the file cannot be opened or `connect_timeout` elapses
    pub async fn open(location: &str, connect_timeout: Duration) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(location)
            .map_err(|e| {
                IngestError::configuration(format!(
                    "Invalid SQLite connection string {:?}: {}",
                    location, e
                ))
            })?
            .create_if_missing(true);

        let conn = tokio::time::timeout(connect_timeout, options.connect())
            .await
            .map_err(|_| IngestError::connection_timeout(location, connect_timeout))?
            .map_err(|e| IngestError::Connection {
                context: format!("opening {}", location),
                source: Box::new(e),
            })?;

        tracing::debug!("Opened SQLite database {}", location);
        Ok(Self {
            conn,
            location: location.to_string(),
        })
    }

    /// Writes `records` through `conn` in bind-limit-sized statements.
    async fn insert_chunks(
        conn: &mut SqliteConnection,
        table: &str,
        records: &[Record],
    ) -> Result<u64> {
        let mut written: u64 = 0;
        for chunk in records.chunks(rows_per_statement(MAX_BIND_PARAMS)) {
            let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(insert_prefix(table));
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
        }
        Ok(written)
    }
}

#[async_trait]
impl Destination for SqliteDestination {
    fn kind(&self) -> DestinationKind {
        DestinationKind::SQLite
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
        let Self { conn, location } = *self;
        conn.close().await.map_err(|e| IngestError::Connection {
            context: format!("closing {}", location),
            source: Box::new(e),
        })
    }
}
