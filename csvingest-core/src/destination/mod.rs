//! Destination backends and the factory that opens them.
//!
//! A [`Destination`] wraps exactly one database connection for the duration
//! of one call. It provisions the destination table and writes a batch of
//! records inside a single transaction.
//!
//! # Module Structure
//! - `postgres`: PostgreSQL backend, addressed by a credential bundle
//! - `sqlite`: SQLite backend, addressed by a file path or `sqlite:` URL
//!
//! # Guarantees
//! - No pooling: one connection per destination, closed by [`Destination::close`]
//! - `insert_records` commits all rows or none
//! - `search_by_name` binds the search text; it never reaches SQL text
//! - Table names are validated identifiers before reaching any SQL text

use crate::Result;
use crate::config::Credentials;
use crate::record::{REQUIRED_COLUMNS, Record, StoredRecord};
use async_trait::async_trait;
use std::time::Duration;

#[cfg(feature = "postgresql")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Database engines a destination can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    PostgreSQL,
    SQLite,
}

impl std::fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PostgreSQL => write!(f, "PostgreSQL"),
            Self::SQLite => write!(f, "SQLite"),
        }
    }
}

/// A single open connection to the database that receives records.
///
/// # Object Safety
/// This trait is object-safe so the factory can return
/// `Box<dyn Destination>`.
#[async_trait]
pub trait Destination: Send {
    /// Returns the engine behind this destination.
    fn kind(&self) -> DestinationKind;

    /// Creates the destination table if it does not exist.
    ///
    /// An existing table is left untouched whatever its shape; an
    /// incompatible layout surfaces later as a persistence error.
    ///
    /// # Errors
    /// `Persistence` if the DDL statement fails
    async fn ensure_table(&mut self, table: &str) -> Result<()>;

    /// Writes every record in one transaction and returns the row count.
    ///
    /// # Errors
    /// `Persistence` if any statement or the commit fails; the transaction is
    /// rolled back and no rows from this batch persist.
    async fn insert_records(&mut self, table: &str, records: &[Record]) -> Result<u64>;

    /// Counts the rows currently in `table`.
    ///
    /// # Errors
    /// `Persistence` if the query fails (including a missing table)
    async fn row_count(&mut self, table: &str) -> Result<i64>;

    /// Reads back at most `limit` rows whose name contains `needle`,
    /// ignoring case, newest first.
    ///
    /// `%` and `_` in `needle` match literally.
    ///
    /// # Errors
    /// `Persistence` if the query fails (including a missing table)
    async fn search_by_name(
        &mut self,
        table: &str,
        needle: &str,
        limit: u32,
    ) -> Result<Vec<StoredRecord>>;

    /// Closes the connection gracefully.
    ///
    /// # Errors
    /// `Connection` if the server could not be told goodbye; the connection
    /// is released regardless.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Where an ingestion call writes.
#[derive(Debug, Clone)]
pub enum Target {
    /// A PostgreSQL database addressed by a credential bundle
    Postgres(Credentials),
    /// A SQLite database file, `sqlite:` URL or `sqlite::memory:`
    Sqlite(String),
}

impl Target {
    /// The connection secret, if this target has one.
    pub fn secret(&self) -> Option<&str> {
        match self {
            Self::Postgres(credentials) => Some(credentials.expose_password()),
            Self::Sqlite(_) => None,
        }
    }

    /// Human-readable target without credentials.
    pub fn describe(&self) -> String {
        match self {
            Self::Postgres(credentials) => credentials.to_string(),
            Self::Sqlite(location) => location.clone(),
        }
    }

    /// Opens a single connection to the target.
    ///
    /// # Errors
    /// `Connection` if the connection cannot be established within
    /// `connect_timeout`, or `Configuration` if the backend was not compiled in.
    pub async fn connect(&self, connect_timeout: Duration) -> Result<Box<dyn Destination>> {
        match self {
            #[cfg(feature = "postgresql")]
            Self::Postgres(credentials) => {
                let destination =
                    postgres::PostgresDestination::connect(credentials, connect_timeout).await?;
                Ok(Box::new(destination))
            }
            #[cfg(not(feature = "postgresql"))]
            Self::Postgres(_) => Err(crate::error::IngestError::configuration(
                "Compile with --features postgresql to enable PostgreSQL support",
            )),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(location) => {
                let destination =
                    sqlite::SqliteDestination::open(location, connect_timeout).await?;
                Ok(Box::new(destination))
            }
            #[cfg(not(feature = "sqlite"))]
            Self::Sqlite(_) => Err(crate::error::IngestError::configuration(
                "Compile with --features sqlite to enable SQLite support",
            )),
        }
    }
}

/// Wraps an already-validated identifier in double quotes.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `INSERT INTO <table> (<columns>) ` prefix shared by both backends.
pub(crate) fn insert_prefix(table: &str) -> String {
    format!(
        "INSERT INTO {} ({}) ",
        quote_identifier(table),
        REQUIRED_COLUMNS.join(", ")
    )
}

/// Column tuple selected by both backends' name search.
pub(crate) type StoredRow = (
    i64,
    Option<String>,
    Option<f64>,
    Option<String>,
    Option<f64>,
    Option<String>,
    Option<String>,
);

impl From<StoredRow> for StoredRecord {
    fn from(row: StoredRow) -> Self {
        let (id, name, salary, address, gpa, school, created_at) = row;
        Self {
            id,
            record: Record {
                name,
                salary,
                address,
                gpa,
                school,
            },
            created_at,
        }
    }
}

/// `%needle%` for a `LIKE ... ESCAPE '\'` match, with wildcards in `needle`
/// escaped.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::from("%");
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Rows per multi-row `INSERT` that keep binds under `max_bind_params`.
pub(crate) const fn rows_per_statement(max_bind_params: usize) -> usize {
    match max_bind_params.checked_div(REQUIRED_COLUMNS.len()) {
        Some(rows) if rows > 0 => rows,
        _ => 1,
    }
}
