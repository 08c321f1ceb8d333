//! Name search over previously ingested rows.
//!
//! Like ingestion, a search opens one connection, runs one statement and
//! closes the connection on every exit path, all under the call timeout.

use crate::Result;
use crate::config::IngestOptions;
use crate::destination::Target;
use crate::error::IngestError;
use crate::record::StoredRecord;
use crate::response::QueryResponse;

/// Rows returned when no limit is configured.
pub const DEFAULT_SEARCH_LIMIT: u32 = 50;

/// Finds rows whose name contains `name`, ignoring case, newest first.
///
/// `name` is trimmed; only `options.table` and the timeouts are used.
///
/// # Errors
/// - `Validation` if `name` is blank
/// - `Configuration` for invalid options or a zero `limit`
/// - `Connection` if the destination cannot be opened
/// - `Persistence` if the query fails (including a missing table)
pub async fn try_search(
    name: &str,
    target: &Target,
    options: &IngestOptions,
    limit: u32,
) -> Result<Vec<StoredRecord>> {
    options.validate()?;
    let needle = name.trim();
    if needle.is_empty() {
        return Err(IngestError::validation("Name parameter required"));
    }
    if limit == 0 {
        return Err(IngestError::configuration("limit must be greater than 0"));
    }

    let mut destination = target.connect(options.connect_timeout).await?;
    tracing::debug!(
        "Searching {} table {} for names like {:?}",
        destination.kind(),
        options.table,
        needle
    );

    let outcome = destination
        .search_by_name(&options.table, needle, limit)
        .await;

    if let Err(e) = destination.close().await {
        tracing::warn!("Failed to close connection to {}: {}", target.describe(), e);
    }

    outcome
}

/// Runs [`try_search`] under the call timeout and renders the outcome.
///
/// Never fails: errors become an error response with the connection secret
/// masked.
pub async fn search(
    name: &str,
    target: &Target,
    options: &IngestOptions,
    limit: u32,
) -> QueryResponse {
    let outcome = tokio::time::timeout(options.timeout, try_search(name, target, options, limit))
        .await
        .unwrap_or_else(|_| Err(IngestError::timeout("search", options.timeout)));

    match outcome {
        Ok(results) => {
            tracing::info!("Found {} rows in {}", results.len(), options.table);
            QueryResponse::found(name.trim(), results)
        }
        Err(e) => {
            let response = QueryResponse::failed(&e, target.secret());
            tracing::error!("Search failed: {}", response.message);
            response
        }
    }
}
