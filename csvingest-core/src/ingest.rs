//! The ingestion routine: payload in, committed rows out.
//!
//! Every row is converted before a connection is opened, the connection
//! lives only for the write, and it is closed on every exit path. The whole
//! call runs under the configured call timeout.

use crate::Result;
use crate::config::IngestOptions;
use crate::destination::Target;
use crate::error::IngestError;
use crate::payload::{Payload, parse_payload};
use crate::response::IngestResponse;
use serde::Serialize;

/// What a successful ingestion wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Rows committed by this call
    pub rows_inserted: u64,
    /// Destination table
    pub table: String,
}

/// Runs the ingestion routine and returns the typed outcome.
///
/// Does not apply the call timeout; [`ingest`] does.
///
/// # Errors
/// - `Configuration` for invalid options
/// - `Decode`, `EmptyPayload`, `Schema`, `TypeConversion`, `OutOfRange` before any connection
/// - `Connection` if the destination cannot be opened
/// - `Persistence` if provisioning or the write fails; nothing is committed
pub async fn try_ingest(
    payload: Payload<'_>,
    target: &Target,
    options: &IngestOptions,
) -> Result<IngestSummary> {
    options.validate()?;
    let parsed = parse_payload(payload, options)?;

    let mut destination = target.connect(options.connect_timeout).await?;
    tracing::info!(
        "Writing {} rows to {} table {}",
        parsed.records.len(),
        destination.kind(),
        options.table
    );

    let outcome = async {
        destination.ensure_table(&options.table).await?;
        destination
            .insert_records(&options.table, &parsed.records)
            .await
    }
    .await;

    if let Err(e) = destination.close().await {
        tracing::warn!("Failed to close connection to {}: {}", target.describe(), e);
    }

    Ok(IngestSummary {
        rows_inserted: outcome?,
        table: options.table.clone(),
    })
}

/// Runs the ingestion routine and renders the outcome as a response.
///
/// Never fails: every error becomes an error response with the connection
/// secret masked. If the call exceeds `options.timeout` the in-flight
/// transaction is dropped uncommitted.
///
/// # Example
/// ```rust,no_run
/// use csvingest_core::config::IngestOptions;
/// use csvingest_core::destination::Target;
/// use csvingest_core::ingest::ingest;
/// use csvingest_core::payload::Payload;
///
/// # async fn example() {
/// let csv = "name,salary,address,gpa,school\nAda,1,x,3.9,MIT\n";
/// let target = Target::Sqlite("sqlite://people.db".to_string());
/// let response = ingest(Payload::Text(csv), &target, &IngestOptions::default()).await;
/// assert_eq!(response.rows_inserted, Some(1));
/// # }
/// ```
pub async fn ingest(
    payload: Payload<'_>,
    target: &Target,
    options: &IngestOptions,
) -> IngestResponse {
    let outcome = tokio::time::timeout(options.timeout, try_ingest(payload, target, options))
        .await
        .unwrap_or_else(|_| Err(IngestError::timeout("ingestion", options.timeout)));

    match outcome {
        Ok(summary) => {
            tracing::info!(
                "Inserted {} rows into {}",
                summary.rows_inserted,
                summary.table
            );
            IngestResponse::inserted(summary)
        }
        Err(e) => {
            let response = IngestResponse::failed(&e, target.secret());
            tracing::error!("Ingestion failed: {}", response.message);
            response
        }
    }
}
