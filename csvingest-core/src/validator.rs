//! One-shot credential check against the PostgreSQL destination.
//!
//! # Guarantees
//! - Missing fields are reported before any network traffic
//! - Exactly one connection attempt; no retries
//! - The connection is closed as soon as it opens

use crate::Result;
use crate::config::{CredentialFields, Credentials};
use crate::destination::Destination;
use crate::destination::postgres::PostgresDestination;
use std::time::Duration;

/// Validates a raw credential bundle by connecting once.
///
/// # Errors
/// - `MissingField` for the first absent or empty field
/// - `Configuration` for a malformed port
/// - `Connection` if the database cannot be reached or rejects the login
///
/// # Example
/// ```rust,no_run
/// use csvingest_core::config::{CredentialFields, DEFAULT_VALIDATION_TIMEOUT};
/// use csvingest_core::validator::validate_credentials;
///
/// # async fn example() -> csvingest_core::Result<()> {
/// let fields: CredentialFields = serde_json::from_str(
///     r#"{"host": "localhost", "port": "5432", "dbname": "app",
///         "user": "loader", "password": "s3cret"}"#,
/// )
/// .expect("valid JSON");
/// validate_credentials(fields, DEFAULT_VALIDATION_TIMEOUT).await?;
/// # Ok(())
/// # }
/// ```
pub async fn validate_credentials(
    fields: CredentialFields,
    connect_timeout: Duration,
) -> Result<()> {
    let credentials = fields.into_credentials()?;
    check_connection(&credentials, connect_timeout).await
}

/// Opens and immediately closes one connection using `credentials`.
///
/// A failure to close cleanly after a successful open is logged, not returned:
/// the credentials were accepted.
///
/// # Errors
/// `Connection` if the connection cannot be established within `connect_timeout`
pub async fn check_connection(credentials: &Credentials, connect_timeout: Duration) -> Result<()> {
    tracing::info!("Validating credentials for {}", credentials);

    let destination = PostgresDestination::connect(credentials, connect_timeout).await?;
    if let Err(e) = Box::new(destination).close().await {
        tracing::warn!("Connection opened but did not close cleanly: {}", e);
    }

    tracing::info!("Credentials accepted by {}", credentials);
    Ok(())
}
