//! The JSON-shaped result every call hands back to its host.

use crate::config::Credentials;
use crate::error::{IngestError, redact_secret};
use crate::ingest::IngestSummary;
use crate::payload::CheckReport;
use crate::record::StoredRecord;
use serde::{Deserialize, Serialize};

/// Outcome of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Structured result of a validation, check or ingestion call.
///
/// Serializes as `{"status": "success", "message": ..., "rows_inserted": N}`
/// or `{"status": "error", "message": ...}`; optional fields are omitted
/// when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_inserted: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_checked: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Error category, see [`IngestError::kind`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl IngestResponse {
    fn new(status: Status, message: String) -> Self {
        Self {
            status,
            message,
            rows_inserted: None,
            rows_checked: None,
            table: None,
            file_name: None,
            error_kind: None,
        }
    }

    /// Success result for a committed batch.
    pub fn inserted(summary: IngestSummary) -> Self {
        let mut response = Self::new(
            Status::Success,
            format!(
                "Inserted {} rows into {}",
                summary.rows_inserted, summary.table
            ),
        );
        response.rows_inserted = Some(summary.rows_inserted);
        response.table = Some(summary.table);
        response
    }

    /// Success result for a dry-run check.
    pub fn checked(report: CheckReport) -> Self {
        let mut response = Self::new(
            Status::Success,
            format!(
                "CSV is valid. Contains {} rows and {} columns",
                report.rows, report.columns
            ),
        );
        response.rows_checked = Some(report.rows);
        response
    }

    /// Success result for a credential check.
    pub fn validated(credentials: &Credentials) -> Self {
        Self::new(
            Status::Success,
            format!(
                "Database connection successful. Connected to {} on {}:{}",
                credentials.database(),
                credentials.host(),
                credentials.port()
            ),
        )
    }

    /// Error result; every occurrence of `secret` is masked in the message.
    pub fn failed(error: &IngestError, secret: Option<&str>) -> Self {
        let message = error.to_string();
        let message = match secret {
            Some(secret) => redact_secret(&message, secret),
            None => message,
        };
        let mut response = Self::new(Status::Error, message);
        response.error_kind = Some(error.kind().to_string());
        response
    }

    /// Attaches the name of the uploaded file.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Structured result of a name search.
///
/// Serializes as `{"status": "success", "message": ..., "count": N,
/// "results": [...]}` or `{"status": "error", "message": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<StoredRecord>>,
    /// Error category, see [`IngestError::kind`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl QueryResponse {
    /// Success result for a search, including one that matched nothing.
    pub fn found(name: &str, results: Vec<StoredRecord>) -> Self {
        let message = if results.is_empty() {
            format!("No records found for \"{}\"", name)
        } else {
            format!("Found {} record(s) for '{}'", results.len(), name)
        };
        Self {
            status: Status::Success,
            message,
            count: Some(results.len()),
            results: Some(results),
            error_kind: None,
        }
    }

    /// Error result; every occurrence of `secret` is masked in the message.
    pub fn failed(error: &IngestError, secret: Option<&str>) -> Self {
        let rendered = IngestResponse::failed(error, secret);
        Self {
            status: Status::Error,
            message: rendered.message,
            count: None,
            results: None,
            error_kind: rendered.error_kind,
        }
    }

    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}
