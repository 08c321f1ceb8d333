//! Per-call ingestion settings.

use crate::Result;
use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Destination table used when none is configured.
pub const DEFAULT_TABLE: &str = "csv_data";

/// Upper bound on one ingestion call, matching the host's two-minute budget.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Connect timeout for the single connection an ingestion call opens.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect timeout for the one-shot credential check.
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(5);

/// PostgreSQL's identifier length limit.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Inclusive bounds for a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericBounds {
    pub min: f64,
    pub max: f64,
}

impl NumericBounds {
    /// Creates inclusive bounds.
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `value` lies within the bounds.
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Settings for one ingestion call.
///
/// # Example
/// ```rust
/// use csvingest_core::config::{IngestOptions, NumericBounds};
/// use std::time::Duration;
///
/// let options = IngestOptions::new()
///     .with_table("people")
///     .with_timeout(Duration::from_secs(30))
///     .with_gpa_bounds(NumericBounds::new(0.0, 4.0));
///
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Destination table name
    pub table: String,
    /// Budget for the whole call, parse through commit
    pub timeout: Duration,
    /// Budget for opening the database connection
    pub connect_timeout: Duration,
    /// Optional accepted GPA range; unchecked when `None`
    pub gpa_bounds: Option<NumericBounds>,
    /// Apply the content rules (non-empty columns, positive salary, GPA
    /// within 0..=4, non-empty text) on top of the schema check
    #[serde(default)]
    pub strict: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            timeout: DEFAULT_CALL_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            gpa_bounds: None,
            strict: false,
        }
    }
}

impl IngestOptions {
    /// Creates options with the default table and timeouts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the destination table.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Builder method to set the call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder method to set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder method to enable the GPA range check.
    pub fn with_gpa_bounds(mut self, bounds: NumericBounds) -> Self {
        self.gpa_bounds = Some(bounds);
        self
    }

    /// Builder method to enable the strict content rules.
    pub fn with_strict_check(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Validates option values.
    ///
    /// # Errors
    /// Returns a configuration error for an unusable table name, a zero
    /// timeout, or inverted/non-finite GPA bounds.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.table)?;

        if self.timeout.is_zero() {
            return Err(IngestError::configuration(
                "timeout must be greater than 0",
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(IngestError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        if let Some(bounds) = self.gpa_bounds
            && (!bounds.min.is_finite() || !bounds.max.is_finite() || bounds.min > bounds.max)
        {
            return Err(IngestError::configuration(format!(
                "gpa bounds must be finite with min <= max (got {}..={})",
                bounds.min, bounds.max
            )));
        }

        Ok(())
    }
}

/// Checks that `name` is a plain SQL identifier safe to splice into DDL.
///
/// Letters, digits and underscores only, not starting with a digit, at most
/// 63 characters.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(IngestError::configuration("table name cannot be empty"));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(IngestError::configuration(format!(
            "table name too long: maximum {} characters",
            MAX_IDENTIFIER_LEN
        )));
    }

    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !starts_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(IngestError::configuration(format!(
            "table name {:?} must start with a letter or underscore and contain only letters, digits, and underscores",
            name
        )));
    }

    Ok(())
}
