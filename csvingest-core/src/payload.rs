//! CSV payload decoding, header validation and row conversion.
//!
//! Everything here runs before a database connection exists, so a payload
//! that fails any step never causes a write.

use crate::Result;
use crate::config::IngestOptions;
use crate::error::IngestError;
use crate::record::{REQUIRED_COLUMNS, Record};
use serde::Serialize;

const UTF8_BOM: char = '\u{feff}';

/// GPA range enforced by the strict content rules.
const STRICT_GPA_RANGE: std::ops::RangeInclusive<f64> = 0.0..=4.0;

/// A CSV payload as delivered by the host.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// Raw file bytes, decoded as UTF-8
    Bytes(&'a [u8]),
    /// Already-decoded text
    Text(&'a str),
}

impl<'a> From<&'a [u8]> for Payload<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::Bytes(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for Payload<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl<'a> From<&'a str> for Payload<'a> {
    fn from(text: &'a str) -> Self {
        Self::Text(text)
    }
}

impl<'a> From<&'a String> for Payload<'a> {
    fn from(text: &'a String) -> Self {
        Self::Text(text)
    }
}

impl<'a> Payload<'a> {
    /// Decodes the payload to text, dropping a leading byte-order mark.
    ///
    /// # Errors
    /// `Decode` with the offset of the first invalid byte.
    pub fn decode(self) -> Result<&'a str> {
        let text = match self {
            Self::Text(text) => text,
            Self::Bytes(bytes) => std::str::from_utf8(bytes).map_err(|e| {
                IngestError::decode(format!(
                    "payload is not valid UTF-8 (invalid byte at offset {})",
                    e.valid_up_to()
                ))
            })?,
        };
        Ok(text.strip_prefix(UTF8_BOM).unwrap_or(text))
    }
}

/// Rows converted from a payload, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPayload {
    /// Header names as they appeared (trimmed)
    pub headers: Vec<String>,
    /// One converted record per data row
    pub records: Vec<Record>,
}

/// Summary of a dry-run check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    /// Number of data rows
    pub rows: usize,
    /// Number of header columns, extras included
    pub columns: usize,
}

/// Returns the required columns missing from `headers`, in canonical order.
pub fn missing_columns(headers: &[String]) -> Vec<String> {
    REQUIRED_COLUMNS
        .iter()
        .filter(|required| !headers.iter().any(|h| h == *required))
        .map(|required| (*required).to_string())
        .collect()
}

/// Decodes, parses and converts a payload.
///
/// The header row must contain every name in [`REQUIRED_COLUMNS`]; extra
/// columns are ignored. Every row is converted before this returns, so the
/// first bad cell aborts the whole payload.
///
/// # Errors
/// - `Decode` for invalid UTF-8 or malformed CSV
/// - `EmptyPayload` for a missing header or zero data rows
/// - `Schema` listing every missing required column
/// - `TypeConversion` / `OutOfRange` for the first bad numeric cell
/// - `Validation` for the first failed content rule when `options.strict` is set
pub fn parse_payload(payload: Payload<'_>, options: &IngestOptions) -> Result<ParsedPayload> {
    let text = payload.decode()?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error("header", &e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(IngestError::EmptyPayload);
    }

    let missing = missing_columns(&headers);
    if !missing.is_empty() {
        return Err(IngestError::Schema { missing });
    }

    let positions = REQUIRED_COLUMNS.map(|column| headers.iter().position(|h| h == column));

    let mut records = Vec::new();
    let mut filled = vec![false; headers.len()];
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(|e| csv_error("row", &e))?;
        for (seen, cell) in filled.iter_mut().zip(row.iter()) {
            *seen |= !cell.trim().is_empty();
        }
        let cells = positions.map(|position| position.and_then(|p| row.get(p)));
        records.push(Record::from_cells(
            index.saturating_add(1),
            cells,
            options.gpa_bounds,
        )?);
    }

    if records.is_empty() {
        return Err(IngestError::EmptyPayload);
    }

    if options.strict {
        check_content(&filled, &records)?;
    }

    tracing::debug!(
        rows = records.len(),
        columns = headers.len(),
        "Parsed CSV payload"
    );

    Ok(ParsedPayload { headers, records })
}

/// Runs every pre-database step and reports what would be written.
///
/// # Errors
/// Same as [`parse_payload`].
pub fn check_payload(payload: Payload<'_>, options: &IngestOptions) -> Result<CheckReport> {
    let parsed = parse_payload(payload, options)?;
    Ok(CheckReport {
        rows: parsed.records.len(),
        columns: parsed.headers.len(),
    })
}

/// Applies the strict content rules in a fixed order and reports the first
/// one that fails.
fn check_content(filled: &[bool], records: &[Record]) -> Result<()> {
    if filled.iter().any(|seen| !seen) {
        return Err(IngestError::validation(
            "Some columns contain only null values",
        ));
    }

    if records.iter().any(|r| r.salary.is_none()) {
        return Err(IngestError::validation(
            "Salary column contains non-numeric values",
        ));
    }
    if records.iter().any(|r| r.salary.is_some_and(|s| s <= 0.0)) {
        return Err(IngestError::validation("Salary must be greater than 0"));
    }

    if records.iter().any(|r| r.gpa.is_none()) {
        return Err(IngestError::validation(
            "GPA column contains non-numeric values",
        ));
    }
    if records
        .iter()
        .any(|r| r.gpa.is_some_and(|g| !STRICT_GPA_RANGE.contains(&g)))
    {
        return Err(IngestError::validation("GPA must be between 0 and 4"));
    }

    let empty_text = [
        ("Name", records.iter().any(|r| r.name.is_none())),
        ("School", records.iter().any(|r| r.school.is_none())),
        ("Address", records.iter().any(|r| r.address.is_none())),
    ];
    if let Some((label, _)) = empty_text.iter().find(|(_, empty)| *empty) {
        return Err(IngestError::validation(format!(
            "{label} column contains empty values"
        )));
    }

    Ok(())
}

fn csv_error(what: &str, error: &csv::Error) -> IngestError {
    match error.position() {
        Some(position) => IngestError::decode(format!(
            "malformed CSV {} at line {}: {}",
            what,
            position.line(),
            error
        )),
        None => IngestError::decode(format!("malformed CSV {}: {}", what, error)),
    }
}
