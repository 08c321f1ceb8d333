//! The destination row model and per-cell conversion rules.

use crate::Result;
use crate::config::NumericBounds;
use crate::error::IngestError;
use serde::{Deserialize, Serialize};

/// Columns a payload must provide, in canonical order.
pub const REQUIRED_COLUMNS: [&str; 5] = ["name", "salary", "address", "gpa", "school"];

/// One CSV data row mapped onto one destination row.
///
/// Text fields are trimmed with empty results stored as `None`; numeric
/// fields are `None` when the cell is empty or absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub name: Option<String>,
    pub salary: Option<f64>,
    pub address: Option<String>,
    pub gpa: Option<f64>,
    pub school: Option<String>,
}

/// A row read back from the destination table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: i64,
    #[serde(flatten)]
    pub record: Record,
    /// Insert time as rendered by the database
    pub created_at: Option<String>,
}

impl Record {
    /// Converts raw cells into a record.
    ///
    /// `cells` follows [`REQUIRED_COLUMNS`] order; `None` means the row was
    /// too short to reach that column. `row` is the 1-based data-row index
    /// used in error messages.
    ///
    /// # Errors
    /// - `TypeConversion` if `salary` or `gpa` is present but not a finite number
    /// - `OutOfRange` if `gpa` falls outside `gpa_bounds`
    pub fn from_cells(
        row: usize,
        cells: [Option<&str>; 5],
        gpa_bounds: Option<NumericBounds>,
    ) -> Result<Self> {
        let [name, salary, address, gpa, school] = cells;

        let salary = parse_decimal(row, "salary", salary)?;
        let gpa = parse_decimal(row, "gpa", gpa)?;
        if let (Some(value), Some(bounds)) = (gpa, gpa_bounds)
            && !bounds.contains(value)
        {
            return Err(IngestError::OutOfRange {
                row,
                field: "gpa",
                value,
                min: bounds.min,
                max: bounds.max,
            });
        }

        Ok(Self {
            name: normalize_text(name),
            salary,
            address: normalize_text(address),
            gpa,
            school: normalize_text(school),
        })
    }
}

/// Trims a text cell; empty or whitespace-only becomes `None`.
pub fn normalize_text(cell: Option<&str>) -> Option<String> {
    cell.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Parses a numeric cell; empty or absent becomes `None`.
///
/// Surrounding whitespace is ignored. `NaN` and infinities are rejected
/// since the destination columns are fixed-point.
pub fn parse_decimal(row: usize, field: &'static str, cell: Option<&str>) -> Result<Option<f64>> {
    let Some(raw) = cell.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };

    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(IngestError::TypeConversion {
            row,
            field,
            value: raw.to_string(),
        }),
    }
}
