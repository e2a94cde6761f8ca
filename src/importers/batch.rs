use serde::{Deserialize, Serialize};

use crate::normalize::{parse_value, FormatError};

/// A raw grid cell as delivered by a source format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    /// Any other JSON value (`null`, booleans, nested data)
    Other(serde_json::Value),
}

impl CellValue {
    /// Numeric value of the cell; `None` for blank text and `null`.
    pub fn to_number(&self) -> Result<Option<f64>, FormatError> {
        match self {
            CellValue::Number(n) if n.is_finite() => Ok(Some(*n)),
            CellValue::Number(n) => Err(FormatError::Value(n.to_string())),
            CellValue::Text(s) => parse_value(s),
            CellValue::Other(serde_json::Value::Null) => Ok(None),
            CellValue::Other(other) => Err(FormatError::Value(other.to_string())),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

/// One (date header, value) pair of a row, both still unparsed
#[derive(Debug, Clone, PartialEq)]
pub struct RawCell {
    pub date: String,
    pub value: CellValue,
}

impl RawCell {
    pub fn new(date: impl Into<String>, value: impl Into<CellValue>) -> Self {
        Self {
            date: date.into(),
            value: value.into(),
        }
    }
}

/// All cells belonging to one decorated meter label
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub label: String,
    pub cells: Vec<RawCell>,
}

/// Format-independent import unit every adapter produces
#[derive(Debug, Clone, PartialEq)]
pub struct ImportBatch {
    /// Provenance written to the notes of every imported reading
    pub source_note: String,
    pub rows: Vec<ImportRow>,
}

impl ImportBatch {
    pub fn new(source_note: impl Into<String>) -> Self {
        Self {
            source_note: source_note.into(),
            rows: Vec::new(),
        }
    }

    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(|r| r.cells.len()).sum()
    }
}
