use serde::Deserialize;

use crate::importers::{CellValue, ImportBatch, ImportRow, RawCell};

pub const SERIES_SOURCE_NOTE: &str = "Imported from series";

/// One `{date, value}` record of a single meter's series.
///
/// Older exports name the value `reading`; both keys are accepted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeriesRecord {
    pub date: String,
    #[serde(alias = "reading")]
    pub value: CellValue,
}

impl SeriesRecord {
    pub fn new(date: impl Into<String>, value: impl Into<CellValue>) -> Self {
        Self {
            date: date.into(),
            value: value.into(),
        }
    }
}

/// Parse a JSON array of series records
pub fn from_json_str(json: &str) -> Result<Vec<SeriesRecord>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Wrap one meter's records into a single-row batch keyed by `label`
pub fn to_batch(label: &str, records: Vec<SeriesRecord>, source_note: &str) -> ImportBatch {
    let cells = records
        .into_iter()
        .map(|r| RawCell {
            date: r.date,
            value: r.value,
        })
        .collect();

    ImportBatch {
        source_note: source_note.to_string(),
        rows: vec![ImportRow {
            label: label.to_string(),
            cells,
        }],
    }
}
