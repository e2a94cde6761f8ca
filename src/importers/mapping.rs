use std::collections::BTreeMap;

use crate::importers::{CellValue, ImportBatch, ImportRow, RawCell};

pub const MAPPING_SOURCE_NOTE: &str = "Imported from mapping";

/// Decorated meter label → (date header → value)
pub type ReadingMapping = BTreeMap<String, BTreeMap<String, CellValue>>;

/// Parse a JSON object of the shape `{"label": {"date": value, ...}, ...}`
pub fn from_json_str(json: &str) -> Result<ReadingMapping, serde_json::Error> {
    serde_json::from_str(json)
}

pub fn to_batch(mapping: ReadingMapping, source_note: &str) -> ImportBatch {
    let rows = mapping
        .into_iter()
        .map(|(label, values)| ImportRow {
            label,
            cells: values
                .into_iter()
                .map(|(date, value)| RawCell { date, value })
                .collect(),
        })
        .collect();

    ImportBatch {
        source_note: source_note.to_string(),
        rows,
    }
}
