use calamine::{open_workbook, Data, DataType, Range, Reader, Xlsx};
use std::fs::File;
use std::io::BufReader;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::importers::{CellValue, ImportBatch, ImportRow, RawCell};

pub const EXCEL_SOURCE_NOTE: &str = "Imported from Excel";

#[derive(Error, Debug)]
pub enum ExcelImportError {
    #[error("Failed to open workbook: {0}")]
    WorkbookOpen(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Workbook has no sheets")]
    NoSheets,

    #[error("Missing date headers in first row")]
    MissingDateHeaders,
}

/// Parser for meter grids kept in xlsx workbooks
pub struct ExcelImporter {
    workbook_path: String,
}

impl ExcelImporter {
    pub fn new(workbook_path: impl Into<String>) -> Self {
        Self {
            workbook_path: workbook_path.into(),
        }
    }

    /// Parse a meter grid sheet (the first sheet when `sheet_name` is `None`)
    ///
    /// # Expected Sheet Structure:
    /// ```text
    /// Row 1: anything | date | date | ...
    /// Row 2+: decorated meter label | reading | reading | ...
    /// ```
    /// Date headers may be real Excel dates or text; Excel dates are converted
    /// to ISO strings so the normalizer sees one shape.
    pub fn parse_sheet(&self, sheet_name: Option<&str>) -> Result<ImportBatch, ExcelImportError> {
        // Open workbook (this is synchronous, caller should use spawn_blocking)
        let mut workbook: Xlsx<BufReader<File>> = match open_workbook(&self.workbook_path) {
            Ok(wb) => wb,
            Err(e) => return Err(ExcelImportError::WorkbookOpen(e.to_string())),
        };

        let sheet_name = match sheet_name {
            Some(name) => name.to_string(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or(ExcelImportError::NoSheets)?,
        };
        info!("Parsing sheet: {}", sheet_name);

        let range = match workbook.worksheet_range(&sheet_name) {
            Ok(range) => range,
            Err(_) => return Err(ExcelImportError::SheetNotFound(sheet_name)),
        };

        let batch = grid_to_batch(&range)?;
        info!(
            "Parsed {} rows ({} cells) from sheet {}",
            batch.rows.len(),
            batch.cell_count(),
            sheet_name
        );
        Ok(batch)
    }
}

/// Convert a worksheet range into a batch
pub fn grid_to_batch(range: &Range<Data>) -> Result<ImportBatch, ExcelImportError> {
    let date_headers = parse_date_headers(range);
    if date_headers.iter().all(Option::is_none) {
        return Err(ExcelImportError::MissingDateHeaders);
    }
    debug!("Found {} date columns", date_headers.len());

    let mut batch = ImportBatch::new(EXCEL_SOURCE_NOTE);
    for row_idx in 1..range.height() {
        let label = range
            .get((row_idx, 0))
            .and_then(label_text)
            .unwrap_or_default();

        let cells: Vec<RawCell> = date_headers
            .iter()
            .enumerate()
            .filter_map(|(idx, header)| {
                let header = header.as_ref()?;
                let value = range.get((row_idx, idx + 1)).and_then(cell_value)?;
                Some(RawCell {
                    date: header.clone(),
                    value,
                })
            })
            .collect();

        if label.is_empty() {
            if cells.is_empty() {
                debug!("Blank row {}, skipping", row_idx);
                continue;
            }
            // Kept so the import reports it as a row without identity
            debug!("No label at row {} with {} values", row_idx, cells.len());
        }

        batch.rows.push(ImportRow { label, cells });
    }

    Ok(batch)
}

/// Header cells from column B onwards; `None` keeps column positions for blanks
fn parse_date_headers(range: &Range<Data>) -> Vec<Option<String>> {
    (1..range.width())
        .map(|col| match range.get((0, col)) {
            Some(Data::DateTime(_)) => range
                .get((0, col))
                .and_then(|cell| cell.as_date())
                .map(|d| d.format("%Y-%m-%d").to_string()),
            Some(Data::DateTimeIso(s)) | Some(Data::String(s)) if !s.trim().is_empty() => {
                Some(s.trim().to_string())
            }
            Some(Data::Empty) | None => None,
            Some(other) => {
                warn!("Unexpected date header at col {}: {}", col, other);
                Some(other.to_string())
            }
        })
        .collect()
}

fn label_text(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(format!("{f:.0}")),
        _ => None,
    }
}

fn cell_value(cell: &Data) -> Option<CellValue> {
    match cell {
        Data::Float(f) => Some(CellValue::Number(*f)),
        Data::Int(i) => Some(CellValue::Number(*i as f64)),
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::Empty => None,
        other => Some(CellValue::Text(other.to_string())),
    }
}
