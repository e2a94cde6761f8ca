use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::importers::{CellValue, ImportBatch, ImportRow, RawCell};

pub const CSV_SOURCE_NOTE: &str = "Imported from CSV";

const CANDIDATE_DELIMITERS: [u8; 3] = [b';', b',', b'\t'];

#[derive(Error, Debug)]
pub enum DelimitedImportError {
    #[error("Failed to read delimited data: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing header row")]
    MissingHeader,
}

/// Reader for meter grids exported as delimited text.
///
/// # Expected Layout:
/// ```text
/// Zähler;02.01.25;03.01.25;06.01.25
/// 1.OG Links [6063928];1200,5;1201,7;1205,0
/// Main Building 749304;88;;91
/// ```
/// The first column holds the decorated meter label, the remaining header
/// cells are dates. Blank cells are dropped; everything else is passed on
/// unparsed.
pub struct DelimitedImporter {
    delimiter: Option<u8>,
}

impl DelimitedImporter {
    /// Importer that sniffs the delimiter from the header line
    pub fn new() -> Self {
        Self { delimiter: None }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter: Some(delimiter),
        }
    }

    pub fn parse_path(&self, path: impl AsRef<Path>) -> Result<ImportBatch, DelimitedImportError> {
        let path = path.as_ref();
        info!("Parsing delimited file: {}", path.display());
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;
        self.parse_bytes(&bytes)
    }

    /// Parse raw file content. UTF-8 is expected; anything else is read as
    /// Latin-1, which covers the umlauts of Windows-1252 exports.
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<ImportBatch, DelimitedImportError> {
        match std::str::from_utf8(bytes) {
            Ok(content) => self.parse_str(content),
            Err(e) => {
                warn!(
                    "Input is not valid UTF-8 (at byte {}), decoding as Latin-1",
                    e.valid_up_to()
                );
                let content: String = bytes.iter().map(|&b| char::from(b)).collect();
                self.parse_str(&content)
            }
        }
    }

    pub fn parse_str(&self, content: &str) -> Result<ImportBatch, DelimitedImportError> {
        let content = content.trim_start_matches('\u{feff}');
        let delimiter = self
            .delimiter
            .unwrap_or_else(|| sniff_delimiter(content.lines().next().unwrap_or_default()));
        debug!("Using delimiter {:?}", delimiter as char);

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .delimiter(delimiter)
            .from_reader(content.as_bytes());

        let mut records = reader.records();
        let header = match records.next() {
            Some(record) => record?,
            None => return Err(DelimitedImportError::MissingHeader),
        };
        let date_headers: Vec<String> = header.iter().skip(1).map(str::to_string).collect();
        if date_headers.is_empty() {
            return Err(DelimitedImportError::MissingHeader);
        }

        let mut batch = ImportBatch::new(CSV_SOURCE_NOTE);
        for record in records {
            let record = record?;
            if let Some(row) = row_from_record(&record, &date_headers) {
                batch.rows.push(row);
            }
        }

        info!(
            "Parsed {} rows ({} cells) across {} date columns",
            batch.rows.len(),
            batch.cell_count(),
            date_headers.len()
        );
        Ok(batch)
    }
}

impl Default for DelimitedImporter {
    fn default() -> Self {
        Self::new()
    }
}

fn row_from_record(record: &StringRecord, date_headers: &[String]) -> Option<ImportRow> {
    if record.iter().all(str::is_empty) {
        return None;
    }

    let label = record.get(0).unwrap_or_default().to_string();
    let cells = date_headers
        .iter()
        .zip(record.iter().skip(1))
        .filter(|(_, value)| !value.is_empty())
        .map(|(date, value)| RawCell {
            date: date.clone(),
            value: CellValue::Text(value.to_string()),
        })
        .collect();

    Some(ImportRow { label, cells })
}

/// Pick the candidate delimiter occurring most often in the header line.
/// Semicolon wins ties since decimal commas are common in these exports.
fn sniff_delimiter(header_line: &str) -> u8 {
    CANDIDATE_DELIMITERS
        .iter()
        .copied()
        .max_by_key(|d| {
            let count = header_line.bytes().filter(|b| b == d).count();
            // Earlier candidates win ties
            let priority = CANDIDATE_DELIMITERS.len()
                - CANDIDATE_DELIMITERS
                    .iter()
                    .position(|c| c == d)
                    .unwrap_or_default();
            (count, priority)
        })
        .unwrap_or(b',')
}
