//! Adapters that turn the supported source formats into an [`ImportBatch`]

pub mod batch;
pub mod delimited;
pub mod excel;
pub mod mapping;
pub mod series;

// Re-export commonly used items
pub use batch::{CellValue, ImportBatch, ImportRow, RawCell};
pub use delimited::{DelimitedImportError, DelimitedImporter};
pub use excel::{ExcelImportError, ExcelImporter};
pub use mapping::ReadingMapping;
pub use series::SeriesRecord;
