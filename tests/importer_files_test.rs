// File-based importer tests (no database required)

use std::io::Write;

use meter_reconciliation_service::importers::{
    CellValue, DelimitedImporter, ExcelImportError, ExcelImporter,
};
use meter_reconciliation_service::services::import_service::prepare_row;
use tempfile::NamedTempFile;

#[test]
fn test_parse_delimited_file_from_disk() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        "\u{feff}Zähler;02.01.25;03.01.25;06.01.25\r\n\
         1.OG Links [6063928];1200,5;1201,7;1205,0\r\n\
         Main Building 749304;88;;91\r\n"
    )
    .unwrap();

    let batch = DelimitedImporter::new().parse_path(file.path()).unwrap();

    assert_eq!(batch.rows.len(), 2);
    assert_eq!(batch.cell_count(), 5);
    assert_eq!(batch.rows[0].cells[0].date, "02.01.25");
    assert_eq!(
        batch.rows[0].cells[0].value,
        CellValue::Text("1200,5".to_string())
    );

    let prepared = prepare_row(&batch.rows[1]);
    assert_eq!(prepared.serial, "749304");
    assert_eq!(prepared.values.len(), 2);
    assert_eq!(prepared.values[1].1, 91.0);
}

#[test]
fn test_parse_windows_1252_file_from_disk() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"Z\xe4hler;03.03.25\r\nHeizung K\xfcche [5511];98,5\r\n")
        .unwrap();

    let batch = DelimitedImporter::new().parse_path(file.path()).unwrap();

    assert_eq!(batch.rows.len(), 1);
    assert_eq!(batch.rows[0].label, "Heizung Küche [5511]");
    assert_eq!(prepare_row(&batch.rows[0]).values[0].1, 98.5);
}

#[test]
fn test_missing_delimited_file() {
    let result = DelimitedImporter::new().parse_path("/nonexistent/readings.csv");
    assert!(result.is_err());
}

#[test]
fn test_excel_importer_rejects_non_workbook() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "this is not a workbook").unwrap();

    let importer = ExcelImporter::new(file.path().to_string_lossy().to_string());
    let result = importer.parse_sheet(None);

    assert!(matches!(result, Err(ExcelImportError::WorkbookOpen(_))));
}
