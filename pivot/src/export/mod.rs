//! Tabular writer: the wide table to a single-sheet workbook or a CSV file.
//!
//! The output format follows the destination extension (`.csv` writes CSV,
//! anything else XLSX). Row order is preserved and null cells stay blank.
//! Descriptive columns whose values are all numeric are written as numbers;
//! question columns are always text.

use std::path::Path;

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, XlsxError};

use crate::error::{ExportError, ExportResult};
use crate::models::{Cell, WideTable};

/// Rows per sheet, header included.
pub const MAX_SHEET_ROWS: usize = 1_048_576;
/// Columns per sheet.
pub const MAX_SHEET_COLUMNS: usize = 16_384;
/// Characters per cell.
pub const MAX_CELL_CHARS: usize = 32_767;

const SHEET_NAME: &str = "Sheet1";

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ExportFormat::Csv,
            _ => ExportFormat::Xlsx,
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Xlsx => f.write_str("xlsx"),
            ExportFormat::Csv => f.write_str("csv"),
        }
    }
}

/// Write `table` to `path` in the format its extension implies.
pub fn write_table(table: &WideTable, path: &Path) -> ExportResult<ExportFormat> {
    let format = ExportFormat::from_path(path);
    match format {
        ExportFormat::Xlsx => write_xlsx(table, path)?,
        ExportFormat::Csv => write_csv(table, path)?,
    }
    Ok(format)
}

// =============================================================================
// XLSX
// =============================================================================

pub fn write_xlsx(table: &WideTable, path: &Path) -> ExportResult<()> {
    if table.rows.len() + 1 > MAX_SHEET_ROWS || table.columns.len() > MAX_SHEET_COLUMNS {
        return Err(ExportError::TooLarge {
            rows: table.rows.len(),
            columns: table.columns.len(),
        });
    }
    check_cell_lengths(table)?;
    build_workbook(table, path).map_err(|source| ExportError::Xlsx {
        path: path.to_path_buf(),
        source,
    })
}

/// Reject the first cell (header included) over [`MAX_CELL_CHARS`]. Rows
/// are counted as on the sheet, the header being row 1.
fn check_cell_lengths(table: &WideTable) -> ExportResult<()> {
    let header = table.columns.iter().map(|name| Some(name.as_str()));
    let rows = std::iter::once(header.collect::<Vec<_>>())
        .chain(table.rows.iter().map(|row| row.iter().map(Cell::as_deref).collect()));

    for (r, row) in rows.enumerate() {
        for (col, text) in row.into_iter().enumerate() {
            let Some(text) = text else { continue };
            // Byte length bounds the char count.
            if text.len() <= MAX_CELL_CHARS {
                continue;
            }
            let length = text.chars().count();
            if length > MAX_CELL_CHARS {
                return Err(ExportError::CellTooLong {
                    column: table.columns.get(col).cloned().unwrap_or_default(),
                    row: r + 1,
                    length,
                    limit: MAX_CELL_CHARS,
                });
            }
        }
    }
    Ok(())
}

fn build_workbook(table: &WideTable, path: &Path) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new()
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin);
    let numeric = numeric_columns(table);

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    // Limits were checked by the caller, so the casts cannot truncate.
    for (col, name) in table.columns.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, name, &header_format)?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        let xl_row = r as u32 + 1;
        for (col, cell) in row.iter().enumerate() {
            let Some(text) = cell.as_deref() else { continue };
            let number = match numeric.get(col) {
                Some(true) => text.parse::<f64>().ok(),
                _ => None,
            };
            match number {
                Some(n) => sheet.write_number(xl_row, col as u16, n)?,
                None => sheet.write_string(xl_row, col as u16, text)?,
            };
        }
    }

    workbook.save(path)
}

/// Which columns are written as numbers.
///
/// Only descriptive columns qualify, and only when every non-null value is
/// a finite number without a leading zero (so codes like `007` stay text).
fn numeric_columns(table: &WideTable) -> Vec<bool> {
    (0..table.columns.len())
        .map(|col| col < table.descriptive && is_numeric_column(table, col))
        .collect()
}

fn is_numeric_column(table: &WideTable, col: usize) -> bool {
    let mut values = table
        .rows
        .iter()
        .filter_map(|row| row.get(col).and_then(Cell::as_deref))
        .peekable();
    values.peek().is_some() && values.all(looks_numeric)
}

fn looks_numeric(text: &str) -> bool {
    let digits = text.trim_start_matches(['+', '-']);
    let leading_zero = digits.len() > 1
        && digits.starts_with('0')
        && digits.as_bytes().get(1).is_some_and(u8::is_ascii_digit);
    !leading_zero && text.trim() == text && text.parse::<f64>().is_ok_and(f64::is_finite)
}

// =============================================================================
// CSV
// =============================================================================

pub fn write_csv(table: &WideTable, path: &Path) -> ExportResult<()> {
    let csv_err = |source: csv::Error| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(&table.columns).map_err(csv_err)?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))
            .map_err(csv_err)?;
    }
    writer.flush().map_err(|e| csv_err(e.into()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook, Data, Reader, Xlsx};
    use tempfile::tempdir;

    fn table() -> WideTable {
        WideTable {
            columns: vec!["code".into(), "lat".into(), "when".into(), "Q1".into()],
            descriptive: 3,
            rows: vec![
                vec![Some("007".into()), Some("23.5".into()), Some("2024-01-01".into()), Some("12".into())],
                vec![Some("8".into()), None, Some("2024-01-02".into()), None],
            ],
        }
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("out.CSV")), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_path(Path::new("out.xlsx")), ExportFormat::Xlsx);
        assert_eq!(ExportFormat::from_path(Path::new("out")), ExportFormat::Xlsx);
    }

    #[test]
    fn test_numeric_columns() {
        assert_eq!(numeric_columns(&table()), vec![false, true, false, false]);
    }

    #[test]
    fn test_looks_numeric() {
        assert!(looks_numeric("23.5"));
        assert!(looks_numeric("-0.5"));
        assert!(looks_numeric("0"));
        assert!(!looks_numeric("007"));
        assert!(!looks_numeric("inf"));
        assert!(!looks_numeric(" 1"));
        assert!(!looks_numeric("1,5"));
    }

    #[test]
    fn test_write_xlsx() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        assert_eq!(write_table(&table(), &path).unwrap(), ExportFormat::Xlsx);

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();

        assert_eq!(range.get((0, 0)), Some(&Data::String("code".into())));
        assert_eq!(range.get((0, 3)), Some(&Data::String("Q1".into())));
        assert_eq!(range.get((1, 0)), Some(&Data::String("007".into())));
        assert_eq!(range.get((1, 1)), Some(&Data::Float(23.5)));
        assert_eq!(range.get((1, 3)), Some(&Data::String("12".into())));
        assert_eq!(range.get((2, 0)), Some(&Data::String("8".into())));
        assert!(matches!(range.get((2, 1)), None | Some(Data::Empty)));
        assert_eq!(range.get((2, 2)), Some(&Data::String("2024-01-02".into())));
    }

    #[test]
    fn test_write_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.csv");
        assert_eq!(write_table(&table(), &path).unwrap(), ExportFormat::Csv);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "code,lat,when,Q1\n007,23.5,2024-01-01,12\n8,,2024-01-02,\n"
        );
    }

    #[test]
    fn test_overlong_cell_names_its_position() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        let mut t = table();
        t.rows[1][3] = Some("x".repeat(MAX_CELL_CHARS + 1));

        let err = write_table(&t, &path).unwrap_err();
        match &err {
            ExportError::CellTooLong { column, row, length, .. } => {
                assert_eq!(column, "Q1");
                assert_eq!(*row, 3);
                assert_eq!(*length, MAX_CELL_CHARS + 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!path.exists());

        // Multi-byte text at the limit still fits.
        t.rows[1][3] = Some("é".repeat(MAX_CELL_CHARS));
        write_table(&t, &path).unwrap();

        // CSV has no cell limit.
        t.rows[1][3] = Some("x".repeat(MAX_CELL_CHARS + 1));
        write_table(&t, &dir.path().join("report.csv")).unwrap();
    }

    #[test]
    fn test_write_error_names_path() {
        let err = write_table(&table(), Path::new("/nonexistent/dir/report.xlsx")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/dir/report.xlsx"));

        let err = write_table(&table(), Path::new("/nonexistent/dir/report.csv")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/dir/report.csv"));
    }
}
