//! Spreadsheet reading
//!
//! Turns an Excel/ODS workbook (first worksheet) or a CSV file into columns of
//! cell text. Interpretation of the text is left to the key loader.

use calamine::{Data, Reader, open_workbook_auto};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Extensions accepted by [`read_table`]
pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods", "csv"];

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Failed to open spreadsheet {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("Spreadsheet {path} has no worksheets")]
    NoWorksheet { path: PathBuf },

    #[error("Failed to read worksheet in {path}: {source}")]
    Worksheet {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("Failed to read CSV file {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Unsupported file type '{extension}' (expected one of: {})", SUPPORTED_EXTENSIONS.join(", "))]
    UnsupportedExtension { extension: String },
}

/// Cell text laid out column by column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Column titles; empty when the sheet has no header row
    pub headers: Vec<String>,
    /// `columns[c][r]` is the text of data row `r` in column `c`
    pub columns: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Build from rows of cells. Ragged rows are padded with empty cells.
    pub fn from_rows(rows: Vec<Vec<Option<String>>>, has_header_row: bool) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut rows = rows.into_iter();

        let headers = if has_header_row {
            rows.next()
                .map(|header| {
                    (0..width)
                        .map(|c| header.get(c).cloned().flatten().unwrap_or_default())
                        .collect()
                })
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
        for row in rows {
            let mut cells = row.into_iter();
            for column in &mut columns {
                column.push(cells.next().flatten());
            }
        }

        Self { headers, columns }
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }
}

/// Read the file at `path` into a [`Table`]
pub fn read_table(path: &Path, has_header_row: bool) -> Result<Table, SpreadsheetError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let rows = match extension.as_str() {
        "csv" => read_csv_rows(path)?,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook_rows(path)?,
        _ => return Err(SpreadsheetError::UnsupportedExtension { extension }),
    };

    let table = Table::from_rows(rows, has_header_row);
    debug!(
        "Read {} column(s) x {} row(s) from {}",
        table.columns.len(),
        table.row_count(),
        path.display()
    );
    Ok(table)
}

fn read_workbook_rows(path: &Path) -> Result<Vec<Vec<Option<String>>>, SpreadsheetError> {
    let mut workbook = open_workbook_auto(path).map_err(|source| SpreadsheetError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SpreadsheetError::NoWorksheet { path: path.to_path_buf() })?
        .map_err(|source| SpreadsheetError::Worksheet {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(range.rows().map(|row| row.iter().map(cell_text).collect()).collect())
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<Option<String>>>, SpreadsheetError> {
    let csv_error = |source| SpreadsheetError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let delimiter = sniff_delimiter(path).map_err(|e| csv_error(csv::Error::from(e)))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .map_err(csv_error)?;

    // Fields are decoded one by one so a legacy-encoded header (Windows-1252
    // exports are common) does not make the key column unreadable.
    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(csv_error)?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    let field = String::from_utf8_lossy(field);
                    let field = field.trim_start_matches('\u{feff}');
                    (!field.trim().is_empty()).then(|| field.to_string())
                })
                .collect(),
        );
    }
    Ok(rows)
}

/// Semicolon-separated exports are common; pick whichever separator
/// dominates the first line.
fn sniff_delimiter(path: &Path) -> std::io::Result<u8> {
    let mut first_line = Vec::new();
    BufReader::new(File::open(path)?).read_until(b'\n', &mut first_line)?;
    let semicolons = first_line.iter().filter(|&&b| b == b';').count();
    let commas = first_line.iter().filter(|&&b| b == b',').count();
    Ok(if semicolons > commas { b';' } else { b',' })
}

/// Text of a worksheet cell; empty and error cells have none.
pub fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(float_text(*f)),
        other => Some(other.to_string()),
    }
}

/// Largest magnitude below which every integer is exactly representable
const MAX_EXACT_FLOAT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Integral floats print without `.0`. Floats too large to hold their digits
/// exactly (or very small ones) print in scientific form, so a key that Excel
/// stored as a number never reads back as a different 44-digit string.
#[allow(clippy::cast_possible_truncation)]
fn float_text(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude >= MAX_EXACT_FLOAT_INTEGER || (magnitude != 0.0 && magnitude < 1e-4) {
        format!("{value:e}")
    } else if value.fract() == 0.0 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}
