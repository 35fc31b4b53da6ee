//! Tabular source readers for spreadsheets and CSV exports.

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use thiserror::Error;

/// One spreadsheet cell, reduced to what ingestion cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Text content trimmed of surrounding whitespace; numbers render plainly.
    pub fn text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(text) => text.trim().to_string(),
            Cell::Number(value) => value.to_string(),
        }
    }
}

/// Header row plus data rows of a source table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl SheetTable {
    /// Build a table from string literals; blank strings become empty cells.
    pub fn from_text_rows(headers: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|value| {
                            if value.is_empty() {
                                Cell::Empty
                            } else {
                                Cell::Text(value.to_string())
                            }
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

/// Errors raised while reading a source file.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to open workbook: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("Workbook has no worksheets")]
    NoWorksheet,
    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unsupported source format `{0}` (expected .xlsx, .xlsm, .xlsb, .xls, .ods, or .csv)")]
    UnsupportedFormat(String),
}

/// Read the first worksheet (or the CSV file) at `path`.
pub fn read_table(path: &Path) -> Result<SheetTable, SourceError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "csv" => read_csv(path),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(path),
        other => Err(SourceError::UnsupportedFormat(other.to_string())),
    }
}

fn read_workbook(path: &Path) -> Result<SheetTable, SourceError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SourceError::NoWorksheet)??;
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(SheetTable::default());
    };
    let headers = header_row.iter().map(|cell| convert_cell(cell).text()).collect();
    let rows = rows
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();
    Ok(SheetTable { headers, rows })
}

fn convert_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(value) => Cell::Number(*value as f64),
        Data::Float(value) => Cell::Number(*value),
        Data::String(text) => Cell::Text(text.clone()),
        other => Cell::Text(other.to_string()),
    }
}

fn read_csv(path: &Path) -> Result<SheetTable, SourceError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|value| {
                    if value.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(value.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(SheetTable { headers, rows })
}
