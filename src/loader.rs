use crate::error::{PickerError, Result};
use crate::table::{Cell, Table};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Spreadsheet,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(InputFormat::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(InputFormat::Spreadsheet),
            _ => Err(PickerError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Load a CSV file or the first worksheet of a spreadsheet. The first row is the header.
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let table = match InputFormat::from_path(path)? {
        InputFormat::Csv => {
            let file = std::fs::File::open(path)?;
            parse_csv(&name, file)?
        }
        InputFormat::Spreadsheet => load_spreadsheet(&name, path)?,
    };

    log::debug!(
        "Loaded {}: {} columns, {} rows",
        table.name,
        table.headers.len(),
        table.len()
    );
    Ok(table)
}

pub fn parse_csv<R: Read>(name: &str, reader: R) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(PickerError::EmptyInput(name.to_string()));
    }

    let mut table = Table::new(name, headers);
    for record in reader.records() {
        let record = record?;
        let row = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    Cell::Empty
                } else {
                    Cell::text(field)
                }
            })
            .collect();
        table.push_row(row);
    }

    Ok(table)
}

fn load_spreadsheet(name: &str, path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| PickerError::Spreadsheet(format!("Failed to open {}: {}", name, e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PickerError::EmptyInput(name.to_string()))?
        .map_err(|e| PickerError::Spreadsheet(format!("Failed to read {}: {}", name, e)))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| convert_cell(cell).as_text().trim().to_string())
            .collect(),
        None => return Err(PickerError::EmptyInput(name.to_string())),
    };

    let mut table = Table::new(name, headers);
    for row in rows {
        table.push_row(row.iter().map(convert_cell).collect());
    }

    Ok(table)
}

fn convert_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        other => Cell::Text(other.to_string()),
    }
}
