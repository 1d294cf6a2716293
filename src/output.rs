use crate::error::{PickerError, Result};
use crate::priority::{RankedGroup, Selection};
use crate::sanitize::sanitize_cell;
use crate::schema::COL_PMTA;
use crate::table::{Cell, Table};
use chrono::{DateTime, Local, TimeZone};
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const COL_PRIORITY1: &str = "Priority1_rDNS";
pub const COL_PRIORITY2: &str = "Priority2_No_fDNS";

pub const DEFAULT_PREFIX: &str = "PMTA_Output";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Xlsx,
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Csv => "csv",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = PickerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "xlsx" => Ok(OutputFormat::Xlsx),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(PickerError::Config(format!(
                "Unknown output format '{}' (expected xlsx or csv)",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Left-join the ranked selections onto the PMTA list. PMTAs without a group get
/// empty strings, and both selection columns go through the IPv4 sanitizer.
pub fn assemble(mut summary: Table, ranked: &[RankedGroup]) -> Result<Table> {
    let pmta_idx = summary
        .column_index(COL_PMTA)
        .ok_or_else(|| PickerError::MissingColumn {
            table: summary.name.clone(),
            column: COL_PMTA.to_string(),
        })?;

    let selections: HashMap<&str, &Selection> = ranked
        .iter()
        .map(|r| (r.pmta.as_str(), &r.selection))
        .collect();

    let p1_idx = summary.ensure_column(COL_PRIORITY1);
    let p2_idx = summary.ensure_column(COL_PRIORITY2);

    for row in &mut summary.rows {
        let key = row[pmta_idx].as_text();
        let (p1, p2) = match selections.get(key.as_str()) {
            Some(selection) if !row[pmta_idx].is_blank() => {
                (selection.priority1_joined(), selection.priority2_joined())
            }
            _ => (String::new(), String::new()),
        };
        row[p1_idx] = Cell::Text(p1);
        row[p2_idx] = Cell::Text(p2);
    }

    sanitize_columns(&mut summary, &[p1_idx, p2_idx]);
    Ok(summary)
}

fn sanitize_columns(table: &mut Table, columns: &[usize]) {
    for row in &mut table.rows {
        for &idx in columns {
            row[idx] = Cell::Text(sanitize_cell(&row[idx]));
        }
    }
}

/// `{prefix}_YYYY-MM-DD_HH-MM-SS.{ext}`
pub fn output_file_name<Tz: TimeZone>(
    prefix: &str,
    format: OutputFormat,
    at: &DateTime<Tz>,
) -> String
where
    Tz::Offset: fmt::Display,
{
    format!(
        "{}_{}.{}",
        prefix,
        at.format("%Y-%m-%d_%H-%M-%S"),
        format.extension()
    )
}

pub fn timestamped_file_name(prefix: &str, format: OutputFormat) -> String {
    output_file_name(prefix, format, &Local::now())
}

/// Write the table into `dir` under a timestamped name and return the full path
pub fn persist(table: &Table, dir: &Path, prefix: &str, format: OutputFormat) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(timestamped_file_name(prefix, format));
    write_table(table, &path, format)?;
    log::info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(path)
}

pub fn write_table(table: &Table, path: &Path, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Xlsx => write_xlsx(table, path),
        OutputFormat::Csv => write_csv(table, path),
    }
}

fn write_xlsx(table: &Table, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let col_num = |idx: usize| {
        u16::try_from(idx).map_err(|_| PickerError::Write(format!("Too many columns ({})", idx)))
    };
    let row_num = |idx: usize| {
        u32::try_from(idx).map_err(|_| PickerError::Write(format!("Too many rows ({})", idx)))
    };

    for (c, header) in table.headers.iter().enumerate() {
        worksheet.write_string(0, col_num(c)?, header.as_str())?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let r = row_num(r + 1)?;
        for (c, cell) in row.iter().enumerate() {
            let c = col_num(c)?;
            match cell {
                Cell::Empty => {}
                Cell::Text(s) if s.is_empty() => {}
                Cell::Text(s) => {
                    worksheet.write_string(r, c, s.as_str())?;
                }
                Cell::Number(n) => {
                    worksheet.write_number(r, c, *n)?;
                }
                Cell::Bool(b) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.as_text()))?;
    }
    writer.flush()?;
    Ok(())
}
