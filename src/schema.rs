use crate::error::{PickerError, Result};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const COL_IP: &str = "IP";
pub const COL_RDNS: &str = "rDNS";
pub const COL_FDNS: &str = "fDNS";
pub const COL_PMTA: &str = "PMTA";

pub const DETAILED_COLUMNS: [&str; 4] = [COL_IP, COL_RDNS, COL_FDNS, COL_PMTA];

/// What to do when both inputs look like the detailed table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The first input wins
    First,
    /// The input with more data rows wins, the first one on a tie
    #[default]
    MoreRows,
    /// Refuse to guess
    Reject,
}

impl FromStr for TieBreak {
    type Err = PickerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "first" => Ok(TieBreak::First),
            "more_rows" => Ok(TieBreak::MoreRows),
            "reject" => Ok(TieBreak::Reject),
            other => Err(PickerError::Config(format!(
                "Unknown tie-break policy '{}' (expected first, more_rows or reject)",
                other
            ))),
        }
    }
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TieBreak::First => "first",
            TieBreak::MoreRows => "more_rows",
            TieBreak::Reject => "reject",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct Classified {
    pub detailed: Table,
    pub summary: Table,
}

pub fn is_detailed(table: &Table) -> bool {
    table.has_columns(&DETAILED_COLUMNS)
}

/// Decide which of the two tables is the detailed one and which is the PMTA list.
pub fn classify(first: Table, second: Table, tie_break: TieBreak) -> Result<Classified> {
    let (detailed, summary) = match (is_detailed(&first), is_detailed(&second)) {
        (true, false) => (first, second),
        (false, true) => (second, first),
        (false, false) => return Err(PickerError::SchemaMismatch),
        (true, true) => {
            log::warn!(
                "Both {} and {} qualify as the detailed table, applying tie-break '{}'",
                first.name,
                second.name,
                tie_break
            );
            match tie_break {
                TieBreak::First => (first, second),
                TieBreak::MoreRows if second.len() > first.len() => (second, first),
                TieBreak::MoreRows => (first, second),
                TieBreak::Reject => return Err(PickerError::AmbiguousSchema),
            }
        }
    };

    if summary.column_index(COL_PMTA).is_none() {
        return Err(PickerError::MissingColumn {
            table: summary.name.clone(),
            column: COL_PMTA.to_string(),
        });
    }

    log::info!(
        "Detailed file: {} ({} rows), PMTA list file: {} ({} rows)",
        detailed.name,
        detailed.len(),
        summary.name,
        summary.len()
    );

    Ok(Classified { detailed, summary })
}
