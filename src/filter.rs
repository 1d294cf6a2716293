use crate::schema::{COL_IP, COL_PMTA};
use crate::table::Table;
use std::collections::HashSet;

/// Counts of rows removed by the filtering stage
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterReport {
    pub duplicate_pmtas: usize,
    pub self_references: usize,
}

/// Keep the first row for every distinct PMTA value, preserving row order.
/// Returns the number of rows dropped.
pub fn dedup_summary(table: &mut Table) -> usize {
    let Some(pmta_idx) = table.column_index(COL_PMTA) else {
        return 0;
    };

    let before = table.rows.len();
    let mut seen = HashSet::new();
    table
        .rows
        .retain(|row| seen.insert(row[pmta_idx].as_text()));

    let dropped = before - table.rows.len();
    if dropped > 0 {
        log::debug!("Dropped {} duplicate PMTA rows from {}", dropped, table.name);
    }
    dropped
}

/// Remove detailed rows whose IP equals their PMTA. An IP cannot be its own gateway.
/// Rows with no IP are left alone, they never qualify for selection anyway.
pub fn drop_self_references(table: &mut Table) -> usize {
    let (Some(ip_idx), Some(pmta_idx)) = (table.column_index(COL_IP), table.column_index(COL_PMTA))
    else {
        return 0;
    };

    let before = table.rows.len();
    table
        .rows
        .retain(|row| row[ip_idx].is_blank() || row[ip_idx].as_text() != row[pmta_idx].as_text());

    let dropped = before - table.rows.len();
    if dropped > 0 {
        log::debug!(
            "Dropped {} self-referencing rows from {}",
            dropped,
            table.name
        );
    }
    dropped
}

pub fn apply(detailed: &mut Table, summary: &mut Table) -> FilterReport {
    FilterReport {
        duplicate_pmtas: dedup_summary(summary),
        self_references: drop_self_references(detailed),
    }
}
