use crate::filter::FilterReport;
use crate::output::{COL_PRIORITY1, COL_PRIORITY2};
use crate::priority::{Cap, RankedGroup};
use crate::table::Table;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    pub detailed_file: String,
    pub summary_file: String,
    pub detailed_rows: usize,
    pub summary_rows: usize,
    pub duplicate_pmtas_dropped: usize,
    pub self_references_dropped: usize,
    pub groups_ranked: usize,
    pub pmtas_without_group: usize,
    pub priority1_ips: usize,
    pub priority2_ips: usize,
    pub cap: u32,
    pub output_path: Option<PathBuf>,
}

impl RunSummary {
    /// Counts are taken from the tables as they were before filtering
    pub fn new(detailed: &Table, summary: &Table, cap: Cap) -> Self {
        Self {
            detailed_file: detailed.name.clone(),
            summary_file: summary.name.clone(),
            detailed_rows: detailed.len(),
            summary_rows: summary.len(),
            duplicate_pmtas_dropped: 0,
            self_references_dropped: 0,
            groups_ranked: 0,
            pmtas_without_group: 0,
            priority1_ips: 0,
            priority2_ips: 0,
            cap: cap.into(),
            output_path: None,
        }
    }

    pub fn record_filter(&mut self, report: FilterReport) {
        self.duplicate_pmtas_dropped = report.duplicate_pmtas;
        self.self_references_dropped = report.self_references;
    }

    pub fn record_ranking<'a, I>(&mut self, pmtas: I, ranked: &[RankedGroup])
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.groups_ranked = ranked.len();
        let known: HashSet<&str> = ranked.iter().map(|r| r.pmta.as_str()).collect();
        let listed: HashSet<&str> = pmtas.into_iter().collect();
        self.pmtas_without_group = listed.iter().filter(|p| !known.contains(*p)).count();
    }

    /// Count the IPs that survived sanitizing in the assembled table
    pub fn record_output(&mut self, table: &Table) {
        let count = |column: &str| {
            table.column_index(column).map_or(0, |idx| {
                table
                    .rows
                    .iter()
                    .map(|row| {
                        row[idx]
                            .as_text()
                            .split(',')
                            .filter(|ip| !ip.is_empty())
                            .count()
                    })
                    .sum()
            })
        };
        self.priority1_ips = count(COL_PRIORITY1);
        self.priority2_ips = count(COL_PRIORITY2);
    }

    pub fn print(&self) {
        println!("📊 PMTA IP Selection Summary");
        println!("═══════════════════════════════════════");
        println!(
            "  Detailed file: {} ({} rows)",
            self.detailed_file, self.detailed_rows
        );
        println!(
            "  PMTA list file: {} ({} rows)",
            self.summary_file, self.summary_rows
        );
        println!("  ├─ Duplicate PMTAs dropped: {}", self.duplicate_pmtas_dropped);
        println!("  └─ Self-referencing IPs dropped: {}", self.self_references_dropped);
        println!();
        println!("  IPs per PMTA: {}", self.cap);
        println!("  PMTA groups ranked: {}", self.groups_ranked);
        println!("  PMTAs with no detailed rows: {}", self.pmtas_without_group);
        println!("  ├─ Priority1 (rDNS) IPs: {}", self.priority1_ips);
        println!("  └─ Priority2 (No fDNS) IPs: {}", self.priority2_ips);
        if let Some(path) = &self.output_path {
            println!();
            println!("  Output: {}", path.display());
        }
    }
}
