use crate::error::{PickerError, Result};
use crate::filter;
use crate::loader::load_table;
use crate::output::{self, OutputFormat, DEFAULT_PREFIX};
use crate::priority::{group_rows, Cap, PriorityEngine, RankedGroup};
use crate::schema::{self, TieBreak, COL_PMTA};
use crate::statistics::RunSummary;
use crate::table::Table;
use std::path::{Path, PathBuf};

/// Everything one run needs; built from the TOML config plus CLI overrides
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub cap: Cap,
    pub tie_break: TieBreak,
    pub output_dir: PathBuf,
    pub prefix: String,
    pub format: OutputFormat,
    pub workers: usize,
    pub preview_rows: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cap: Cap::default(),
            tie_break: TieBreak::default(),
            output_dir: PathBuf::from("."),
            prefix: DEFAULT_PREFIX.to_string(),
            format: OutputFormat::default(),
            workers: 1,
            preview_rows: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Processed {
    pub table: Table,
    pub ranked: Vec<RankedGroup>,
    pub summary: RunSummary,
}

/// classify → filter → group → rank → assemble (with sanitizing). Nothing is written.
pub async fn process(first: Table, second: Table, settings: &Settings) -> Result<Processed> {
    let classified = schema::classify(first, second, settings.tie_break)?;
    let mut detailed = classified.detailed;
    let mut pmta_list = classified.summary;

    preview(&detailed, settings.preview_rows);
    preview(&pmta_list, settings.preview_rows);

    let mut summary = RunSummary::new(&detailed, &pmta_list, settings.cap);
    let report = filter::apply(&mut detailed, &mut pmta_list);
    summary.record_filter(report);
    log::info!(
        "Filtered inputs: {} duplicate PMTAs, {} self-referencing IPs dropped",
        report.duplicate_pmtas,
        report.self_references
    );

    let groups = group_rows(&detailed)?;
    log::info!(
        "Ranking {} PMTA groups with up to {} IPs each",
        groups.len(),
        settings.cap
    );
    let engine = PriorityEngine::new(settings.cap).with_workers(settings.workers);
    let ranked = engine.rank_all_concurrent(groups).await?;

    let pmta_idx = pmta_list
        .column_index(COL_PMTA)
        .ok_or_else(|| PickerError::MissingColumn {
            table: pmta_list.name.clone(),
            column: COL_PMTA.to_string(),
        })?;
    let keys: Vec<String> = pmta_list.rows.iter().map(|r| r[pmta_idx].as_text()).collect();
    summary.record_ranking(keys.iter().map(|k| k.as_str()), &ranked);

    let table = output::assemble(pmta_list, &ranked)?;
    summary.record_output(&table);
    Ok(Processed {
        table,
        ranked,
        summary,
    })
}

/// Load exactly two input files, process them and write the result under a timestamped name
pub async fn run_files<P: AsRef<Path>>(inputs: &[P], settings: &Settings) -> Result<Processed> {
    if inputs.len() != 2 {
        return Err(PickerError::InputCountMismatch {
            found: inputs.len(),
        });
    }

    let first = load_table(&inputs[0])?;
    let second = load_table(&inputs[1])?;

    let mut processed = process(first, second, settings).await?;
    let path = output::persist(
        &processed.table,
        &settings.output_dir,
        &settings.prefix,
        settings.format,
    )?;
    processed.summary.output_path = Some(path);
    Ok(processed)
}

fn preview(table: &Table, rows: usize) {
    if rows == 0 {
        return;
    }
    log::info!("Preview of {}: {}", table.name, table.headers.join(" | "));
    for row in table.rows.iter().take(rows) {
        let cells: Vec<String> = row.iter().map(|c| c.as_text()).collect();
        log::info!("  {}", cells.join(" | "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{COL_PRIORITY1, COL_PRIORITY2};
    use crate::table::Cell;
    use std::io::Write;

    fn detailed(rows: &[(&str, &str, &str, &str)]) -> Table {
        let mut table = Table::new(
            "detailed.csv",
            vec!["IP".into(), "rDNS".into(), "fDNS".into(), "PMTA".into()],
        );
        for (ip, rdns, fdns, pmta) in rows {
            table.push_row(vec![
                Cell::text(ip),
                Cell::text(rdns),
                Cell::text(fdns),
                Cell::text(pmta),
            ]);
        }
        table
    }

    fn pmta_list(pmtas: &[&str]) -> Table {
        let mut table = Table::new("pmta.csv", vec!["PMTA".into(), "Note".into()]);
        for (i, pmta) in pmtas.iter().enumerate() {
            table.push_row(vec![Cell::text(pmta), Cell::Text(format!("row{}", i))]);
        }
        table
    }

    fn column(table: &Table, name: &str) -> Vec<String> {
        let idx = table.column_index(name).unwrap();
        table.rows.iter().map(|r| r[idx].as_text()).collect()
    }

    #[tokio::test]
    async fn test_end_to_end_in_memory() {
        let detailed = detailed(&[
            ("198.51.100.9", "self.example.com", "ok", "198.51.100.9"),
            ("10.0.0.9", "mx1.example.com", "No_fDNS", "198.51.100.9"),
            ("10.0.0.8", "relay.example.com", "ok", "198.51.100.9"),
            ("10.0.0.1", "mail.example.com", "ok", "203.0.113.5"),
            ("10.0.0.2", "No_rDNS", "ok", "203.0.113.5"),
            ("2001:db8::5", "No_rDNS", "ok", "203.0.113.5"),
            ("10.0.0.3", "mx12.example.com", "No_fDNS", "203.0.113.5"),
            ("10.1.0.1", "mail.example.com", "ok", "192.0.2.200"),
        ]);
        let list = pmta_list(&["203.0.113.5", "198.51.100.9", "203.0.113.5", "192.0.2.1"]);

        let processed = process(list, detailed, &Settings::default()).await.unwrap();
        let table = &processed.table;

        assert_eq!(table.len(), 3);
        assert_eq!(column(table, "Note"), vec!["row0", "row1", "row3"]);
        assert_eq!(
            column(table, COL_PRIORITY1),
            vec!["10.0.0.1,10.0.0.2", "10.0.0.8", ""]
        );
        assert_eq!(column(table, COL_PRIORITY2), vec!["10.0.0.3", "10.0.0.9", ""]);

        let summary = &processed.summary;
        assert_eq!(summary.detailed_file, "detailed.csv");
        assert_eq!(summary.duplicate_pmtas_dropped, 1);
        assert_eq!(summary.self_references_dropped, 1);
        assert_eq!(summary.groups_ranked, 3);
        assert_eq!(summary.pmtas_without_group, 1);
        assert_eq!(summary.priority1_ips, 3);
        assert_eq!(summary.priority2_ips, 2);
    }

    #[tokio::test]
    async fn test_schema_mismatch_aborts() {
        let result = process(pmta_list(&["a"]), pmta_list(&["b"]), &Settings::default()).await;
        assert!(matches!(result, Err(PickerError::SchemaMismatch)));
    }

    #[tokio::test]
    async fn test_concurrent_settings_give_same_table() {
        let rows: Vec<(String, String, String, String)> = (0..40)
            .map(|i| {
                (
                    format!("10.0.{}.{}", i % 5, i),
                    if i % 3 == 0 {
                        "No_rDNS".to_string()
                    } else {
                        format!("h{}.example.com", i)
                    },
                    if i % 2 == 0 {
                        "No_fDNS".to_string()
                    } else {
                        "ok".to_string()
                    },
                    format!("198.51.100.{}", i % 5),
                )
            })
            .collect();
        let borrowed: Vec<(&str, &str, &str, &str)> = rows
            .iter()
            .map(|(a, b, c, d)| (a.as_str(), b.as_str(), c.as_str(), d.as_str()))
            .collect();
        let pmtas: Vec<String> = (0..6).map(|i| format!("198.51.100.{}", i)).collect();
        let pmta_refs: Vec<&str> = pmtas.iter().map(|s| s.as_str()).collect();

        let sequential = process(detailed(&borrowed), pmta_list(&pmta_refs), &Settings::default())
            .await
            .unwrap();
        let settings = Settings {
            workers: 3,
            ..Settings::default()
        };
        let concurrent = process(detailed(&borrowed), pmta_list(&pmta_refs), &settings)
            .await
            .unwrap();

        assert_eq!(sequential.table.rows, concurrent.table.rows);
        assert_eq!(sequential.ranked, concurrent.ranked);
    }

    #[tokio::test]
    async fn test_run_files_requires_two_inputs() {
        let result = run_files(&["only.csv"], &Settings::default()).await;
        assert!(matches!(
            result,
            Err(PickerError::InputCountMismatch { found: 1 })
        ));

        let result = run_files(&["a.csv", "b.csv", "c.csv"], &Settings::default()).await;
        assert!(matches!(
            result,
            Err(PickerError::InputCountMismatch { found: 3 })
        ));
    }

    #[tokio::test]
    async fn test_run_files_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let detailed_path = dir.path().join("detailed.csv");
        let list_path = dir.path().join("pmta.csv");

        let mut file = std::fs::File::create(&detailed_path).unwrap();
        writeln!(file, "IP,rDNS,fDNS,PMTA").unwrap();
        writeln!(file, "10.0.0.1,mail.example.com,ok,203.0.113.5").unwrap();
        writeln!(file, "10.0.0.2,mx12.example.com,No_fDNS,203.0.113.5").unwrap();
        drop(file);

        let mut file = std::fs::File::create(&list_path).unwrap();
        writeln!(file, "PMTA").unwrap();
        writeln!(file, "203.0.113.5").unwrap();
        drop(file);

        let settings = Settings {
            output_dir: dir.path().join("out"),
            format: OutputFormat::Csv,
            ..Settings::default()
        };
        let processed = run_files(&[&list_path, &detailed_path], &settings)
            .await
            .unwrap();

        let path = processed.summary.output_path.clone().unwrap();
        assert!(path.starts_with(dir.path().join("out")));
        let written = load_table(&path).unwrap();
        assert_eq!(written.headers, vec!["PMTA", COL_PRIORITY1, COL_PRIORITY2]);
        assert_eq!(written.rows[0][1], Cell::text("10.0.0.1"));
        assert_eq!(written.rows[0][2], Cell::text("10.0.0.2"));
    }
}
