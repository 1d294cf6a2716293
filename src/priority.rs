use crate::error::{PickerError, Result};
use crate::schema::{COL_FDNS, COL_IP, COL_PMTA, COL_RDNS};
use crate::table::{Cell, Table};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;

pub const NO_RDNS: &str = "No_rDNS";
pub const NO_FDNS: &str = "No_fDNS";

/// A hostname with at least this many digits looks machine generated and counts as clean
pub const MIN_GENERATED_DIGITS: usize = 7;

pub const DEFAULT_CAP: u32 = 4;
pub const MAX_CAP: u32 = 50;

lazy_static! {
    // Unicode decimal digits, same class the IPv4 sanitizer matches with
    static ref DECIMAL_DIGIT: Regex = Regex::new(r"\d").unwrap();
}

/// Maximum number of IPs selected per PMTA group, always within 1..=50
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cap(u32);

impl Cap {
    pub fn new(value: u32) -> Result<Self> {
        if (1..=MAX_CAP).contains(&value) {
            Ok(Cap(value))
        } else {
            Err(PickerError::InvalidCap(value))
        }
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl Default for Cap {
    fn default() -> Self {
        Cap(DEFAULT_CAP)
    }
}

impl From<Cap> for u32 {
    fn from(cap: Cap) -> u32 {
        cap.0
    }
}

impl fmt::Display for Cap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Clean rDNS: a textual hostname that is not the No_rDNS sentinel, not empty, not
/// IPv6-looking, and carries either no digits at all or at least seven of them.
/// A handful of digits marks the hostname as unclean.
pub fn is_clean_rdns(value: &Cell) -> bool {
    let Some(value) = value.as_str() else {
        return false;
    };
    if value.is_empty() || value == NO_RDNS || value.contains(':') {
        return false;
    }

    let digits = DECIMAL_DIGIT.find_iter(value).count();
    digits >= MIN_GENERATED_DIGITS || digits == 0
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub ip: Option<String>,
    pub rdns: Cell,
    pub fdns: Cell,
}

impl Candidate {
    pub fn new(ip: &str, rdns: &str, fdns: &str) -> Self {
        Self {
            ip: Some(ip.to_string()),
            rdns: Cell::text(rdns),
            fdns: Cell::text(fdns),
        }
    }

    fn has_no_rdns(&self) -> bool {
        self.rdns.as_str() == Some(NO_RDNS)
    }

    fn has_no_fdns(&self) -> bool {
        self.fdns.as_str() == Some(NO_FDNS)
    }
}

/// All detailed rows sharing one PMTA value, in input order
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityGroup {
    pub pmta: String,
    pub rows: Vec<Candidate>,
}

/// Split the detailed table into PMTA groups, ordered by first appearance.
/// Rows with an empty PMTA belong to no group.
pub fn group_rows(table: &Table) -> Result<Vec<PriorityGroup>> {
    let column = |name: &str| {
        table
            .column_index(name)
            .ok_or_else(|| PickerError::MissingColumn {
                table: table.name.clone(),
                column: name.to_string(),
            })
    };
    let ip_idx = column(COL_IP)?;
    let rdns_idx = column(COL_RDNS)?;
    let fdns_idx = column(COL_FDNS)?;
    let pmta_idx = column(COL_PMTA)?;

    let mut groups: Vec<PriorityGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in &table.rows {
        let pmta = &row[pmta_idx];
        if pmta.is_blank() {
            continue;
        }
        let key = pmta.as_text();
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(PriorityGroup {
                pmta: key,
                rows: Vec::new(),
            });
            groups.len() - 1
        });

        let ip = &row[ip_idx];
        groups[slot].rows.push(Candidate {
            ip: (!ip.is_blank()).then(|| ip.as_text()),
            rdns: row[rdns_idx].clone(),
            fdns: row[fdns_idx].clone(),
        });
    }

    Ok(groups)
}

/// Insertion ordered set of IPs, first occurrence wins
#[derive(Debug, Default)]
struct OrderedIps {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl OrderedIps {
    fn insert(&mut self, ip: &str) -> bool {
        if self.seen.contains(ip) {
            return false;
        }
        self.seen.insert(ip.to_string());
        self.order.push(ip.to_string());
        true
    }

    fn contains(&self, ip: &str) -> bool {
        self.seen.contains(ip)
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub priority1: Vec<String>,
    pub priority2: Vec<String>,
    pub cap: Cap,
}

impl Selection {
    pub fn empty(cap: Cap) -> Self {
        Self {
            priority1: Vec::new(),
            priority2: Vec::new(),
            cap,
        }
    }

    pub fn len(&self) -> usize {
        self.priority1.len() + self.priority2.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn priority1_joined(&self) -> String {
        self.priority1.join(",")
    }

    pub fn priority2_joined(&self) -> String {
        self.priority2.join(",")
    }
}

/// Pick at most `cap` IPs for one group: clean rDNS first, backfilled with No_rDNS
/// hosts, then hosts without forward DNS for whatever room is left.
pub fn rank_group(group: &PriorityGroup, cap: Cap) -> Selection {
    let limit = cap.get();
    let with_ip = || {
        group
            .rows
            .iter()
            .filter_map(|row| row.ip.as_deref().map(|ip| (ip, row)))
    };

    let mut priority1 = OrderedIps::default();
    for (ip, row) in with_ip() {
        if is_clean_rdns(&row.rdns) {
            priority1.insert(ip);
        }
    }

    if priority1.len() < limit {
        for (ip, _) in with_ip().filter(|(_, row)| row.has_no_rdns()) {
            priority1.insert(ip);
            if priority1.len() >= limit {
                break;
            }
        }
    }

    let mut priority2 = OrderedIps::default();
    for (ip, row) in with_ip() {
        if row.has_no_fdns() && !priority1.contains(ip) {
            priority2.insert(ip);
        }
    }

    // Truncate only after concatenation so tier 1 always claims the slots first
    let mut combined = OrderedIps::default();
    for ip in priority1.order.iter().chain(priority2.order.iter()) {
        if combined.len() >= limit {
            break;
        }
        combined.insert(ip);
    }

    let mut selection = Selection::empty(cap);
    for ip in combined.order {
        if priority1.contains(&ip) {
            selection.priority1.push(ip);
        } else if priority2.contains(&ip) {
            selection.priority2.push(ip);
        }
    }

    log::debug!(
        "PMTA {}: {} rows, priority1=[{}] priority2=[{}]",
        group.pmta,
        group.rows.len(),
        selection.priority1_joined(),
        selection.priority2_joined()
    );

    selection
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedGroup {
    pub pmta: String,
    pub selection: Selection,
}

/// Runs `rank_group` across every group, optionally spread over blocking workers
#[derive(Debug, Clone, Copy)]
pub struct PriorityEngine {
    cap: Cap,
    workers: usize,
}

impl PriorityEngine {
    pub fn new(cap: Cap) -> Self {
        Self { cap, workers: 1 }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn rank_all(&self, groups: &[PriorityGroup]) -> Vec<RankedGroup> {
        groups
            .iter()
            .map(|group| RankedGroup {
                pmta: group.pmta.clone(),
                selection: rank_group(group, self.cap),
            })
            .collect()
    }

    /// Same result and order as `rank_all`, computed on up to `workers` blocking tasks
    pub async fn rank_all_concurrent(
        &self,
        groups: Vec<PriorityGroup>,
    ) -> Result<Vec<RankedGroup>> {
        if self.workers <= 1 || groups.len() <= 1 {
            return Ok(self.rank_all(&groups));
        }

        let chunk_size = groups.len().div_ceil(self.workers);
        log::debug!(
            "Ranking {} groups on {} workers ({} groups each)",
            groups.len(),
            self.workers,
            chunk_size
        );

        let mut handles = Vec::new();
        let mut groups = groups.into_iter().peekable();
        while groups.peek().is_some() {
            let chunk: Vec<PriorityGroup> = groups.by_ref().take(chunk_size).collect();
            let engine = *self;
            handles.push(tokio::task::spawn_blocking(move || engine.rank_all(&chunk)));
        }

        let mut ranked = Vec::new();
        for handle in handles {
            let part = handle
                .await
                .map_err(|e| PickerError::Worker(e.to_string()))?;
            ranked.extend(part);
        }
        Ok(ranked)
    }
}
