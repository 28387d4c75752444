//! Run context: per-source and per-stage accounting carried through the
//! pipeline and folded into the report printed and logged at the end of a
//! run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::constants::NATIONAL_GEOGRAPHY;
use crate::error::Result;
use crate::output::OutputFiles;
use crate::reconcile::Conflict;
use crate::types::{Reject, RejectKind, ResolvedRecord, SourceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Failed { reason: String },
}

/// Outcome of one source's retrieval, extraction, and normalization.
#[derive(Debug, Serialize)]
pub struct SourceReport {
    pub source: SourceId,
    pub status: SourceStatus,
    /// Payload provenance from the fetch helper.
    pub payload_bytes: usize,
    pub payload_sha256: Option<String>,
    pub fetch_attempts: u32,
    /// Rows the adapter extracted from the payload.
    pub extracted: usize,
    /// Rows the source recognizes but deliberately excludes.
    pub skipped: usize,
    /// Reject counts per kind, across extraction and normalization.
    pub rejects: BTreeMap<RejectKind, usize>,
    /// Records this source contributed to reconciliation.
    pub contributed: usize,
}

impl SourceReport {
    pub fn ok(source: SourceId) -> Self {
        SourceReport {
            source,
            status: SourceStatus::Ok,
            payload_bytes: 0,
            payload_sha256: None,
            fetch_attempts: 0,
            extracted: 0,
            skipped: 0,
            rejects: BTreeMap::new(),
            contributed: 0,
        }
    }

    pub fn failed(source: SourceId, reason: String) -> Self {
        SourceReport {
            status: SourceStatus::Failed { reason },
            ..Self::ok(source)
        }
    }

    pub fn add_rejects(&mut self, rejects: &[Reject]) {
        for reject in rejects {
            *self.rejects.entry(reject.kind).or_insert(0) += 1;
        }
    }

    pub fn total_rejects(&self) -> usize {
        self.rejects.values().sum()
    }

    /// A source is usable when it succeeded and contributed records.
    pub fn usable(&self) -> bool {
        self.status == SourceStatus::Ok && self.contributed > 0
    }
}

/// Everything one run did, built up stage by stage. Threaded through the
/// pipeline by value; nothing global.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    /// National rows rebuilt by summing the bundled file's state rows.
    pub derived_national_rows: usize,
    pub conflicts: Vec<Conflict>,
    pub joined: usize,
    pub missing_population: usize,
    pub national_rows: usize,
    pub state_rows: usize,
    pub national_file: Option<String>,
    pub state_file: Option<String>,
    pub years_covered: Option<(i32, i32)>,
    pub national_deaths_by_year: BTreeMap<i32, u64>,
    pub warnings: Vec<String>,
}

impl RunSummary {
    pub fn new() -> Self {
        RunSummary {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            sources: Vec::new(),
            derived_national_rows: 0,
            conflicts: Vec::new(),
            joined: 0,
            missing_population: 0,
            national_rows: 0,
            state_rows: 0,
            national_file: None,
            state_file: None,
            years_covered: None,
            national_deaths_by_year: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn usable_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.usable()).count()
    }

    /// Derives the coverage figures and year-over-year sanity warnings from
    /// the final table.
    pub fn finish(&mut self, records: &[ResolvedRecord], yoy_swing_threshold: f64) {
        let years: Vec<i32> = records.iter().map(|r| r.year).collect();
        self.years_covered = years
            .iter()
            .min()
            .copied()
            .zip(years.iter().max().copied());

        self.national_deaths_by_year.clear();
        for record in records.iter().filter(|r| r.geography == NATIONAL_GEOGRAPHY) {
            *self.national_deaths_by_year.entry(record.year).or_insert(0) += record.deaths;
        }

        let totals: Vec<(i32, u64)> = self
            .national_deaths_by_year
            .iter()
            .map(|(&y, &d)| (y, d))
            .collect();
        for pair in totals.windows(2) {
            let (prev_year, prev) = pair[0];
            let (year, current) = pair[1];
            if year != prev_year + 1 || prev == 0 {
                continue;
            }
            let change = (current as f64 - prev as f64) / prev as f64;
            if change.abs() > yoy_swing_threshold {
                self.warnings.push(format!(
                    "national deaths changed {:+.1}% from {} to {}",
                    change * 100.0,
                    prev_year,
                    year
                ));
            }
        }
    }

    pub fn record_output(&mut self, files: &OutputFiles) {
        self.national_rows = files.national_rows;
        self.state_rows = files.state_rows;
        self.national_file = Some(files.national_path.display().to_string());
        self.state_file = Some(files.state_path.display().to_string());
    }

    /// Human-readable end-of-run report.
    pub fn print_report(&self) {
        println!("\n📊 Mortality compilation summary (run {})", self.run_id);
        for report in &self.sources {
            match &report.status {
                SourceStatus::Ok => {
                    println!(
                        "   ✓ {}: {} records contributed ({} extracted, {} rejected, {} skipped, {} fetch attempts)",
                        report.source,
                        report.contributed,
                        report.extracted,
                        report.total_rejects(),
                        report.skipped,
                        report.fetch_attempts
                    );
                }
                SourceStatus::Failed { reason } => {
                    println!("   ✗ {}: failed: {}", report.source, reason);
                }
            }
        }
        if self.derived_national_rows > 0 {
            println!(
                "   ✓ national series: {} weeks rebuilt from bundled state data",
                self.derived_national_rows
            );
        }
        println!(
            "⚖️  Reconciliation: {} cross-source conflicts resolved",
            self.conflicts.len()
        );
        println!(
            "👥 Population: {} records joined, {} without an estimate",
            self.joined, self.missing_population
        );
        if let (Some(national), Some(state)) = (&self.national_file, &self.state_file) {
            println!("📁 National table: {} rows -> {}", self.national_rows, national);
            println!("📁 State table: {} rows -> {}", self.state_rows, state);
        }
        if let Some((first, last)) = self.years_covered {
            println!("📈 Years covered: {}-{}", first, last);
        }
        for (year, deaths) in &self.national_deaths_by_year {
            println!("   {}: {} national deaths", year, deaths);
        }
        for warning in &self.warnings {
            println!("⚠️  {}", warning);
        }
    }

    /// One structured record of the whole run for the JSON log.
    pub fn log_json(&self) -> Result<()> {
        let json = serde_json::to_string(self)?;
        info!(summary = %json, "run complete");
        Ok(())
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}
