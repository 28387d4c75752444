//! Annual population estimates, the population join, and mortality-rate
//! computation.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};

use crate::error::{CompileError, Result};
use crate::types::{MortalityRecord, ResolvedRecord};

/// Census Bureau July 1 estimates bundled with the crate: every canonical
/// geography, 2015 through the current estimate year.
const POPULATION_CSV: &str = include_str!("../data/population_estimates.csv");

pub struct PopulationTable {
    by_geography: HashMap<String, BTreeMap<i32, u64>>,
}

impl PopulationTable {
    pub fn from_csv(raw: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(raw.as_bytes());

        let mut by_geography: HashMap<String, BTreeMap<i32, u64>> = HashMap::new();
        for row in reader.records() {
            let row = row?;
            let geography = row
                .get(0)
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .ok_or_else(|| {
                    CompileError::Config("population table row without a geography".into())
                })?;
            let year: i32 = row
                .get(1)
                .and_then(|y| y.trim().parse().ok())
                .ok_or_else(|| {
                    CompileError::Config(format!("bad year in population table for {geography}"))
                })?;
            let population: u64 = row
                .get(2)
                .and_then(|p| p.trim().parse().ok())
                .ok_or_else(|| {
                    CompileError::Config(format!(
                        "bad population in population table for {geography} {year}"
                    ))
                })?;
            by_geography
                .entry(geography.to_string())
                .or_default()
                .insert(year, population);
        }
        Ok(PopulationTable { by_geography })
    }

    /// The table shipped with the crate.
    pub fn bundled() -> Result<Self> {
        Self::from_csv(POPULATION_CSV)
    }

    /// Estimate for (geography, year). A year past a geography's last entry
    /// carries the latest prior value forward; a year before its first entry,
    /// or an unknown geography, has no estimate.
    pub fn lookup(&self, geography: &str, year: i32) -> Option<u64> {
        let years = self.by_geography.get(geography)?;
        years.range(..=year).next_back().map(|(_, &pop)| pop)
    }

    pub fn len(&self) -> usize {
        self.by_geography.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_geography.is_empty()
    }
}

/// `deaths / population × 100 000`, or `None` when the population is missing
/// or zero. Full precision; rounding is the dashboard's concern.
pub fn rate_per_100k(deaths: u64, population: Option<u64>) -> Option<f64> {
    match population {
        Some(population) if population > 0 => {
            Some(deaths as f64 / population as f64 * 100_000.0)
        }
        _ => None,
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct JoinReport {
    pub joined: usize,
    pub missing_population: usize,
}

/// Joins population estimates onto reconciled records and computes rates.
/// Records without an estimate are kept, with empty population and rate
/// fields in the output.
pub fn join(table: &PopulationTable, records: Vec<MortalityRecord>) -> (Vec<ResolvedRecord>, JoinReport) {
    let mut resolved = Vec::with_capacity(records.len());
    let mut report = JoinReport::default();

    for record in records {
        let population = table.lookup(&record.geography, record.year);
        match population {
            Some(_) => report.joined += 1,
            None => {
                report.missing_population += 1;
                debug!(
                    geography = %record.geography,
                    year = record.year,
                    "no population estimate; emitting record without rate"
                );
            }
        }
        resolved.push(ResolvedRecord {
            rate_per_100k: rate_per_100k(record.deaths, population),
            geography: record.geography,
            year: record.year,
            week: record.week,
            week_ending_date: record.week_ending_date,
            deaths: record.deaths,
            population,
            source: record.source,
        });
    }

    info!(
        joined = report.joined,
        missing = report.missing_population,
        "population join complete"
    );
    (resolved, report)
}
