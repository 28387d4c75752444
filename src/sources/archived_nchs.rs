//! Archived NCHS mortality-surveillance extract, recovered from an
//! archive.org snapshot of the retired feed. State-level, 2015 through 2018,
//! with the year and week packed into one `YYYYWW` column.

use tracing::info;

use crate::config::SourceLocation;
use crate::error::{CompileError, Result};
use crate::sources::{csv_reader, find_column, parse_deaths, parse_int, SourceAdapter};
use crate::types::{Extraction, MortalityRecord, Reject, RejectKind, SourceId};

const FIRST_YEAR: i32 = 2015;
// 2019 comes from the bundled complete-year file instead.
const LAST_YEAR: i32 = 2018;

pub struct ArchivedNchs {
    location: SourceLocation,
}

impl ArchivedNchs {
    pub fn new(location: SourceLocation) -> Self {
        ArchivedNchs { location }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for ArchivedNchs {
    fn source_id(&self) -> SourceId {
        SourceId::ArchivedNchs
    }

    fn location(&self) -> &SourceLocation {
        &self.location
    }

    fn parse(&self, bytes: &[u8]) -> Result<Extraction> {
        let mut reader = csv_reader(bytes);
        let headers = reader.headers()?.clone();

        let age_col = find_column(&headers, "age")
            .ok_or_else(|| CompileError::MissingColumn("age".into()))?;
        let yearweek_col = find_column(&headers, "mmwr year/week")
            .ok_or_else(|| CompileError::MissingColumn("MMWR Year/Week".into()))?;
        let state_col = find_column(&headers, "state")
            .ok_or_else(|| CompileError::MissingColumn("State".into()))?;
        let deaths_col = find_column(&headers, "all deaths")
            .ok_or_else(|| CompileError::MissingColumn("All Deaths".into()))?;

        let mut extraction = Extraction::default();
        for row in reader.records() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    extraction.rejects.push(Reject::new(
                        RejectKind::RecordRejected,
                        format!("{}: unreadable row: {}", self.source_id(), e),
                    ));
                    continue;
                }
            };

            // Age-stratified rows duplicate the "All" totals.
            if row.get(age_col).map(str::trim) != Some("All") {
                continue;
            }
            // Rows without a state are regional aggregates this pipeline
            // rebuilds itself.
            let state = row.get(state_col).map(str::trim).unwrap_or("");
            if state.is_empty() {
                continue;
            }

            let packed = match row.get(yearweek_col).and_then(parse_int) {
                Some(v) if v > 0 => v,
                _ => {
                    extraction.rejects.push(Reject::new(
                        RejectKind::RecordRejected,
                        format!(
                            "{}: unparseable MMWR Year/Week '{}' for {}",
                            self.source_id(),
                            row.get(yearweek_col).unwrap_or(""),
                            state
                        ),
                    ));
                    continue;
                }
            };
            let year = (packed / 100) as i32;
            let week = (packed % 100) as u32;
            if !(FIRST_YEAR..=LAST_YEAR).contains(&year) {
                continue;
            }

            let deaths = match row.get(deaths_col).and_then(parse_deaths) {
                Some(deaths) => deaths,
                None => {
                    extraction.rejects.push(Reject::new(
                        RejectKind::RecordRejected,
                        format!(
                            "{}: unusable deaths for {} {}/{}",
                            self.source_id(),
                            state,
                            year,
                            week
                        ),
                    ));
                    continue;
                }
            };

            extraction.records.push(MortalityRecord {
                source: self.source_id(),
                geography: state.to_string(),
                year,
                week,
                week_ending_date: None,
                deaths,
            });
        }

        info!(
            source = %self.source_id(),
            records = extraction.records.len(),
            rejects = extraction.rejects.len(),
            "extracted archived surveillance records"
        );
        Ok(extraction)
    }
}
