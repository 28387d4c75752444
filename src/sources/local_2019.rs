//! Bundled complete-year 2019 state extract. Bridges the gap between the
//! archived surveillance feed (through 2018) and the provisional feed (from
//! 2020). Header names vary between vintages of this extract, so columns are
//! located by keyword.
//!
//! The extract numbers weeks one ahead of MMWR; the temporal normalizer
//! shifts every record from this source back a week.

use tracing::info;

use crate::config::SourceLocation;
use crate::error::{CompileError, Result};
use crate::mmwr;
use crate::sources::{csv_reader, find_column_by, parse_date, parse_deaths, SourceAdapter};
use crate::types::{Extraction, MortalityRecord, Reject, RejectKind, SourceId};

/// National-total spellings seen in this extract; the national series is
/// rebuilt from the state rows instead.
const NATIONAL_VARIANTS: [&str; 5] = ["unitedstates", "us", "usa", "national", "total"];

pub struct Local2019 {
    location: SourceLocation,
}

impl Local2019 {
    pub fn new(location: SourceLocation) -> Self {
        Local2019 { location }
    }
}

fn is_national_variant(raw: &str) -> bool {
    let key: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    NATIONAL_VARIANTS.contains(&key.as_str())
}

#[async_trait::async_trait]
impl SourceAdapter for Local2019 {
    fn source_id(&self) -> SourceId {
        SourceId::Local2019
    }

    fn location(&self) -> &SourceLocation {
        &self.location
    }

    fn parse(&self, bytes: &[u8]) -> Result<Extraction> {
        let mut reader = csv_reader(bytes);
        let headers = reader.headers()?.clone();

        let state_col = find_column_by(&headers, |h| h.contains("jurisdiction"))
            .or_else(|| find_column_by(&headers, |h| h.contains("state")))
            .ok_or_else(|| CompileError::MissingColumn("jurisdiction".into()))?;
        let date_col = find_column_by(&headers, |h| h.contains("week") && h.contains("date"))
            .ok_or_else(|| CompileError::MissingColumn("week ending date".into()))?;
        let deaths_col = find_column_by(&headers, |h| h.contains("death") || h.contains("cause"))
            .ok_or_else(|| CompileError::MissingColumn("deaths".into()))?;

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

            let state = row.get(state_col).map(str::trim).unwrap_or("");
            if state.is_empty() {
                continue;
            }
            if is_national_variant(state) {
                extraction.skipped += 1;
                continue;
            }

            let raw_date = row.get(date_col).unwrap_or("");
            let date = match parse_date(raw_date) {
                Some(date) => date,
                None => {
                    extraction.rejects.push(Reject::new(
                        RejectKind::RecordRejected,
                        format!(
                            "{}: unparseable week ending date '{}' for {}",
                            self.source_id(),
                            raw_date,
                            state
                        ),
                    ));
                    continue;
                }
            };

            let deaths = match row.get(deaths_col).and_then(parse_deaths) {
                Some(deaths) => deaths,
                None => {
                    extraction.rejects.push(Reject::new(
                        RejectKind::RecordRejected,
                        format!(
                            "{}: unusable deaths for {} week ending {}",
                            self.source_id(),
                            state,
                            date
                        ),
                    ));
                    continue;
                }
            };

            // Claimed (year, week) comes from the date; the one-week shift
            // belongs to the temporal normalizer.
            let (year, week) = match mmwr::week_of(date) {
                Some(pair) => pair,
                None => {
                    extraction.rejects.push(Reject::new(
                        RejectKind::RecordRejected,
                        format!(
                            "{}: date {} outside calendar range for {}",
                            self.source_id(),
                            date,
                            state
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
                week_ending_date: Some(date),
                deaths,
            });
        }

        info!(
            source = %self.source_id(),
            records = extraction.records.len(),
            rejects = extraction.rejects.len(),
            skipped = extraction.skipped,
            "extracted bundled 2019 records"
        );
        Ok(extraction)
    }
}
