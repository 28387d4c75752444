//! Historical aggregate dataset (Karlinsky & Kobak's world mortality
//! compilation). National totals only; covers the years before the CDC
//! provisional feed begins.

use tracing::info;

use crate::config::SourceLocation;
use crate::constants::NATIONAL_GEOGRAPHY;
use crate::error::{CompileError, Result};
use crate::sources::{csv_reader, find_column, parse_deaths, parse_int, SourceAdapter};
use crate::types::{Extraction, MortalityRecord, Reject, RejectKind, SourceId};

const FIRST_YEAR: i32 = 2015;
const LAST_YEAR: i32 = 2020;
const COUNTRY: &str = "United States";

pub struct WorldMortality {
    location: SourceLocation,
}

impl WorldMortality {
    pub fn new(location: SourceLocation) -> Self {
        WorldMortality { location }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for WorldMortality {
    fn source_id(&self) -> SourceId {
        SourceId::WorldMortality
    }

    fn location(&self) -> &SourceLocation {
        &self.location
    }

    fn parse(&self, bytes: &[u8]) -> Result<Extraction> {
        let mut reader = csv_reader(bytes);
        let headers = reader.headers()?.clone();

        let country_col = find_column(&headers, "country_name")
            .ok_or_else(|| CompileError::MissingColumn("country_name".into()))?;
        let year_col = find_column(&headers, "year")
            .ok_or_else(|| CompileError::MissingColumn("year".into()))?;
        let time_col = find_column(&headers, "time")
            .ok_or_else(|| CompileError::MissingColumn("time".into()))?;
        let unit_col = find_column(&headers, "time_unit")
            .ok_or_else(|| CompileError::MissingColumn("time_unit".into()))?;
        let deaths_col = find_column(&headers, "deaths")
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

            // Rows for other countries or cadences are expected, not errors.
            if row.get(country_col).map(str::trim) != Some(COUNTRY) {
                continue;
            }
            if row
                .get(unit_col)
                .map(|u| u.trim().eq_ignore_ascii_case("weekly"))
                != Some(true)
            {
                continue;
            }
            let year = match row.get(year_col).and_then(parse_int) {
                Some(y) => y as i32,
                None => {
                    extraction.rejects.push(Reject::new(
                        RejectKind::RecordRejected,
                        format!("{}: unparseable year '{}'", self.source_id(), row.get(year_col).unwrap_or("")),
                    ));
                    continue;
                }
            };
            if !(FIRST_YEAR..=LAST_YEAR).contains(&year) {
                continue;
            }

            let week = row.get(time_col).and_then(parse_int);
            let deaths = row.get(deaths_col).and_then(parse_deaths);
            match (week, deaths) {
                (Some(week), Some(deaths)) if week >= 0 => {
                    extraction.records.push(MortalityRecord {
                        source: self.source_id(),
                        geography: NATIONAL_GEOGRAPHY.to_string(),
                        year,
                        week: week as u32,
                        week_ending_date: None,
                        deaths,
                    });
                }
                _ => {
                    extraction.rejects.push(Reject::new(
                        RejectKind::RecordRejected,
                        format!(
                            "{}: unusable week/deaths in {} row for year {}",
                            self.source_id(),
                            COUNTRY,
                            year
                        ),
                    ));
                }
            }
        }

        info!(
            source = %self.source_id(),
            records = extraction.records.len(),
            rejects = extraction.rejects.len(),
            "extracted national historical records"
        );
        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(csv: &str) -> Extraction {
        let adapter = WorldMortality::new(SourceLocation::File("unused".into()));
        adapter.parse(csv.as_bytes()).unwrap()
    }

    const HEADER: &str = "country_name,year,time,time_unit,deaths\n";

    #[test]
    fn keeps_only_us_weekly_rows_in_window() {
        let csv = format!(
            "{HEADER}\
             United States,2016,1,weekly,55000\n\
             Germany,2016,1,weekly,20000\n\
             United States,2016,2,monthly,220000\n\
             United States,2021,1,weekly,60000\n"
        );
        let extraction = parse(&csv);
        assert_eq!(extraction.records.len(), 1);
        let record = &extraction.records[0];
        assert_eq!(record.geography, "United States");
        assert_eq!((record.year, record.week, record.deaths), (2016, 1, 55000));
        assert!(record.week_ending_date.is_none());
        assert!(extraction.rejects.is_empty());
    }

    #[test]
    fn unusable_deaths_are_rejected_not_fatal() {
        let csv = format!(
            "{HEADER}\
             United States,2016,1,weekly,not_a_number\n\
             United States,2016,2,weekly,55100\n"
        );
        let extraction = parse(&csv);
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.rejects.len(), 1);
        assert_eq!(extraction.rejects[0].kind, RejectKind::RecordRejected);
    }

    #[test]
    fn missing_column_fails_the_whole_payload() {
        let adapter = WorldMortality::new(SourceLocation::File("unused".into()));
        let err = adapter
            .parse(b"country_name,year,deaths\nUnited States,2016,55000\n")
            .unwrap_err();
        assert!(matches!(err, CompileError::MissingColumn(_)));
    }
}
