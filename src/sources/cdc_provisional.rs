//! Current CDC provisional weekly counts feed (2020 onward). Carries both a
//! claimed MMWR week and a week-ending date, a national aggregate row, and a
//! separately-reported New York City row.

use tracing::info;

use crate::config::SourceLocation;
use crate::error::{CompileError, Result};
use crate::sources::{csv_reader, find_column, parse_date, parse_deaths, parse_int, SourceAdapter};
use crate::types::{Extraction, MortalityRecord, Reject, RejectKind, SourceId};

const FIRST_YEAR: i32 = 2020;

pub struct CdcProvisional {
    location: SourceLocation,
}

impl CdcProvisional {
    pub fn new(location: SourceLocation) -> Self {
        CdcProvisional { location }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for CdcProvisional {
    fn source_id(&self) -> SourceId {
        SourceId::CdcProvisional
    }

    fn location(&self) -> &SourceLocation {
        &self.location
    }

    fn parse(&self, bytes: &[u8]) -> Result<Extraction> {
        let mut reader = csv_reader(bytes);
        let headers = reader.headers()?.clone();

        let year_col = find_column(&headers, "year")
            .ok_or_else(|| CompileError::MissingColumn("Year".into()))?;
        let week_col = find_column(&headers, "mmwr week")
            .ok_or_else(|| CompileError::MissingColumn("MMWR Week".into()))?;
        let ending_col = find_column(&headers, "week ending date")
            .ok_or_else(|| CompileError::MissingColumn("Week Ending Date".into()))?;
        let state_col = find_column(&headers, "state")
            .ok_or_else(|| CompileError::MissingColumn("State".into()))?;
        let deaths_col = find_column(&headers, "total deaths")
            .ok_or_else(|| CompileError::MissingColumn("Total Deaths".into()))?;

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

            // The feed interleaves monthly and total aggregation rows; only
            // rows with an MMWR week are weekly.
            let week = match row.get(week_col).and_then(parse_int) {
                Some(week) if week >= 0 => week as u32,
                _ => continue,
            };
            let year = match row.get(year_col).and_then(parse_int) {
                Some(year) => year as i32,
                None => continue,
            };
            if year < FIRST_YEAR {
                continue;
            }

            let state = row.get(state_col).map(str::trim).unwrap_or("");
            if state.is_empty() {
                extraction.rejects.push(Reject::new(
                    RejectKind::RecordRejected,
                    format!("{}: weekly row for {}/{} without a state", self.source_id(), year, week),
                ));
                continue;
            }

            // Small counts are suppressed (blank) in this feed.
            let deaths = match row.get(deaths_col).and_then(parse_deaths) {
                Some(deaths) => deaths,
                None => {
                    extraction.rejects.push(Reject::new(
                        RejectKind::RecordRejected,
                        format!(
                            "{}: suppressed or unusable deaths for {} {}/{}",
                            self.source_id(),
                            state,
                            year,
                            week
                        ),
                    ));
                    continue;
                }
            };

            let week_ending_date = row.get(ending_col).and_then(parse_date);

            extraction.records.push(MortalityRecord {
                source: self.source_id(),
                geography: state.to_string(),
                year,
                week,
                week_ending_date,
                deaths,
            });
        }

        info!(
            source = %self.source_id(),
            records = extraction.records.len(),
            rejects = extraction.rejects.len(),
            "extracted provisional weekly records"
        );
        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn parse(csv: &str) -> Extraction {
        let adapter = CdcProvisional::new(SourceLocation::File("unused".into()));
        adapter.parse(csv.as_bytes()).unwrap()
    }

    const HEADER: &str =
        "Data As Of,Year,Month,MMWR Week,Week Ending Date,State,Total Deaths\n";

    #[test]
    fn keeps_weekly_rows_with_claimed_week_and_date() {
        let csv = format!(
            "{HEADER}\
             09/01/2023,2020,,15,04/11/2020,Washington,1250\n\
             09/01/2023,2020,4,,,Washington,5400\n\
             09/01/2023,2019,,52,12/28/2019,Washington,1100\n"
        );
        let extraction = parse(&csv);
        assert_eq!(extraction.records.len(), 1);
        let record = &extraction.records[0];
        assert_eq!(record.geography, "Washington");
        assert_eq!((record.year, record.week), (2020, 15));
        assert_eq!(
            record.week_ending_date,
            Some(NaiveDate::from_ymd_opt(2020, 4, 11).unwrap())
        );
        assert_eq!(record.deaths, 1250);
    }

    #[test]
    fn national_and_city_rows_pass_through_raw() {
        let csv = format!(
            "{HEADER}\
             09/01/2023,2020,,15,04/11/2020,United States,61000\n\
             09/01/2023,2020,,15,04/11/2020,New York City,4500\n"
        );
        let extraction = parse(&csv);
        let geos: Vec<&str> = extraction
            .records
            .iter()
            .map(|r| r.geography.as_str())
            .collect();
        assert_eq!(geos, vec!["United States", "New York City"]);
    }

    #[test]
    fn suppressed_deaths_are_counted_as_rejects() {
        let csv = format!(
            "{HEADER}\
             09/01/2023,2020,,15,04/11/2020,Vermont,\n\
             09/01/2023,2020,,15,04/11/2020,Maine,95\n"
        );
        let extraction = parse(&csv);
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.rejects.len(), 1);
        assert!(extraction.rejects[0].detail.contains("Vermont"));
    }

    #[test]
    fn iso_dates_also_parse() {
        let csv = format!(
            "{HEADER}\
             09/01/2023,2021,,2,2021-01-16,Ohio,2750\n"
        );
        let extraction = parse(&csv);
        assert_eq!(
            extraction.records[0].week_ending_date,
            Some(NaiveDate::from_ymd_opt(2021, 1, 16).unwrap())
        );
    }

    #[test]
    fn missing_deaths_column_is_fatal_for_the_payload() {
        let adapter = CdcProvisional::new(SourceLocation::File("unused".into()));
        let err = adapter
            .parse(b"Year,MMWR Week,Week Ending Date,State\n2020,15,04/11/2020,Ohio\n")
            .unwrap_err();
        assert!(matches!(err, CompileError::MissingColumn(_)));
    }
}
