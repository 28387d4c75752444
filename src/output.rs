//! Output partitioning and CSV writing. Two tables, file names and header
//! fixed by the downstream dashboard contract.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::constants::{
    NATIONAL_GEOGRAPHY, NATIONAL_OUTPUT_FILE, OUTPUT_COLUMNS, STATE_OUTPUT_FILE,
};
use crate::error::Result;
use crate::types::ResolvedRecord;

/// Files written by one run, for the summary.
#[derive(Debug, Clone)]
pub struct OutputFiles {
    pub national_path: PathBuf,
    pub national_rows: usize,
    pub state_path: PathBuf,
    pub state_rows: usize,
}

/// Splits resolved records into the national and state tables and writes
/// both CSVs. Records arrive sorted by (geography, year, week) from the
/// reconciler and are written as-is, so reruns over identical inputs are
/// byte-identical.
pub fn write_tables(directory: &Path, records: &[ResolvedRecord]) -> Result<OutputFiles> {
    fs::create_dir_all(directory)?;

    let (national, state): (Vec<&ResolvedRecord>, Vec<&ResolvedRecord>) = records
        .iter()
        .partition(|r| r.geography == NATIONAL_GEOGRAPHY);

    let national_path = directory.join(NATIONAL_OUTPUT_FILE);
    let state_path = directory.join(STATE_OUTPUT_FILE);
    write_csv(&national_path, &national)?;
    write_csv(&state_path, &state)?;

    info!(
        national = national.len(),
        state = state.len(),
        directory = %directory.display(),
        "output tables written"
    );
    Ok(OutputFiles {
        national_path,
        national_rows: national.len(),
        state_path,
        state_rows: state.len(),
    })
}

fn write_csv(path: &Path, records: &[&ResolvedRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(OUTPUT_COLUMNS)?;
    for record in records {
        // mmwr_week mirrors week: both carry the canonical MMWR week, and
        // the dashboard reads both names.
        writer.write_record([
            record.year.to_string(),
            record.week.to_string(),
            record.week.to_string(),
            record
                .week_ending_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
            record.geography.clone(),
            record.deaths.to_string(),
            record
                .population
                .map(|p| p.to_string())
                .unwrap_or_default(),
            record
                .rate_per_100k
                .map(|r| r.to_string())
                .unwrap_or_default(),
            record.source.as_str().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceId;
    use chrono::NaiveDate;

    fn resolved(
        geography: &str,
        year: i32,
        week: u32,
        deaths: u64,
        population: Option<u64>,
    ) -> ResolvedRecord {
        ResolvedRecord {
            geography: geography.to_string(),
            year,
            week,
            week_ending_date: Some(NaiveDate::from_ymd_opt(2020, 4, 11).unwrap()),
            deaths,
            population,
            rate_per_100k: crate::population::rate_per_100k(deaths, population),
            source: SourceId::CdcProvisional,
        }
    }

    #[test]
    fn header_matches_the_dashboard_contract() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_tables(dir.path(), &[resolved("Ohio", 2020, 15, 2750, Some(11_799_448))])
            .unwrap();

        let contents = fs::read_to_string(&files.state_path).unwrap();
        let header = contents.lines().next().unwrap();
        assert_eq!(
            header,
            "year,week,mmwr_week,week_ending_date,state,deaths,population,mortality_rate_per_100k,data_source"
        );
    }

    #[test]
    fn partitions_national_rows_away_from_states() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_tables(
            dir.path(),
            &[
                resolved("Ohio", 2020, 15, 2750, Some(11_799_448)),
                resolved("United States", 2020, 15, 61000, Some(331_449_281)),
            ],
        )
        .unwrap();

        assert_eq!(files.national_rows, 1);
        assert_eq!(files.state_rows, 1);
        let national = fs::read_to_string(&files.national_path).unwrap();
        assert!(national.contains("United States"));
        assert!(!national.contains("Ohio"));
        let state = fs::read_to_string(&files.state_path).unwrap();
        assert!(state.contains("Ohio"));
        assert!(!state.contains("United States"));
    }

    #[test]
    fn missing_population_and_rate_stay_empty_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut record = resolved("Ohio", 2020, 15, 2750, None);
        record.week_ending_date = None;
        let files = write_tables(dir.path(), &[record]).unwrap();

        let contents = fs::read_to_string(&files.state_path).unwrap();
        let row = contents.lines().nth(1).unwrap();
        assert_eq!(row, "2020,15,15,,Ohio,2750,,,cdc_provisional");
    }

    #[test]
    fn rewrites_are_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            resolved("Ohio", 2020, 15, 2750, Some(11_799_448)),
            resolved("United States", 2020, 15, 61000, Some(331_449_281)),
        ];
        let first = write_tables(dir.path(), &records).unwrap();
        let bytes_first = fs::read(&first.state_path).unwrap();
        let second = write_tables(dir.path(), &records).unwrap();
        let bytes_second = fs::read(&second.state_path).unwrap();
        assert_eq!(bytes_first, bytes_second);
    }
}
