//! MMWR (epidemiological) week arithmetic and the temporal normalization
//! stage.
//!
//! MMWR weeks run Sunday through Saturday. Week 1 of a year is the first
//! week containing at least four days of that year, which is the week
//! containing January 4. Years therefore have 52 or 53 numbered weeks.

use chrono::{Datelike, Duration, NaiveDate};
use tracing::debug;

use crate::types::{MortalityRecord, Reject, RejectKind, SourceId};

/// The Sunday starting MMWR week 1 of `year`, or `None` for years outside
/// chrono's calendar range.
pub fn week_start(year: i32) -> Option<NaiveDate> {
    let jan4 = NaiveDate::from_ymd_opt(year, 1, 4)?;
    let offset = jan4.weekday().num_days_from_sunday() as i64;
    Some(jan4 - Duration::days(offset))
}

/// Number of MMWR weeks in `year`: 52 or 53.
pub fn weeks_in_year(year: i32) -> Option<u32> {
    let this = week_start(year)?;
    let next = week_start(year + 1)?;
    Some(((next - this).num_days() / 7) as u32)
}

/// Canonical (MMWR year, MMWR week) of a calendar date.
pub fn week_of(date: NaiveDate) -> Option<(i32, u32)> {
    let mut year = date.year();
    if date < week_start(year)? {
        year -= 1;
    } else if let Some(next_start) = week_start(year + 1) {
        if date >= next_start {
            year += 1;
        }
    }
    let start = week_start(year)?;
    let week = ((date - start).num_days() / 7) as u32 + 1;
    Some((year, week))
}

/// The Saturday ending the given MMWR week, or `None` when the week number
/// does not exist in that year.
pub fn week_ending_date(year: i32, week: u32) -> Option<NaiveDate> {
    if week == 0 || week > weeks_in_year(year)? {
        return None;
    }
    let start = week_start(year)?;
    Some(start + Duration::days(((week - 1) * 7 + 6) as i64))
}

/// Shifts a (year, week) back by one week, rolling week 1 into the final
/// week (52 or 53) of the prior year. The bundled 2019 extract numbers its
/// weeks one ahead of MMWR and is corrected with this.
pub fn shift_back_one_week(year: i32, week: u32) -> Option<(i32, u32)> {
    match week {
        0 => None,
        1 => Some((year - 1, weeks_in_year(year - 1)?)),
        _ => Some((year, week - 1)),
    }
}

/// Temporal normalization stage.
///
/// Records carrying a week-ending date take their canonical (year, week)
/// from that date; records carrying only a claimed pair keep it. Bundled
/// 2019 records are then shifted back one week. Anything that lands outside
/// week 1..=53 is rejected, never clamped.
pub fn normalize(records: Vec<MortalityRecord>) -> (Vec<MortalityRecord>, Vec<Reject>) {
    let mut kept = Vec::with_capacity(records.len());
    let mut rejects = Vec::new();

    for mut record in records {
        if let Some(date) = record.week_ending_date {
            match week_of(date) {
                Some((year, week)) => {
                    if record.week != 0 && (record.year != year || record.week != week) {
                        debug!(
                            source = %record.source,
                            geography = %record.geography,
                            claimed_year = record.year,
                            claimed_week = record.week,
                            computed_year = year,
                            computed_week = week,
                            "source week claim disagrees with week ending date"
                        );
                    }
                    record.year = year;
                    record.week = week;
                }
                None => {
                    rejects.push(Reject::new(
                        RejectKind::TemporalOutOfRange,
                        format!("{}: week ending date {} outside calendar range", record.source, date),
                    ));
                    continue;
                }
            }
        }

        if record.source == SourceId::Local2019 {
            match shift_back_one_week(record.year, record.week) {
                Some((year, week)) => {
                    record.year = year;
                    record.week = week;
                }
                None => {
                    rejects.push(Reject::new(
                        RejectKind::TemporalOutOfRange,
                        format!(
                            "{}: cannot shift week {} of {}",
                            record.source, record.week, record.year
                        ),
                    ));
                    continue;
                }
            }
        }

        if !(1..=53).contains(&record.week) {
            rejects.push(Reject::new(
                RejectKind::TemporalOutOfRange,
                format!(
                    "{}: {} week {} of {} outside 1..=53",
                    record.source, record.geography, record.week, record.year
                ),
            ));
            continue;
        }

        kept.push(record);
    }

    (kept, rejects)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(source: SourceId, year: i32, week: u32, ending: Option<NaiveDate>) -> MortalityRecord {
        MortalityRecord {
            source,
            geography: "Washington".to_string(),
            year,
            week,
            week_ending_date: ending,
            deaths: 100,
        }
    }

    #[test]
    fn week_one_contains_january_fourth() {
        assert_eq!(week_start(2015), Some(date(2015, 1, 4)));
        assert_eq!(week_start(2019), Some(date(2018, 12, 30)));
        assert_eq!(week_start(2020), Some(date(2019, 12, 29)));
    }

    #[test]
    fn year_lengths_match_published_mmwr_calendars() {
        assert_eq!(weeks_in_year(2014), Some(53));
        assert_eq!(weeks_in_year(2015), Some(52));
        assert_eq!(weeks_in_year(2018), Some(52));
        assert_eq!(weeks_in_year(2019), Some(52));
        assert_eq!(weeks_in_year(2020), Some(53));
        assert_eq!(weeks_in_year(2021), Some(52));
    }

    #[test]
    fn week_of_handles_year_boundaries() {
        assert_eq!(week_of(date(2020, 1, 4)), Some((2020, 1)));
        assert_eq!(week_of(date(2019, 12, 28)), Some((2019, 52)));
        assert_eq!(week_of(date(2019, 12, 29)), Some((2020, 1)));
        assert_eq!(week_of(date(2021, 1, 2)), Some((2020, 53)));
        assert_eq!(week_of(date(2021, 1, 3)), Some((2021, 1)));
        assert_eq!(week_of(date(2014, 12, 31)), Some((2014, 53)));
    }

    #[test]
    fn week_ending_date_is_the_saturday() {
        assert_eq!(week_ending_date(2020, 1), Some(date(2020, 1, 4)));
        assert_eq!(week_ending_date(2020, 53), Some(date(2021, 1, 2)));
        assert_eq!(week_ending_date(2019, 52), Some(date(2019, 12, 28)));
    }

    #[test]
    fn week_ending_date_rejects_nonexistent_weeks() {
        assert_eq!(week_ending_date(2019, 53), None);
        assert_eq!(week_ending_date(2019, 0), None);
    }

    #[test]
    fn shift_stays_within_year() {
        assert_eq!(shift_back_one_week(2019, 10), Some((2019, 9)));
    }

    #[test]
    fn shift_rolls_week_one_into_prior_year_final_week() {
        assert_eq!(shift_back_one_week(2019, 1), Some((2018, 52)));
        assert_eq!(shift_back_one_week(2021, 1), Some((2020, 53)));
    }

    #[test]
    fn normalize_shifts_bundled_source_back_one_week() {
        let (kept, rejects) = normalize(vec![record(SourceId::Local2019, 2019, 10, None)]);
        assert!(rejects.is_empty());
        assert_eq!((kept[0].year, kept[0].week), (2019, 9));
    }

    #[test]
    fn normalize_rolls_bundled_week_one_across_year_boundary() {
        let (kept, _) = normalize(vec![record(SourceId::Local2019, 2019, 1, None)]);
        assert_eq!((kept[0].year, kept[0].week), (2018, 52));
    }

    #[test]
    fn normalize_prefers_the_week_ending_date() {
        let (kept, _) = normalize(vec![record(
            SourceId::CdcProvisional,
            2020,
            99,
            Some(date(2020, 1, 4)),
        )]);
        assert_eq!((kept[0].year, kept[0].week), (2020, 1));
    }

    #[test]
    fn normalize_rejects_out_of_range_weeks() {
        let (kept, rejects) = normalize(vec![
            record(SourceId::WorldMortality, 2016, 54, None),
            record(SourceId::WorldMortality, 2016, 0, None),
        ]);
        assert!(kept.is_empty());
        assert_eq!(rejects.len(), 2);
        assert!(rejects
            .iter()
            .all(|r| r.kind == RejectKind::TemporalOutOfRange));
    }

    #[test]
    fn normalize_applies_shift_after_date_computation() {
        // Saturday 2020-01-04 ends MMWR week 1 of 2020; the bundled source's
        // off-by-one makes the canonical week 53 of 2019... which does not
        // exist, so the roll lands on week 52.
        let (kept, _) = normalize(vec![record(
            SourceId::Local2019,
            2019,
            0,
            Some(date(2020, 1, 4)),
        )]);
        assert_eq!((kept[0].year, kept[0].week), (2019, 52));
    }
}
