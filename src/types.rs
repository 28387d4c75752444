use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants;

/// Identifies one of the four mortality data sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    WorldMortality,
    CdcProvisional,
    ArchivedNchs,
    Local2019,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::WorldMortality => constants::WORLD_MORTALITY,
            SourceId::CdcProvisional => constants::CDC_PROVISIONAL,
            SourceId::ArchivedNchs => constants::ARCHIVED_NCHS,
            SourceId::Local2019 => constants::LOCAL_2019,
        }
    }

    pub fn parse(name: &str) -> Option<SourceId> {
        match name {
            constants::WORLD_MORTALITY => Some(SourceId::WorldMortality),
            constants::CDC_PROVISIONAL => Some(SourceId::CdcProvisional),
            constants::ARCHIVED_NCHS => Some(SourceId::ArchivedNchs),
            constants::LOCAL_2019 => Some(SourceId::Local2019),
            _ => None,
        }
    }

    /// Stable position used to break reconciliation ties deterministically,
    /// independent of the order sources happened to finish in.
    pub fn ordinal(&self) -> u8 {
        match self {
            SourceId::Local2019 => 0,
            SourceId::CdcProvisional => 1,
            SourceId::ArchivedNchs => 2,
            SourceId::WorldMortality => 3,
        }
    }

    pub fn all() -> [SourceId; 4] {
        [
            SourceId::WorldMortality,
            SourceId::CdcProvisional,
            SourceId::ArchivedNchs,
            SourceId::Local2019,
        ]
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source observation: all-cause deaths for a jurisdiction in one week.
///
/// `geography` holds the raw label until the geographic normalizer
/// canonicalizes it; `year`/`week` hold the source's claim until the temporal
/// normalizer validates (and, for the bundled 2019 file, shifts) it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MortalityRecord {
    pub source: SourceId,
    pub geography: String,
    pub year: i32,
    pub week: u32,
    pub week_ending_date: Option<NaiveDate>,
    pub deaths: u64,
}

impl MortalityRecord {
    pub fn key(&self) -> WeekKey {
        WeekKey {
            geography: self.geography.clone(),
            year: self.year,
            week: self.week,
        }
    }
}

/// Identity of one output row. The `Ord` derive gives the
/// (geography, year, week) ordering the output tables are sorted by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WeekKey {
    pub geography: String,
    pub year: i32,
    pub week: u32,
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} wk {}", self.geography, self.year, self.week)
    }
}

/// A reconciled row after the population join: at most one per `WeekKey`.
/// `population` and `rate_per_100k` stay `None` (empty output fields) when no
/// population estimate exists for the geography/year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedRecord {
    pub geography: String,
    pub year: i32,
    pub week: u32,
    pub week_ending_date: Option<NaiveDate>,
    pub deaths: u64,
    pub population: Option<u64>,
    pub rate_per_100k: Option<f64>,
    pub source: SourceId,
}

/// Why a row was dropped before output. Rejects are counted per source and
/// reported at the end of the run; they never abort anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectKind {
    /// Malformed row: unparseable or negative deaths, missing fields.
    RecordRejected,
    /// Geography label not in the canonical jurisdiction set.
    UnknownGeography,
    /// Canonical week fell outside 1..=53.
    TemporalOutOfRange,
}

impl fmt::Display for RejectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RejectKind::RecordRejected => "record_rejected",
            RejectKind::UnknownGeography => "unknown_geography",
            RejectKind::TemporalOutOfRange => "temporal_out_of_range",
        };
        f.write_str(name)
    }
}

/// A counted, non-fatal row drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reject {
    pub kind: RejectKind,
    pub detail: String,
}

impl Reject {
    pub fn new(kind: RejectKind, detail: impl Into<String>) -> Self {
        Reject {
            kind,
            detail: detail.into(),
        }
    }
}

/// What one adapter delivers after retrieval and row extraction. `skipped`
/// counts rows the source recognizes but deliberately excludes (the bundled
/// 2019 file's national-total rows), as opposed to rejects.
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<MortalityRecord>,
    pub rejects: Vec<Reject>,
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_id_round_trips_through_parse() {
        for id in SourceId::all() {
            assert_eq!(SourceId::parse(id.as_str()), Some(id));
        }
        assert_eq!(SourceId::parse("unknown"), None);
    }

    #[test]
    fn ordinals_are_distinct() {
        let mut seen: Vec<u8> = SourceId::all().iter().map(|s| s.ordinal()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn week_key_orders_by_geography_then_year_then_week() {
        let a = WeekKey {
            geography: "Alabama".into(),
            year: 2020,
            week: 30,
        };
        let b = WeekKey {
            geography: "Alabama".into(),
            year: 2021,
            week: 1,
        };
        let c = WeekKey {
            geography: "Wyoming".into(),
            year: 2015,
            week: 1,
        };
        assert!(a < b);
        assert!(b < c);
    }
}
