//! Cross-source reconciliation: collapses overlapping coverage to exactly
//! one record per (geography, year, week), preferring the source configured
//! as more complete and auditing every disagreement it discards.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::warn;

use crate::config::Config;
use crate::types::{MortalityRecord, SourceId, WeekKey};

/// A discarded candidate that disagreed with the kept record on the death
/// count. These go to the audit log and the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub key: WeekKey,
    pub winner: SourceId,
    pub winner_deaths: u64,
    pub loser: SourceId,
    pub loser_deaths: u64,
}

pub struct Reconciler {
    ranks: HashMap<SourceId, u8>,
    undercount: HashMap<SourceId, bool>,
}

impl Reconciler {
    pub fn new(config: &Config) -> Self {
        let mut ranks = HashMap::new();
        let mut undercount = HashMap::new();
        for id in SourceId::all() {
            ranks.insert(id, config.completeness_rank(id));
            undercount.insert(id, config.provisional_undercount(id));
        }
        Reconciler { ranks, undercount }
    }

    /// Resolves the combined table to one record per key.
    ///
    /// Returns the kept records sorted by (geography, year, week) plus the
    /// conflicts discarded along the way. The outcome depends only on record
    /// contents and configuration, never on input arrival order.
    pub fn reconcile(
        &self,
        records: Vec<MortalityRecord>,
    ) -> (Vec<MortalityRecord>, Vec<Conflict>) {
        let mut groups: BTreeMap<WeekKey, Vec<MortalityRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.key()).or_default().push(record);
        }

        let mut kept = Vec::with_capacity(groups.len());
        let mut conflicts = Vec::new();
        for (key, mut candidates) in groups {
            candidates.sort_by_key(|r| self.preference(r));
            let mut rest = candidates.into_iter();
            let winner = match rest.next() {
                Some(winner) => winner,
                None => continue,
            };
            for loser in rest {
                if loser.deaths != winner.deaths {
                    warn!(
                        key = %key,
                        winner = %winner.source,
                        winner_deaths = winner.deaths,
                        loser = %loser.source,
                        loser_deaths = loser.deaths,
                        "sources disagree on death count; keeping higher-priority record"
                    );
                    conflicts.push(Conflict {
                        key: key.clone(),
                        winner: winner.source,
                        winner_deaths: winner.deaths,
                        loser: loser.source,
                        loser_deaths: loser.deaths,
                    });
                }
            }
            kept.push(winner);
        }
        (kept, conflicts)
    }

    /// Candidate ordering; the minimum wins. In order: higher configured
    /// completeness rank, presence of a week-ending date, not being flagged
    /// as a provisional undercounter, stable source position, higher count.
    fn preference(&self, record: &MortalityRecord) -> (Reverse<u8>, bool, bool, u8, Reverse<u64>) {
        let rank = self.ranks.get(&record.source).copied().unwrap_or(0);
        let undercounts = self.undercount.get(&record.source).copied().unwrap_or(false);
        (
            Reverse(rank),
            record.week_ending_date.is_none(),
            undercounts,
            record.source.ordinal(),
            Reverse(record.deaths),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn record(
        source: SourceId,
        geography: &str,
        year: i32,
        week: u32,
        ending: Option<&str>,
        deaths: u64,
    ) -> MortalityRecord {
        MortalityRecord {
            source,
            geography: geography.to_string(),
            year,
            week,
            week_ending_date: ending
                .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
            deaths,
        }
    }

    fn reconciler_with(toml: &str) -> Reconciler {
        Reconciler::new(&toml::from_str(toml).unwrap())
    }

    fn default_reconciler() -> Reconciler {
        Reconciler::new(&Config::default())
    }

    #[test]
    fn higher_rank_wins_the_key() {
        let reconciler = default_reconciler();
        let (kept, conflicts) = reconciler.reconcile(vec![
            record(SourceId::WorldMortality, "United States", 2020, 10, None, 61000),
            record(SourceId::CdcProvisional, "United States", 2020, 10, None, 61500),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source, SourceId::CdcProvisional);
        assert_eq!(kept[0].deaths, 61500);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].loser, SourceId::WorldMortality);
    }

    #[test]
    fn week_ending_date_breaks_rank_ties() {
        let reconciler = reconciler_with(
            r#"
            [sources.world_mortality]
            completeness_rank = 3
            "#,
        );
        let (kept, _) = reconciler.reconcile(vec![
            record(SourceId::WorldMortality, "United States", 2020, 10, None, 61000),
            record(
                SourceId::CdcProvisional,
                "United States",
                2020,
                10,
                Some("2020-03-07"),
                61500,
            ),
        ]);
        assert_eq!(kept[0].source, SourceId::CdcProvisional);
    }

    #[test]
    fn undercount_flag_yields_to_the_other_source() {
        // Equal rank, neither has a date; the provisional feed is flagged as
        // undercounting so the historical record is retained.
        let reconciler = reconciler_with(
            r#"
            [sources.world_mortality]
            completeness_rank = 3
            "#,
        );
        let (kept, _) = reconciler.reconcile(vec![
            record(SourceId::CdcProvisional, "United States", 2020, 10, None, 59000),
            record(SourceId::WorldMortality, "United States", 2020, 10, None, 61000),
        ]);
        assert_eq!(kept[0].source, SourceId::WorldMortality);
    }

    #[test]
    fn full_tie_falls_back_to_stable_source_order() {
        let reconciler = reconciler_with(
            r#"
            [sources.world_mortality]
            completeness_rank = 2
            "#,
        );
        let candidates = vec![
            record(SourceId::WorldMortality, "United States", 2016, 5, None, 55000),
            record(SourceId::ArchivedNchs, "United States", 2016, 5, None, 55200),
        ];
        let (kept, _) = reconciler.reconcile(candidates);
        assert_eq!(kept[0].source, SourceId::ArchivedNchs);
    }

    #[test]
    fn retention_is_independent_of_arrival_order() {
        let reconciler = default_reconciler();
        let forward = vec![
            record(SourceId::WorldMortality, "United States", 2020, 10, None, 61000),
            record(SourceId::CdcProvisional, "United States", 2020, 10, Some("2020-03-07"), 61500),
            record(SourceId::ArchivedNchs, "Texas", 2016, 5, None, 4100),
            record(SourceId::WorldMortality, "United States", 2016, 5, None, 55000),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let (kept_forward, conflicts_forward) = reconciler.reconcile(forward);
        let (kept_reversed, conflicts_reversed) = reconciler.reconcile(reversed);
        assert_eq!(kept_forward, kept_reversed);
        assert_eq!(conflicts_forward, conflicts_reversed);
    }

    #[test]
    fn one_record_per_key_and_sorted_output() {
        let reconciler = default_reconciler();
        let (kept, _) = reconciler.reconcile(vec![
            record(SourceId::CdcProvisional, "Texas", 2020, 11, None, 4200),
            record(SourceId::CdcProvisional, "Texas", 2020, 10, None, 4100),
            record(SourceId::WorldMortality, "United States", 2020, 10, None, 61000),
            record(SourceId::ArchivedNchs, "Texas", 2020, 10, None, 4000),
        ]);

        let keys: Vec<WeekKey> = kept.iter().map(|r| r.key()).collect();
        let unique: HashSet<&WeekKey> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());

        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn agreeing_duplicates_produce_no_conflict() {
        let reconciler = default_reconciler();
        let (kept, conflicts) = reconciler.reconcile(vec![
            record(SourceId::WorldMortality, "United States", 2018, 3, None, 56000),
            record(SourceId::ArchivedNchs, "United States", 2018, 3, None, 56000),
        ]);
        assert_eq!(kept.len(), 1);
        assert!(conflicts.is_empty());
    }
}
