//! Geographic normalization: canonical jurisdiction labels, alias lookup,
//! and folding of separately-reported sub-jurisdictions into their parent
//! state.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::constants::NATIONAL_GEOGRAPHY;
use crate::types::{MortalityRecord, Reject, RejectKind};

/// The canonical output geographies: the 50 states, District of Columbia,
/// Puerto Rico, and the national aggregate.
pub const CANONICAL_JURISDICTIONS: [&str; 53] = [
    "Alabama",
    "Alaska",
    "Arizona",
    "Arkansas",
    "California",
    "Colorado",
    "Connecticut",
    "Delaware",
    "Florida",
    "Georgia",
    "Hawaii",
    "Idaho",
    "Illinois",
    "Indiana",
    "Iowa",
    "Kansas",
    "Kentucky",
    "Louisiana",
    "Maine",
    "Maryland",
    "Massachusetts",
    "Michigan",
    "Minnesota",
    "Mississippi",
    "Missouri",
    "Montana",
    "Nebraska",
    "Nevada",
    "New Hampshire",
    "New Jersey",
    "New Mexico",
    "New York",
    "North Carolina",
    "North Dakota",
    "Ohio",
    "Oklahoma",
    "Oregon",
    "Pennsylvania",
    "Rhode Island",
    "South Carolina",
    "South Dakota",
    "Tennessee",
    "Texas",
    "Utah",
    "Vermont",
    "Virginia",
    "Washington",
    "West Virginia",
    "Wisconsin",
    "Wyoming",
    "District of Columbia",
    "Puerto Rico",
    NATIONAL_GEOGRAPHY,
];

/// Jurisdictions some feeds report separately but which are counted inside a
/// parent state; their deaths are added to the parent's.
const SUB_JURISDICTIONS: [(&str, &str); 2] = [
    ("New York City", "New York"),
    ("NYC", "New York"),
];

/// Additional spellings seen in the feeds.
const ALIASES: [(&str, &str); 3] = [
    ("DC", "District of Columbia"),
    ("Washington DC", "District of Columbia"),
    ("US", NATIONAL_GEOGRAPHY),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A canonical output geography.
    Canonical(&'static str),
    /// A sub-jurisdiction whose deaths belong to the named parent state.
    FoldInto(&'static str),
    Unknown,
}

enum Entry {
    Canonical(&'static str),
    Fold(&'static str),
}

static LOOKUP: Lazy<HashMap<String, Entry>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for name in CANONICAL_JURISDICTIONS {
        map.insert(normalize_key(name), Entry::Canonical(name));
    }
    for (alias, name) in ALIASES {
        map.insert(normalize_key(alias), Entry::Canonical(name));
    }
    for (sub, parent) in SUB_JURISDICTIONS {
        map.insert(normalize_key(sub), Entry::Fold(parent));
    }
    map
});

/// Lookup key: lowercased alphanumerics only, so case, whitespace,
/// punctuation, and a stray BOM never defeat a match.
fn normalize_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

pub fn resolve(raw: &str) -> Resolution {
    match LOOKUP.get(&normalize_key(raw)) {
        Some(Entry::Canonical(name)) => Resolution::Canonical(name),
        Some(Entry::Fold(parent)) => Resolution::FoldInto(parent),
        None => Resolution::Unknown,
    }
}

/// Geographic normalization stage for one source's records.
///
/// Labels are canonicalized, sub-jurisdiction deaths are added into the
/// same-source parent record for the same week (or stand in for it when the
/// parent is absent), and unrecognized labels are rejected. Folding happens
/// per source, before reconciliation, so cross-source priority can never
/// discard half of a folded sum.
pub fn normalize(records: Vec<MortalityRecord>) -> (Vec<MortalityRecord>, Vec<Reject>) {
    let mut kept: Vec<MortalityRecord> = Vec::with_capacity(records.len());
    let mut folded: Vec<MortalityRecord> = Vec::new();
    let mut rejects = Vec::new();

    for mut record in records {
        match resolve(&record.geography) {
            Resolution::Canonical(name) => {
                record.geography = name.to_string();
                kept.push(record);
            }
            Resolution::FoldInto(parent) => {
                record.geography = parent.to_string();
                folded.push(record);
            }
            Resolution::Unknown => {
                rejects.push(Reject::new(
                    RejectKind::UnknownGeography,
                    format!(
                        "{}: unrecognized geography '{}'",
                        record.source, record.geography
                    ),
                ));
            }
        }
    }

    if !folded.is_empty() {
        let mut index: HashMap<(String, i32, u32), usize> = HashMap::new();
        for (i, record) in kept.iter().enumerate() {
            index
                .entry((record.geography.clone(), record.year, record.week))
                .or_insert(i);
        }
        for fold in folded {
            let key = (fold.geography.clone(), fold.year, fold.week);
            match index.get(&key) {
                Some(&i) => kept[i].deaths += fold.deaths,
                None => {
                    index.insert(key, kept.len());
                    kept.push(fold);
                }
            }
        }
    }

    (kept, rejects)
}
