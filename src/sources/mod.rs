//! Source adapters: one per upstream dataset, all funneling into the common
//! `MortalityRecord` shape through the shared retrieval helper.

pub mod archived_nchs;
pub mod cdc_provisional;
pub mod local_2019;
pub mod world_mortality;

use chrono::NaiveDate;

use crate::config::{Config, SourceLocation};
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::types::{Extraction, SourceId};

/// What one source contributes to a run, with payload provenance for the
/// summary.
#[derive(Debug)]
pub struct Harvest {
    pub source: SourceId,
    pub payload_bytes: usize,
    pub payload_sha256: String,
    pub fetch_attempts: u32,
    pub extraction: Extraction,
}

/// Core trait implemented by each mortality data source.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable identifier for this source.
    fn source_id(&self) -> SourceId;

    /// Where this adapter's payload lives (from configuration).
    fn location(&self) -> &SourceLocation;

    /// Turn a retrieved payload into weekly records. Row-level problems
    /// become counted rejects inside the `Extraction`; `Err` means the whole
    /// payload is unusable.
    fn parse(&self, bytes: &[u8]) -> Result<Extraction>;

    /// Retrieve and extract. The default covers every source; failures here
    /// are recorded per source and never abort the run.
    async fn harvest(&self, fetcher: &Fetcher) -> Result<Harvest> {
        let payload = fetcher.fetch(self.source_id(), self.location()).await?;
        let extraction = self.parse(&payload.bytes)?;
        Ok(Harvest {
            source: self.source_id(),
            payload_bytes: payload.bytes.len(),
            payload_sha256: payload.sha256,
            fetch_attempts: payload.attempts,
            extraction,
        })
    }
}

/// Builds the adapter for a source id, wired to its configured location.
pub fn create_source(id: SourceId, config: &Config) -> Box<dyn SourceAdapter> {
    let location = config.location(id);
    match id {
        SourceId::WorldMortality => Box::new(world_mortality::WorldMortality::new(location)),
        SourceId::CdcProvisional => Box::new(cdc_provisional::CdcProvisional::new(location)),
        SourceId::ArchivedNchs => Box::new(archived_nchs::ArchivedNchs::new(location)),
        SourceId::Local2019 => Box::new(local_2019::Local2019::new(location)),
    }
}

/// Header cell for matching: BOM stripped, trimmed, lowercased.
pub(crate) fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_ascii_lowercase()
}

/// Index of the column whose normalized header equals `name`.
pub(crate) fn find_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| normalize_header(h) == name)
}

/// Index of the first column whose normalized header satisfies `pred`.
pub(crate) fn find_column_by<F>(headers: &csv::StringRecord, pred: F) -> Option<usize>
where
    F: Fn(&str) -> bool,
{
    headers.iter().position(|h| pred(&normalize_header(h)))
}

/// Death counts arrive as "1234", "1,234", or "1234.0" depending on the
/// export; negative or non-numeric values are unusable.
pub(crate) fn parse_deaths(raw: &str) -> Option<u64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > 1e15 {
        return None;
    }
    Some(value as u64)
}

/// Integers that may be float-formatted ("2020.0").
pub(crate) fn parse_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    let value: f64 = trimmed.parse().ok()?;
    if !value.is_finite() || value.fract() != 0.0 {
        return None;
    }
    Some(value as i64)
}

/// Week-ending dates arrive as `MM/DD/YYYY` in the provisional feed and
/// `YYYY-MM-DD` in most extracts.
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .ok()
}

/// Reader over a raw payload; all feeds are comma-separated with a header
/// row, some with ragged tails.
pub(crate) fn csv_reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_deaths_accepts_export_formats() {
        assert_eq!(parse_deaths("1234"), Some(1234));
        assert_eq!(parse_deaths("1,234"), Some(1234));
        assert_eq!(parse_deaths("1234.0"), Some(1234));
        assert_eq!(parse_deaths(" 0 "), Some(0));
    }

    #[test]
    fn parse_deaths_rejects_unusable_values() {
        assert_eq!(parse_deaths(""), None);
        assert_eq!(parse_deaths("n/a"), None);
        assert_eq!(parse_deaths("-5"), None);
        assert_eq!(parse_deaths("12.5"), None);
    }

    #[test]
    fn parse_date_accepts_both_feed_formats() {
        let expected = NaiveDate::from_ymd_opt(2020, 1, 4).unwrap();
        assert_eq!(parse_date("01/04/2020"), Some(expected));
        assert_eq!(parse_date("2020-01-04"), Some(expected));
        assert_eq!(parse_date("Jan 4 2020"), None);
    }

    #[test]
    fn header_matching_survives_bom_and_case() {
        let headers = csv::StringRecord::from(vec!["\u{feff}Year", " MMWR Week ", "State"]);
        assert_eq!(find_column(&headers, "year"), Some(0));
        assert_eq!(find_column(&headers, "mmwr week"), Some(1));
        assert_eq!(find_column(&headers, "deaths"), None);
        assert_eq!(
            find_column_by(&headers, |h| h.contains("week")),
            Some(1)
        );
    }
}
