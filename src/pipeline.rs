//! Orchestration: concurrent source harvests, per-source normalization, and
//! the reconcile/join/output tail that produces the two tables.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::constants::NATIONAL_GEOGRAPHY;
use crate::error::{CompileError, Result};
use crate::fetch::Fetcher;
use crate::geography;
use crate::mmwr;
use crate::output;
use crate::population::{self, PopulationTable};
use crate::reconcile::Reconciler;
use crate::sources::{self, Harvest};
use crate::summary::{RunSummary, SourceReport};
use crate::types::{MortalityRecord, SourceId};

/// Runs the full compilation for the given sources and writes both output
/// tables. Individual source failures are recorded and tolerated; the run
/// fails only when no source yields usable records.
#[instrument(skip_all, fields(sources = requested.len()))]
pub async fn run(config: &Config, requested: &[SourceId]) -> Result<RunSummary> {
    let mut summary = RunSummary::new();
    info!(run_id = %summary.run_id, "starting mortality compilation");
    println!(
        "🚀 Compiling weekly mortality from {} sources",
        requested.len()
    );

    let population = PopulationTable::bundled()?;
    let fetcher = Arc::new(Fetcher::new(config.retry.clone())?);

    let mut tasks: JoinSet<(SourceId, Result<Harvest>)> = JoinSet::new();
    for &id in requested {
        let adapter = sources::create_source(id, config);
        let fetcher = Arc::clone(&fetcher);
        tasks.spawn(async move { (id, adapter.harvest(&fetcher).await) });
    }

    let mut results: BTreeMap<SourceId, Result<Harvest>> = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((id, outcome)) => {
                results.insert(id, outcome);
            }
            Err(e) => error!(error = %e, "source task aborted"),
        }
    }

    // Harvests are folded in declaration order so downstream stages see the
    // same record order on every run, whatever order the tasks finished in.
    let mut combined: Vec<MortalityRecord> = Vec::new();
    for id in SourceId::all().into_iter().filter(|id| requested.contains(id)) {
        match results.remove(&id) {
            Some(Ok(harvest)) => {
                let (report, records) = normalize_source(harvest);
                if id == SourceId::Local2019 && !records.is_empty() {
                    let national = derive_national(&records);
                    info!(
                        weeks = national.len(),
                        "rebuilt national series from bundled state rows"
                    );
                    summary.derived_national_rows = national.len();
                    combined.extend(national);
                }
                combined.extend(records);
                summary.sources.push(report);
            }
            Some(Err(e)) => {
                println!("   ✗ {}: {}", id, e);
                warn!(source = %id, error = %e, "source unavailable, continuing without it");
                summary.sources.push(SourceReport::failed(id, e.to_string()));
            }
            None => {
                summary
                    .sources
                    .push(SourceReport::failed(id, "task aborted".to_string()));
            }
        }
    }

    if summary.usable_sources() == 0 {
        error!("every source failed or came back empty");
        return Err(CompileError::NoUsableData);
    }

    let (reconciled, conflicts) = Reconciler::new(config).reconcile(combined);
    summary.conflicts = conflicts;

    let (resolved, join_report) = population::join(&population, reconciled);
    summary.joined = join_report.joined;
    summary.missing_population = join_report.missing_population;

    summary.finish(&resolved, config.validation.yoy_swing_threshold);

    let files = output::write_tables(&config.output.directory, &resolved)?;
    summary.record_output(&files);

    summary.print_report();
    summary.log_json()?;
    info!(
        run_id = %summary.run_id,
        national_rows = files.national_rows,
        state_rows = files.state_rows,
        "compilation complete"
    );
    Ok(summary)
}

/// Runs one harvest through the temporal and geographic stages, folding
/// every stage's rejects into the source's report.
fn normalize_source(harvest: Harvest) -> (SourceReport, Vec<MortalityRecord>) {
    let id = harvest.source;
    let mut report = SourceReport::ok(id);
    report.payload_bytes = harvest.payload_bytes;
    report.payload_sha256 = Some(harvest.payload_sha256);
    report.fetch_attempts = harvest.fetch_attempts;
    report.extracted = harvest.extraction.records.len();
    report.skipped = harvest.extraction.skipped;
    report.add_rejects(&harvest.extraction.rejects);

    let (records, temporal_rejects) = mmwr::normalize(harvest.extraction.records);
    report.add_rejects(&temporal_rejects);
    let (records, geographic_rejects) = geography::normalize(records);
    report.add_rejects(&geographic_rejects);
    report.contributed = records.len();

    println!(
        "   ✓ {}: {} records ({} rejected, {} skipped)",
        id,
        records.len(),
        report.total_rejects(),
        report.skipped
    );
    info!(
        source = %id,
        records = records.len(),
        rejects = report.total_rejects(),
        "source normalized"
    );
    (report, records)
}

/// The bundled 2019 file carries state rows only. National weeks are rebuilt
/// by summing them, so for the year it covers the bundled data outranks
/// external national series the same way its state rows do.
fn derive_national(records: &[MortalityRecord]) -> Vec<MortalityRecord> {
    let mut weeks: BTreeMap<(i32, u32), (u64, Option<NaiveDate>)> = BTreeMap::new();
    for record in records.iter().filter(|r| r.geography != NATIONAL_GEOGRAPHY) {
        let entry = weeks.entry((record.year, record.week)).or_insert((0, None));
        entry.0 += record.deaths;
        if entry.1.is_none() {
            entry.1 = record.week_ending_date;
        }
    }
    weeks
        .into_iter()
        .map(|((year, week), (deaths, week_ending_date))| MortalityRecord {
            source: SourceId::Local2019,
            geography: NATIONAL_GEOGRAPHY.to_string(),
            year,
            week,
            week_ending_date,
            deaths,
        })
        .collect()
}
