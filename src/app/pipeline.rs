//! The refresh pipeline shared by `psd refresh` and the dashboard's reload.
//!
//! references -> series fan-out -> combine -> clean -> aggregate -> contract -> snapshot
//!
//! Any fatal error returns before `write_snapshot`, so a failed run never
//! touches the previous snapshot.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::{Config, YearWindow};
use crate::data::{FetchProgress, PsdSource, UsdaClient, fetch_all_series, fetch_references};
use crate::error::{PipelineError, SeriesFetchError};
use crate::etl::{CleanReport, OutputContract, TrackedCommodities, aggregate, clean, combine};
use crate::io::write_snapshot;

/// What a successful refresh did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub window: YearWindow,
    pub requests: usize,
    pub failures: Vec<SeriesFetchError>,
    pub raw_rows: usize,
    pub clean: CleanReport,
    pub rows_written: usize,
    pub snapshot_path: PathBuf,
}

/// Run the pipeline against the live API for the current market-year window.
pub fn run_refresh(config: &Config) -> Result<RunSummary, PipelineError> {
    let client = UsdaClient::from_env(config)?;
    run_refresh_with(config, config.window(), &client, |_| {})
}

/// Run the pipeline against any source and window.
pub fn run_refresh_with<S, F>(
    config: &Config,
    window: YearWindow,
    source: &S,
    on_progress: F,
) -> Result<RunSummary, PipelineError>
where
    S: PsdSource + ?Sized,
    F: Fn(&FetchProgress) + Sync,
{
    info!(
        min_year = window.min_year,
        current_year = window.current_year,
        commodities = config.tracked_codes.len(),
        "refresh started"
    );

    // 1) Lookup tables first: a failure here is fatal and cheap.
    let refs = fetch_references(source)?;

    // 2) One request per (commodity, year); failures are collected.
    let years: Vec<i32> = window.fetch_years().collect();
    let fetched = fetch_all_series(source, &config.tracked_codes, &years, config.parallel_fetch, on_progress);
    let requests = fetched.requests;
    let failures = fetched.failures.clone();
    if !failures.is_empty() {
        warn!(failed = failures.len(), requests, "some series requests failed");
    }

    // 3) Combine.
    let raw = combine(fetched.into_batches());
    if raw.is_empty() {
        return Err(PipelineError::EmptyDataset { stage: "fetch" });
    }
    let raw_rows = raw.len();

    // 4) Clean.
    let tracked = TrackedCommodities::new(&config.tracked_descriptions);
    let cleaned = clean(&raw, &refs, &tracked, window)?;
    if cleaned.records.is_empty() {
        return Err(PipelineError::EmptyDataset { stage: "cleaning" });
    }

    // 5) Aggregate.
    let records = if config.aggregate {
        let out = aggregate(&cleaned.records);
        info!(rows_in = cleaned.records.len(), rows_out = out.len(), "aggregation finished");
        out
    } else {
        cleaned.records
    };

    // 6) Contract, then the atomic write.
    OutputContract {
        tracked: &tracked,
        window,
    }
    .check(&records)?;
    write_snapshot(&config.snapshot_path, &records)?;

    let summary = RunSummary {
        window,
        requests,
        failures,
        raw_rows,
        clean: cleaned.report,
        rows_written: records.len(),
        snapshot_path: config.snapshot_path.clone(),
    };
    info!(
        requests = summary.requests,
        failed = summary.failures.len(),
        rows = summary.rows_written,
        path = %summary.snapshot_path.display(),
        "refresh finished"
    );
    Ok(summary)
}
