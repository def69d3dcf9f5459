//! Series fan-out over the tracked commodity codes and the market-year window.
//!
//! One request per (code, year). A failed request is logged, recorded in the
//! summary and contributes no rows; the remaining requests still run.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::data::PsdSource;
use crate::domain::RawObservation;
use crate::error::SeriesFetchError;

/// Progress notification, emitted once per finished request.
#[derive(Debug, Clone)]
pub struct FetchProgress {
    pub completed: usize,
    pub total: usize,
    pub commodity_code: String,
    pub market_year: i32,
    pub ok: bool,
}

/// Records returned for one (code, year) request.
#[derive(Debug, Clone)]
pub struct SeriesBatch {
    pub commodity_code: String,
    pub market_year: i32,
    pub records: Vec<RawObservation>,
}

#[derive(Debug, Clone, Default)]
pub struct FetchSummary {
    pub requests: usize,
    pub batches: Vec<SeriesBatch>,
    pub failures: Vec<SeriesFetchError>,
}

impl FetchSummary {
    pub fn record_count(&self) -> usize {
        self.batches.iter().map(|b| b.records.len()).sum()
    }

    pub fn into_batches(self) -> Vec<Vec<RawObservation>> {
        self.batches.into_iter().map(|b| b.records).collect()
    }
}

/// Fetch every (code, year) pair.
///
/// With `parallel`, requests run on the rayon pool; the summary is the same
/// as the sequential path apart from batch order.
pub fn fetch_all_series<S, F>(
    source: &S,
    codes: &[String],
    years: &[i32],
    parallel: bool,
    on_progress: F,
) -> FetchSummary
where
    S: PsdSource + ?Sized,
    F: Fn(&FetchProgress) + Sync,
{
    let pairs: Vec<(&str, i32)> = codes
        .iter()
        .flat_map(|code| years.iter().map(move |&year| (code.as_str(), year)))
        .collect();
    let total = pairs.len();
    let completed = AtomicUsize::new(0);

    let fetch_one = |&(code, year): &(&str, i32)| {
        let result = source.fetch_series(code, year);
        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = match result {
            Ok(records) => {
                info!("[{done}/{total}] commodity {code} year {year}: {} records", records.len());
                Ok(SeriesBatch {
                    commodity_code: code.to_string(),
                    market_year: year,
                    records,
                })
            }
            Err(kind) => {
                let err = SeriesFetchError {
                    commodity_code: code.to_string(),
                    market_year: year,
                    kind,
                };
                warn!("[{done}/{total}] {err}");
                Err(err)
            }
        };
        on_progress(&FetchProgress {
            completed: done,
            total,
            commodity_code: code.to_string(),
            market_year: year,
            ok: outcome.is_ok(),
        });
        outcome
    };

    let outcomes: Vec<Result<SeriesBatch, SeriesFetchError>> = if parallel {
        pairs.par_iter().map(fetch_one).collect()
    } else {
        pairs.iter().map(fetch_one).collect()
    };

    let mut summary = FetchSummary {
        requests: total,
        ..FetchSummary::default()
    };
    for outcome in outcomes {
        match outcome {
            Ok(batch) => summary.batches.push(batch),
            Err(err) => summary.failures.push(err),
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::domain::{ReferenceKind, ReferenceTable, Scalar};
    use crate::error::FetchErrorKind;

    /// Fails for a fixed set of (code, year) pairs, returns one record otherwise.
    struct FlakySource {
        failing: Vec<(String, i32)>,
    }

    impl PsdSource for FlakySource {
        fn fetch_reference(&self, _kind: ReferenceKind) -> Result<ReferenceTable, FetchErrorKind> {
            Err(FetchErrorKind::Empty)
        }

        fn fetch_series(&self, code: &str, year: i32) -> Result<Vec<RawObservation>, FetchErrorKind> {
            if self.failing.iter().any(|(c, y)| c == code && *y == year) {
                return Err(FetchErrorKind::Status(500));
            }
            Ok(vec![RawObservation {
                commodity_code: Some(Scalar::Text(code.to_string())),
                market_year: Some(Scalar::Int(i64::from(year))),
                ..RawObservation::default()
            }])
        }
    }

    fn codes(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{:07}", 100 + i)).collect()
    }

    #[test]
    fn failures_are_isolated_per_request() {
        let codes = codes(14);
        let years = [2022, 2023, 2024, 2025, 2026];
        let source = FlakySource {
            failing: vec![
                (codes[0].clone(), 2022),
                (codes[5].clone(), 2024),
                (codes[13].clone(), 2026),
            ],
        };

        for parallel in [false, true] {
            let summary = fetch_all_series(&source, &codes, &years, parallel, |_| {});
            assert_eq!(summary.requests, 70);
            assert_eq!(summary.failures.len(), 3);
            assert_eq!(summary.batches.len(), 67);
            assert_eq!(summary.record_count(), 67);
        }
    }

    #[test]
    fn progress_reports_every_request() {
        let codes = codes(2);
        let years = [2025, 2026];
        let source = FlakySource {
            failing: vec![(codes[1].clone(), 2026)],
        };
        let seen = Mutex::new(Vec::new());
        fetch_all_series(&source, &codes, &years, false, |p| {
            seen.lock().unwrap().push((p.completed, p.total, p.ok));
        });
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen, vec![(1, 4, true), (2, 4, true), (3, 4, true), (4, 4, false)]);
    }
}
