//! Remote data acquisition.
//!
//! - `PsdSource`: the seam between the pipeline and the network
//! - `usda`: the blocking HTTP implementation
//! - `series`: the (commodity × year) fan-out with per-request failure isolation

use tracing::info;

use crate::domain::{RawObservation, ReferenceKind, ReferenceSet, ReferenceTable};
use crate::error::{FetchErrorKind, PipelineError};

pub mod series;
pub mod usda;

pub use series::{FetchProgress, FetchSummary, SeriesBatch, fetch_all_series};
pub use usda::UsdaClient;

/// Anything that can serve PSD lookup tables and series.
pub trait PsdSource: Sync {
    fn fetch_reference(&self, kind: ReferenceKind) -> Result<ReferenceTable, FetchErrorKind>;

    fn fetch_series(
        &self,
        commodity_code: &str,
        market_year: i32,
    ) -> Result<Vec<RawObservation>, FetchErrorKind>;
}

/// Fetch all four lookup tables. The first failure aborts.
pub fn fetch_references<S: PsdSource + ?Sized>(source: &S) -> Result<ReferenceSet, PipelineError> {
    let fetch = |kind: ReferenceKind| {
        let table = source
            .fetch_reference(kind)
            .map_err(|err| PipelineError::ReferenceFetch { table: kind, kind: err })?;
        info!(table = %kind, entries = table.len(), "reference table fetched");
        Ok::<_, PipelineError>(table)
    };

    Ok(ReferenceSet {
        commodities: fetch(ReferenceKind::Commodity)?,
        countries: fetch(ReferenceKind::Country)?,
        attributes: fetch(ReferenceKind::Attribute)?,
        units: fetch(ReferenceKind::Unit)?,
    })
}
