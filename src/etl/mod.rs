//! Combine → clean → aggregate.
//!
//! Everything here is a pure function of its inputs; no I/O.

pub mod aggregate;
pub mod clean;
pub mod combine;
pub mod schema;

pub use aggregate::{AggregateKey, aggregate};
pub use clean::{CleanOutput, CleanReport, JoinedRow, UnresolvedCounts, clean, join};
pub use combine::{RawTable, combine};
pub use schema::{AGGREGATE_KEY, CANONICAL_COLUMNS, OutputContract, TrackedCommodities};
