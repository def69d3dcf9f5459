//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - wire-level records (`RawObservation`, `Scalar`)
//! - lookup tables (`ReferenceKind`, `ReferenceTable`, `ReferenceSet`)
//! - the canonical output row (`CleanRecord`)

pub mod types;

pub use types::*;
