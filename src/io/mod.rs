//! Input/output helpers.
//!
//! - parquet snapshot write/read (`snapshot`)
//! - CSV export of filtered rows (`export`)

pub mod export;
pub mod snapshot;

pub use export::*;
pub use snapshot::*;
