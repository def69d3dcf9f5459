//! Supply and distribution balance sheets.

pub mod derive;
pub mod sheet;

pub use derive::{AttributeGrid, DERIVATIONS, Derivation, Rule, derive_rows};
pub use sheet::{
    BalanceRow, BalanceSheet, RANKINGS, ROW_ORDER, balance_sheet, country_totals, is_thousand_mt,
    ranking,
};
