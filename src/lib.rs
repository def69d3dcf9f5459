//! `psd-balances` library crate.
//!
//! The binary (`psd`) is a thin wrapper around this library so that:
//!
//! - the refresh pipeline is testable against an in-memory source
//! - the dashboard analytics are shared by the CLI reports and the TUI
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod balance;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod etl;
pub mod io;
pub mod report;
pub mod tui;
