//! Command-line parsing for the PSD balance-sheet tool.
//!
//! Argument parsing and command dispatch stay separate from the pipeline and
//! the analytics; every subcommand maps onto one `app::handle_*` function.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{Aggregation, SeriesBy};

/// Subcommand names, used by `app::rewrite_args` to decide when to default to `tui`.
pub const SUBCOMMANDS: [&str; 6] = ["refresh", "overview", "balance", "chart", "export", "tui"];

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "psd", version, about = "USDA PSD oilseed balance sheets: refresh the snapshot, then explore it")]
pub struct Cli {
    /// Optional TOML config file; every field has a default.
    #[arg(long, global = true, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Snapshot location (overrides `snapshot_path` from the config).
    #[arg(long, global = true, value_name = "PARQUET")]
    pub snapshot: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch from the PSD API, clean, aggregate and write the parquet snapshot.
    Refresh(RefreshArgs),
    /// Print the world overview: KPIs, totals by product, trend, top countries, movers.
    Overview(OverviewArgs),
    /// Print a country balance sheet with derived rows, plus top-N rankings.
    Balance(BalanceArgs),
    /// Print chart-builder series as a year table.
    Chart(ChartArgs),
    /// Write the chart-builder filtered rows to CSV.
    Export(ExportArgs),
    /// Launch the interactive dashboard.
    Tui,
}

#[derive(Debug, Args, Clone)]
pub struct RefreshArgs {
    /// Run the per-(commodity, year) requests in parallel.
    #[arg(long)]
    pub parallel: bool,

    /// Write cleaned rows without collapsing duplicate keys.
    #[arg(long)]
    pub no_aggregate: bool,
}

#[derive(Debug, Args, Clone)]
pub struct OverviewArgs {
    /// Market year (default: latest in the snapshot).
    #[arg(short = 'y', long)]
    pub year: Option<i32>,

    /// Unit description (default: "(1000 MT)" when present).
    #[arg(short = 'u', long)]
    pub unit: Option<String>,

    /// Commodity description (default: all products).
    #[arg(short = 'p', long)]
    pub product: Option<String>,

    /// Headline attributes; repeat the flag for several.
    #[arg(short = 'a', long = "attribute")]
    pub attributes: Vec<String>,

    /// Attribute ranked in the top-countries table.
    #[arg(long, default_value = "Exports")]
    pub metric: String,

    /// Attribute compared year over year in the movers table.
    #[arg(long, default_value = "Production")]
    pub mover_metric: String,

    /// Rows in the top-countries and movers tables.
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

#[derive(Debug, Args, Clone)]
pub struct BalanceArgs {
    #[arg(short = 'c', long, default_value = "Russia")]
    pub country: String,

    #[arg(short = 'p', long, default_value = "Oil, Sunflowerseed")]
    pub product: String,

    /// Market year for the rankings (default: latest in the snapshot).
    #[arg(short = 'y', long)]
    pub year: Option<i32>,

    /// Countries per ranking table.
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

/// Row filters shared by `chart` and `export`. Omitted lists select everything.
#[derive(Debug, Args, Clone)]
pub struct FilterArgs {
    #[arg(short = 'p', long = "product")]
    pub products: Vec<String>,

    /// Unit description (default: "(1000 MT)" when present).
    #[arg(short = 'u', long)]
    pub unit: Option<String>,

    #[arg(short = 'y', long = "year")]
    pub years: Vec<i32>,

    #[arg(short = 'c', long = "country")]
    pub countries: Vec<String>,

    #[arg(short = 'a', long = "attribute")]
    pub attributes: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ChartArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Left-axis measure (default: first selected attribute, else Production).
    #[arg(long)]
    pub y1: Option<String>,

    /// Optional right-axis measure.
    #[arg(long)]
    pub y2: Option<String>,

    #[arg(long, value_enum, default_value_t = SeriesBy::Country)]
    pub series_by: SeriesBy,

    #[arg(long, value_enum, default_value_t = Aggregation::Sum)]
    pub agg: Aggregation,

    /// Keep only the top N countries by their latest-year Y1 value.
    #[arg(long)]
    pub top: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Destination CSV file.
    #[arg(short = 'o', long, value_name = "CSV")]
    pub out: PathBuf,
}
