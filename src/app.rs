//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that
//! parses arguments, sets up logging and the config, then dispatches to one
//! handler per subcommand.

use std::path::Path;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::balance::{RANKINGS, balance_sheet, ranking};
use crate::cli::{BalanceArgs, ChartArgs, Cli, Command, ExportArgs, FilterArgs, OverviewArgs, RefreshArgs};
use crate::config::Config;
use crate::error::AppError;
use crate::report::{
    ChartFilter, ChartSpec, DEFAULT_UNIT, Dataset, Overview, OverviewSelection, build_chart, default_index,
    format_balance, format_chart, format_overview, format_rankings,
};

pub mod pipeline;

/// Entry point for the `psd` binary.
pub fn run() -> Result<(), AppError> {
    // `psd` and `psd --snapshot x.parquet` behave like `psd tui ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = Cli::parse_from(argv);

    init_tracing(matches!(cli.command, Command::Tui));

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(path) = cli.snapshot {
        config.snapshot_path = path;
    }

    match cli.command {
        Command::Refresh(args) => handle_refresh(config, args),
        Command::Overview(args) => handle_overview(&config, args),
        Command::Balance(args) => handle_balance(&config, args),
        Command::Chart(args) => handle_chart(&config, args),
        Command::Export(args) => handle_export(&config, args),
        Command::Tui => crate::tui::run(&config.snapshot_path),
    }
}

/// stderr subscriber filtered by `RUST_LOG` (default `info`). The dashboard
/// owns the terminal, so it only logs when `RUST_LOG` asks for it.
fn init_tracing(interactive: bool) {
    let from_env = std::env::var("RUST_LOG").is_ok_and(|v| !v.trim().is_empty());
    if interactive && !from_env {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_refresh(mut config: Config, args: RefreshArgs) -> Result<(), AppError> {
    config.parallel_fetch |= args.parallel;
    config.aggregate &= !args.no_aggregate;

    let summary = pipeline::run_refresh(&config)?;

    println!(
        "Market years {}-{}: {} requests, {} failed",
        summary.window.min_year,
        summary.window.current_year,
        summary.requests,
        summary.failures.len()
    );
    for failure in &summary.failures {
        println!("  failed: {failure}");
    }
    let report = &summary.clean;
    println!(
        "Rows: {} fetched, {} cast failures, {} unresolved, {} out of scope, {} out of window, {} clean",
        summary.raw_rows,
        report.cast_failures,
        report.rows_unresolved,
        report.out_of_scope,
        report.out_of_window,
        report.rows_out
    );
    println!(
        "Wrote {} rows to {}",
        summary.rows_written,
        summary.snapshot_path.display()
    );
    Ok(())
}

fn load_dataset(path: &Path) -> Result<Dataset, AppError> {
    let dataset = Dataset::new(crate::io::read_snapshot(path)?);
    if dataset.is_empty() {
        return Err(AppError::new(
            3,
            format!("snapshot at {} has no rows; run `psd refresh`", path.display()),
        ));
    }
    Ok(dataset)
}

fn handle_overview(config: &Config, args: OverviewArgs) -> Result<(), AppError> {
    let dataset = load_dataset(&config.snapshot_path)?;
    let Some(mut selection) = OverviewSelection::default_for(&dataset) else {
        return Err(AppError::new(3, "snapshot has no market years"));
    };
    if let Some(year) = args.year {
        selection.year = year;
    }
    if let Some(unit) = args.unit {
        selection.unit = unit;
    }
    selection.product = args.product;
    if !args.attributes.is_empty() {
        selection.attributes = args.attributes;
    }

    let overview = Overview::build(
        dataset.records(),
        selection,
        &args.metric,
        &args.mover_metric,
        args.top,
    );
    println!("{}", format_overview(&overview));
    Ok(())
}

fn handle_balance(config: &Config, args: BalanceArgs) -> Result<(), AppError> {
    let dataset = load_dataset(&config.snapshot_path)?;
    let records = dataset.records();

    match balance_sheet(records, &args.country, &args.product) {
        Some(sheet) => println!("{}", format_balance(&sheet)),
        None => println!(
            "No data found for {} / {} with UnitDescription containing '1000 MT'.",
            args.country, args.product
        ),
    }

    let Some(year) = args.year.or_else(|| dataset.latest_year()) else {
        return Ok(());
    };
    let tables: Vec<(&str, Vec<_>)> = RANKINGS
        .iter()
        .map(|(attribute, title)| (*title, ranking(records, &args.product, year, attribute, args.top)))
        .collect();
    println!("{}", format_rankings(year, args.top, &tables));
    Ok(())
}

/// Filter from the flags. Omitted lists select everything; the unit falls
/// back to thousand MT when the snapshot has it.
fn chart_filter(dataset: &Dataset, args: FilterArgs) -> ChartFilter {
    let unit = args.unit.unwrap_or_else(|| {
        let units = dataset.units();
        units
            .get(default_index(&units, DEFAULT_UNIT))
            .cloned()
            .unwrap_or_else(|| DEFAULT_UNIT.to_string())
    });
    ChartFilter {
        products: args.products,
        unit,
        years: args.years,
        countries: args.countries,
        attributes: args.attributes,
    }
}

fn handle_chart(config: &Config, args: ChartArgs) -> Result<(), AppError> {
    let dataset = load_dataset(&config.snapshot_path)?;
    let mut filter = chart_filter(&dataset, args.filter);

    let y1 = args
        .y1
        .or_else(|| filter.attributes.first().cloned())
        .unwrap_or_else(|| "Production".to_string());
    // Measures must survive the attribute filter.
    if !filter.attributes.is_empty() {
        for measure in std::iter::once(&y1).chain(&args.y2) {
            if !filter.attributes.contains(measure) {
                filter.attributes.push(measure.clone());
            }
        }
    }

    let spec = ChartSpec {
        filter,
        series_by: args.series_by,
        aggregation: args.agg,
        y1,
        y2: args.y2,
        top_n: args.top,
    };
    let chart = build_chart(dataset.records(), &spec);
    if chart.is_empty() {
        println!("No data for this selection. Broaden filters and ensure Y1 exists.");
        return Ok(());
    }
    println!("{}", format_chart(&chart));
    Ok(())
}

fn handle_export(config: &Config, args: ExportArgs) -> Result<(), AppError> {
    let dataset = load_dataset(&config.snapshot_path)?;
    let filter = chart_filter(&dataset, args.filter);
    let rows = filter.apply(dataset.records());
    crate::io::export_records_csv(&args.out, &rows)?;
    println!("Exported {} rows to {}", rows.len(), args.out.display());
    Ok(())
}

/// Global flags that consume the next token as their value.
const GLOBAL_VALUE_FLAGS: [&str; 2] = ["--config", "--snapshot"];

/// First token after the program name that is neither a flag nor a flag value.
fn first_positional(argv: &[String]) -> Option<&str> {
    let mut tokens = argv.iter().skip(1);
    while let Some(token) = tokens.next() {
        if GLOBAL_VALUE_FLAGS.contains(&token.as_str()) {
            tokens.next();
        } else if !token.starts_with('-') {
            return Some(token.as_str());
        }
    }
    None
}

/// Rewrite argv so `psd` defaults to `psd tui`.
///
/// Rules:
/// - `psd`                          -> `psd tui`
/// - `psd --snapshot x.parquet`     -> `psd tui --snapshot x.parquet`
/// - `psd --config c.toml balance`  -> unchanged (a subcommand is present)
/// - `psd --snapshot export`        -> `psd tui --snapshot export` (`export` is the path)
/// - `psd --help/--version/-h`      -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    if first_positional(&argv).is_some_and(|a| crate::cli::SUBCOMMANDS.contains(&a)) {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
    }
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_opens_dashboard() {
        assert_eq!(rewrite_args(args(&["psd"])), args(&["psd", "tui"]));
        assert_eq!(
            rewrite_args(args(&["psd", "--snapshot", "x.parquet"])),
            args(&["psd", "tui", "--snapshot", "x.parquet"])
        );
    }

    #[test]
    fn flag_value_named_like_a_subcommand_still_opens_dashboard() {
        assert_eq!(
            rewrite_args(args(&["psd", "--snapshot", "export"])),
            args(&["psd", "tui", "--snapshot", "export"])
        );
        assert_eq!(
            rewrite_args(args(&["psd", "--config", "refresh", "--snapshot", "tui"])),
            args(&["psd", "tui", "--config", "refresh", "--snapshot", "tui"])
        );
    }

    #[test]
    fn explicit_subcommands_and_help_pass_through() {
        let with_global = args(&["psd", "--config", "c.toml", "balance", "-c", "Ukraine"]);
        assert_eq!(rewrite_args(with_global.clone()), with_global);
        assert_eq!(rewrite_args(args(&["psd", "refresh"])), args(&["psd", "refresh"]));
        assert_eq!(
            rewrite_args(args(&["psd", "--snapshot", "s.parquet", "--config", "c.toml", "chart"])),
            args(&["psd", "--snapshot", "s.parquet", "--config", "c.toml", "chart"])
        );
        assert_eq!(rewrite_args(args(&["psd", "--help"])), args(&["psd", "--help"]));
    }

    #[test]
    fn omitted_filter_lists_select_everything() {
        let dataset = Dataset::new(vec![crate::domain::CleanRecord {
            commodity_description: "Oil, Sunflowerseed".to_string(),
            country_name: "Russia".to_string(),
            market_year: 2025,
            calendar_year: 2025,
            month: 0,
            attribute_description: "Production".to_string(),
            unit_description: "(1000 MT)".to_string(),
            value: 10.0,
        }]);
        let filter = chart_filter(
            &dataset,
            FilterArgs {
                products: Vec::new(),
                unit: None,
                years: Vec::new(),
                countries: Vec::new(),
                attributes: Vec::new(),
            },
        );
        assert_eq!(filter.unit, "(1000 MT)");
        assert_eq!(filter.apply(dataset.records()).len(), 1);
    }
}
