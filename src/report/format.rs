//! Plain-text tables for the `overview`, `balance` and `chart` subcommands.
//!
//! Formatting stays in one place so the analytics above return data only and
//! terminal output changes are localized.

use crate::balance::{BalanceRow, BalanceSheet};
use crate::report::chart::{Chart, ChartSeries};
use crate::report::{Mover, Overview, Ranked};

/// Overview: KPIs, world totals by product, world trend, top countries and movers.
pub fn format_overview(overview: &Overview) -> String {
    let sel = &overview.selection;
    let mut out = String::new();

    out.push_str("=== psd - World Snapshot ===\n");
    out.push_str(&format!(
        "Market year: {} | Unit: {} | Product: {}\n",
        sel.year,
        sel.unit,
        sel.product.as_deref().unwrap_or("All"),
    ));

    if overview.has_no_world_data() {
        out.push_str("\nNo World data for this selection. Try another unit/year/product.\n");
        return out;
    }

    out.push('\n');
    for (attribute, value) in &overview.kpis {
        out.push_str(&format!("{:<24} {:>14}\n", attribute, fmt_qty(*value)));
    }

    out.push_str("\nWorld totals by product:\n");
    out.push_str(&header_line(
        ("product", 28),
        overview.totals.attributes.iter().map(|a| (a.as_str(), 14)),
    ));
    for (product, values) in &overview.totals.rows {
        let mut line = format!("{:<28}", truncate(product, 28));
        for v in values {
            line.push_str(&format!(" {:>14}", fmt_qty(*v)));
        }
        push_line(&mut out, &line);
    }

    if !overview.trend.is_empty() {
        out.push_str("\nWorld trend:\n");
        let years: Vec<i32> = overview
            .trend
            .values()
            .flat_map(|points| points.iter().map(|(y, _)| *y))
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        let labels: Vec<String> = years.iter().map(i32::to_string).collect();
        out.push_str(&header_line(("attribute", 24), labels.iter().map(|l| (l.as_str(), 12))));
        for (attribute, points) in &overview.trend {
            let mut line = format!("{:<24}", truncate(attribute, 24));
            for y in &years {
                let cell = points
                    .iter()
                    .find(|(py, _)| py == y)
                    .map(|(_, v)| fmt_qty(*v))
                    .unwrap_or_default();
                line.push_str(&format!(" {cell:>12}"));
            }
            push_line(&mut out, &line);
        }
    }

    out.push_str(&format!("\nTop countries by {}:\n", overview.top_metric));
    out.push_str(&format_ranked(&overview.top));

    out.push_str(&format!(
        "\nBig movers ({}, {} vs {}):\n",
        overview.mover_metric,
        sel.year,
        sel.year - 1
    ));
    out.push_str(&format_movers(&overview.movers));

    out
}

fn format_movers(movers: &[Mover]) -> String {
    let mut out = header_line(
        ("country", 24),
        [("previous", 14), ("current", 14), ("change", 14)].into_iter(),
    );
    for m in movers {
        push_line(
            &mut out,
            &format!(
                "{:<24} {:>14} {:>14} {:>14}",
                truncate(&m.country, 24),
                fmt_qty(m.previous),
                fmt_qty(m.current),
                fmt_qty(m.change),
            ),
        );
    }
    out
}

fn format_ranked(rows: &[Ranked]) -> String {
    if rows.is_empty() {
        return "(no data)\n".to_string();
    }
    let mut out = header_line(("country", 24), [("value", 14)].into_iter());
    for r in rows {
        push_line(&mut out, &format!("{:<24} {:>14}", truncate(&r.name, 24), fmt_qty(r.value)));
    }
    out
}

/// Balance sheet: attribute rows in display order, one column per market year.
pub fn format_balance(sheet: &BalanceSheet) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {} - {} ===\n", sheet.commodity, sheet.country));

    let labels: Vec<String> = sheet.years.iter().map(i32::to_string).collect();
    out.push_str(&header_line(("attribute", 24), labels.iter().map(|l| (l.as_str(), 12))));
    for row in &sheet.rows {
        let marker = if row.derived { "*" } else { "" };
        let mut line = format!("{:<24}", format!("{}{marker}", row.attribute));
        for v in &row.values {
            line.push_str(&format!(" {:>12}", fmt_cell(row, *v)));
        }
        push_line(&mut out, &line);
    }
    out.push_str("(* derived)\n");
    out.push_str(&format!("\nAvailable attributes: {}\n", sheet.available.join(", ")));
    out
}

fn fmt_cell(row: &BalanceRow, v: Option<f64>) -> String {
    match v {
        None => String::new(),
        Some(v) if row.is_percent() => format!("{v:.1}%"),
        Some(v) => fmt_qty(v),
    }
}

/// Top-N tables, one per ranked attribute.
pub fn format_rankings(year: i32, n: usize, tables: &[(&str, Vec<Ranked>)]) -> String {
    let mut out = String::new();
    for (title, rows) in tables {
        out.push_str(&format!("\nTop {n} {title} - {year}:\n"));
        out.push_str(&format_ranked(rows));
    }
    out
}

/// Chart-builder output as a year × series table per axis.
pub fn format_chart(chart: &Chart) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {} ===\n", chart.title));
    out.push_str(&format!("{}\n", chart.caption));

    if chart.is_empty() {
        out.push_str("\nNo data for this selection. Broaden filters and ensure Y1 exists.\n");
        return out;
    }

    let years = chart.years();
    out.push_str(&format!("\n{}:\n", chart.y1_label));
    out.push_str(&series_table(chart, &chart.y1, &chart.y1_name, &years));
    if let (Some(label), Some(name)) = (&chart.y2_label, &chart.y2_name) {
        out.push_str(&format!("\n{label}:\n"));
        out.push_str(&series_table(chart, &chart.y2, name, &years));
    }
    out
}

fn series_table(chart: &Chart, series: &[ChartSeries], measure: &str, years: &[i32]) -> String {
    let labels: Vec<String> = years.iter().map(i32::to_string).collect();
    let mut out = header_line(("series", 32), labels.iter().map(|l| (l.as_str(), 12)));
    for s in series {
        let mut line = format!("{:<32}", truncate(&chart.legend(s, measure), 32));
        for y in years {
            let cell = s.value_at(*y).map(fmt_qty).unwrap_or_default();
            line.push_str(&format!(" {cell:>12}"));
        }
        push_line(&mut out, &line);
    }
    out
}

fn header_line<'a>(first: (&str, usize), rest: impl Iterator<Item = (&'a str, usize)>) -> String {
    let mut head = format!("{:<w$}", first.0, w = first.1);
    let mut rule = "-".repeat(first.1);
    for (label, width) in rest {
        head.push_str(&format!(" {:>w$}", truncate(label, width), w = width));
        rule.push(' ');
        rule.push_str(&"-".repeat(width));
    }
    let mut out = String::new();
    push_line(&mut out, &head);
    push_line(&mut out, &rule);
    out
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Whole-number quantity with thousands separators, e.g. `-1,234,567`.
pub fn fmt_qty(v: f64) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    let rounded = format!("{:.0}", v.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (i, ch) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if v < 0.0 && grouped != "0" {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
