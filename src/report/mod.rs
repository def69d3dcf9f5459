//! Dashboard analytics over the snapshot: world overview, rankings and movers.
//!
//! Everything here reads `CleanRecord`s and returns plain tables; rendering
//! lives in `format` (text) and `crate::tui` (terminal UI).

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::CleanRecord;

pub mod chart;
pub mod format;

pub use chart::{Chart, ChartFilter, ChartSeries, ChartSpec, build_chart, prep_series};
pub use format::{format_balance, format_chart, format_overview, format_rankings};

/// Attributes shown as KPIs when the caller does not pick any.
pub const HEADLINE_ATTRIBUTES: [&str; 5] =
    ["Production", "Exports", "Imports", "Ending Stocks", "Total Use"];

pub const TREND_ATTRIBUTES: [&str; 3] = ["Production", "Exports", "Ending Stocks"];

pub const DEFAULT_UNIT: &str = "(1000 MT)";

const OTHERS: &str = "Others";

/// Records loaded from the snapshot, plus the option lists the selectors need.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<CleanRecord>,
}

impl Dataset {
    pub fn new(records: Vec<CleanRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[CleanRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn years(&self) -> Vec<i32> {
        distinct(self.records.iter().map(|r| r.market_year))
    }

    pub fn latest_year(&self) -> Option<i32> {
        self.records.iter().map(|r| r.market_year).max()
    }

    pub fn units(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.unit_description.clone()))
    }

    pub fn commodities(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.commodity_description.clone()))
    }

    pub fn countries(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.country_name.clone()))
    }

    pub fn attributes(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.attribute_description.clone()))
    }

    pub fn product_types(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.product_type().to_string()))
    }

    /// Commodities whose description starts with `product_type`.
    pub fn commodities_of_type(&self, product_type_name: &str) -> Vec<String> {
        distinct(
            self.records
                .iter()
                .filter(|r| r.product_type() == product_type_name)
                .map(|r| r.commodity_description.clone()),
        )
    }
}

fn distinct<T: Ord>(items: impl Iterator<Item = T>) -> Vec<T> {
    items.collect::<BTreeSet<_>>().into_iter().collect()
}

/// Position of `preferred` in `options`, or 0.
pub fn default_index<S: AsRef<str>>(options: &[S], preferred: &str) -> usize {
    options
        .iter()
        .position(|o| o.as_ref() == preferred)
        .unwrap_or(0)
}

/// The feed sometimes publishes its own "World" row; the overview sums countries instead.
pub fn is_world(country: &str) -> bool {
    country.eq_ignore_ascii_case("world")
}

/// One row of the manual world aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldRow {
    pub market_year: i32,
    pub unit_description: String,
    pub commodity_description: String,
    pub attribute_description: String,
    pub value: f64,
}

/// Sum over every country except "World", by (year, unit, commodity, attribute).
pub fn manual_world(records: &[CleanRecord]) -> Vec<WorldRow> {
    let mut groups: BTreeMap<(i32, &str, &str, &str), f64> = BTreeMap::new();
    for r in records.iter().filter(|r| !is_world(&r.country_name)) {
        *groups
            .entry((
                r.market_year,
                r.unit_description.as_str(),
                r.commodity_description.as_str(),
                r.attribute_description.as_str(),
            ))
            .or_insert(0.0) += r.value;
    }
    groups
        .into_iter()
        .map(|((year, unit, commodity, attribute), value)| WorldRow {
            market_year: year,
            unit_description: unit.to_string(),
            commodity_description: commodity.to_string(),
            attribute_description: attribute.to_string(),
            value,
        })
        .collect()
}

/// Year, unit and product chosen on the overview page. `product: None` means all products.
#[derive(Debug, Clone, PartialEq)]
pub struct OverviewSelection {
    pub year: i32,
    pub unit: String,
    pub product: Option<String>,
    pub attributes: Vec<String>,
}

impl OverviewSelection {
    /// Latest year, the thousand-MT unit if present, every product, headline attributes.
    pub fn default_for(dataset: &Dataset) -> Option<Self> {
        let year = dataset.latest_year()?;
        let units = dataset.units();
        let unit = units.get(default_index(&units, DEFAULT_UNIT))?.clone();
        let present = dataset.attributes();
        let attributes = HEADLINE_ATTRIBUTES
            .iter()
            .filter(|a| present.iter().any(|p| p.as_str() == **a))
            .map(|a| a.to_string())
            .collect();
        Some(Self {
            year,
            unit,
            product: None,
            attributes,
        })
    }

    fn product_matches(&self, commodity: &str) -> bool {
        self.product.as_deref().is_none_or(|p| p == commodity)
    }

    fn matches_world(&self, row: &WorldRow) -> bool {
        row.market_year == self.year
            && row.unit_description == self.unit
            && self.product_matches(&row.commodity_description)
            && self.attributes.contains(&row.attribute_description)
    }

    fn matches_country(&self, r: &CleanRecord, year: i32, metric: &str) -> bool {
        r.market_year == year
            && r.unit_description == self.unit
            && r.attribute_description == metric
            && !is_world(&r.country_name)
            && self.product_matches(&r.commodity_description)
    }
}

/// World total per selected attribute, in selection order. Absent attributes read as 0.
pub fn kpis(world: &[WorldRow], sel: &OverviewSelection) -> Vec<(String, f64)> {
    let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
    for row in world.iter().filter(|r| sel.matches_world(r)) {
        *sums.entry(row.attribute_description.as_str()).or_insert(0.0) += row.value;
    }
    sel.attributes
        .iter()
        .map(|a| (a.clone(), sums.get(a.as_str()).copied().unwrap_or(0.0)))
        .collect()
}

/// Product × attribute pivot of the world aggregate; missing cells are 0.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorldTotals {
    pub attributes: Vec<String>,
    pub rows: Vec<(String, Vec<f64>)>,
}

impl WorldTotals {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn world_totals(world: &[WorldRow], sel: &OverviewSelection) -> WorldTotals {
    let mut cells: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
    let mut attributes = BTreeSet::new();
    for row in world.iter().filter(|r| sel.matches_world(r)) {
        attributes.insert(row.attribute_description.as_str());
        *cells
            .entry(row.commodity_description.as_str())
            .or_default()
            .entry(row.attribute_description.as_str())
            .or_insert(0.0) += row.value;
    }
    let rows = cells
        .into_iter()
        .map(|(product, by_attr)| {
            let values = attributes
                .iter()
                .map(|a| by_attr.get(a).copied().unwrap_or(0.0))
                .collect();
            (product.to_string(), values)
        })
        .collect();
    WorldTotals {
        attributes: attributes.into_iter().map(str::to_string).collect(),
        rows,
    }
}

/// World value per year for each trend attribute present, for the selected unit and product.
pub fn world_trend(world: &[WorldRow], unit: &str, product: Option<&str>) -> BTreeMap<String, Vec<(i32, f64)>> {
    let mut series: BTreeMap<String, BTreeMap<i32, f64>> = BTreeMap::new();
    for row in world.iter().filter(|r| {
        r.unit_description == unit
            && TREND_ATTRIBUTES.contains(&r.attribute_description.as_str())
            && product.is_none_or(|p| p == r.commodity_description)
    }) {
        *series
            .entry(row.attribute_description.clone())
            .or_default()
            .entry(row.market_year)
            .or_insert(0.0) += row.value;
    }
    series
        .into_iter()
        .map(|(attr, points)| (attr, points.into_iter().collect()))
        .collect()
}

/// A name and its value in a ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked {
    pub name: String,
    pub value: f64,
}

fn by_value_desc(a: &(String, f64), b: &(String, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

/// Largest `n` entries, then one "Others" entry for the rest when its sum is positive.
pub fn top_n_with_others(totals: impl IntoIterator<Item = (String, f64)>, n: usize) -> Vec<Ranked> {
    let mut sorted: Vec<(String, f64)> = totals.into_iter().collect();
    sorted.sort_by(by_value_desc);

    let others: f64 = sorted.iter().skip(n).map(|(_, v)| v).sum();
    let mut out: Vec<Ranked> = sorted
        .into_iter()
        .take(n)
        .map(|(name, value)| Ranked { name, value })
        .collect();
    if others > 0.0 {
        out.push(Ranked {
            name: OTHERS.to_string(),
            value: others,
        });
    }
    out
}

fn country_sums(records: &[CleanRecord], sel: &OverviewSelection, year: i32, metric: &str) -> BTreeMap<String, f64> {
    let mut sums = BTreeMap::new();
    for r in records.iter().filter(|r| sel.matches_country(r, year, metric)) {
        *sums.entry(r.country_name.clone()).or_insert(0.0) += r.value;
    }
    sums
}

/// Top countries for `metric` in the selected year, unit and product.
pub fn top_countries(records: &[CleanRecord], sel: &OverviewSelection, metric: &str, n: usize) -> Vec<Ranked> {
    top_n_with_others(country_sums(records, sel, sel.year, metric), n)
}

/// Year-over-year change for one country.
#[derive(Debug, Clone, PartialEq)]
pub struct Mover {
    pub country: String,
    pub previous: f64,
    pub current: f64,
    pub change: f64,
}

/// Countries with the largest increase in `metric` versus the previous year.
///
/// Countries reporting in the selected year only are compared against 0.
pub fn movers(records: &[CleanRecord], sel: &OverviewSelection, metric: &str, n: usize) -> Vec<Mover> {
    let current = country_sums(records, sel, sel.year, metric);
    let previous = country_sums(records, sel, sel.year - 1, metric);

    let mut out: Vec<Mover> = current
        .into_iter()
        .map(|(country, now)| {
            let prev = previous.get(&country).copied().unwrap_or(0.0);
            Mover {
                country,
                previous: prev,
                current: now,
                change: now - prev,
            }
        })
        .collect();
    out.sort_by(|a, b| b.change.total_cmp(&a.change).then_with(|| a.country.cmp(&b.country)));
    out.truncate(n);
    out
}

/// Everything the overview page shows for one selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
    pub selection: OverviewSelection,
    pub kpis: Vec<(String, f64)>,
    pub totals: WorldTotals,
    pub trend: BTreeMap<String, Vec<(i32, f64)>>,
    pub top_metric: String,
    pub top: Vec<Ranked>,
    pub mover_metric: String,
    pub movers: Vec<Mover>,
}

impl Overview {
    pub fn build(
        records: &[CleanRecord],
        selection: OverviewSelection,
        top_metric: &str,
        mover_metric: &str,
        n: usize,
    ) -> Self {
        let world = manual_world(records);
        Self {
            kpis: kpis(&world, &selection),
            totals: world_totals(&world, &selection),
            trend: world_trend(&world, &selection.unit, selection.product.as_deref()),
            top: top_countries(records, &selection, top_metric, n),
            movers: movers(records, &selection, mover_metric, n),
            top_metric: top_metric.to_string(),
            mover_metric: mover_metric.to_string(),
            selection,
        }
    }

    /// True when the world aggregate has nothing for the selected year, unit and product.
    pub fn has_no_world_data(&self) -> bool {
        self.totals.is_empty()
    }
}
