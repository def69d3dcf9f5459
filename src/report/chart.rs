//! Chart builder: filter the snapshot, then turn one attribute into year series.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{Aggregation, CleanRecord, SeriesBy};
use crate::report::{DEFAULT_UNIT, Dataset, default_index};

/// Row filter. Empty lists select everything; the unit always has to match.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartFilter {
    pub products: Vec<String>,
    pub unit: String,
    pub years: Vec<i32>,
    pub countries: Vec<String>,
    pub attributes: Vec<String>,
}

fn default_multi(options: &[String], preferred: &[&str], fallback_n: usize) -> Vec<String> {
    let picked: Vec<String> = preferred
        .iter()
        .filter(|p| options.iter().any(|o| o == *p))
        .map(|p| p.to_string())
        .collect();
    if picked.is_empty() {
        options.iter().take(fallback_n).cloned().collect()
    } else {
        picked
    }
}

impl ChartFilter {
    /// Starting selection: sunflower products, thousand MT, last six years,
    /// Black Sea countries and Production/Exports, or whatever exists instead.
    pub fn default_for(dataset: &Dataset) -> Option<Self> {
        let products = default_multi(
            &dataset.commodities(),
            &["Meal, Sunflowerseed", "Oil, Sunflowerseed"],
            2,
        );
        let in_products = |r: &&CleanRecord| products.is_empty() || products.contains(&r.commodity_description);

        let units: Vec<String> = dataset
            .records()
            .iter()
            .filter(in_products)
            .map(|r| r.unit_description.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let unit = units.get(default_index(&units, DEFAULT_UNIT))?.clone();

        let base: Vec<&CleanRecord> = dataset
            .records()
            .iter()
            .filter(in_products)
            .filter(|r| r.unit_description == unit)
            .collect();
        let years: Vec<i32> = base.iter().map(|r| r.market_year).collect::<BTreeSet<_>>().into_iter().collect();
        let years = years[years.len().saturating_sub(6)..].to_vec();

        let countries: Vec<String> = base.iter().map(|r| r.country_name.clone()).collect::<BTreeSet<_>>().into_iter().collect();
        let attributes: Vec<String> = base
            .iter()
            .map(|r| r.attribute_description.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Some(Self {
            products,
            unit,
            years,
            countries: default_multi(&countries, &["Russia", "Ukraine", "World"], 3),
            attributes: default_multi(&attributes, &["Production", "Exports"], 2),
        })
    }

    pub fn matches(&self, r: &CleanRecord) -> bool {
        r.unit_description == self.unit
            && (self.products.is_empty() || self.products.contains(&r.commodity_description))
            && (self.years.is_empty() || self.years.contains(&r.market_year))
            && (self.countries.is_empty() || self.countries.contains(&r.country_name))
            && (self.attributes.is_empty() || self.attributes.contains(&r.attribute_description))
    }

    pub fn apply<'a>(&self, records: &'a [CleanRecord]) -> Vec<&'a CleanRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }

    /// Caption line, e.g. "Oil, Sunflowerseed | Unit: (1000 MT) | Years: 2021-2026".
    pub fn caption(&self) -> String {
        let years = match (self.years.iter().min(), self.years.iter().max()) {
            (Some(lo), Some(hi)) => format!("{lo}-{hi}"),
            _ => "All years".to_string(),
        };
        format!("{} | Unit: {} | Years: {years}", self.products_label(), self.unit)
    }

    pub fn products_label(&self) -> String {
        if self.products.is_empty() {
            "All products".to_string()
        } else {
            self.products.join(", ")
        }
    }
}

/// One legend entry: market year → aggregated value, sorted by year.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    pub points: Vec<(i32, f64)>,
}

impl ChartSeries {
    pub fn value_at(&self, year: i32) -> Option<f64> {
        self.points.iter().find(|(y, _)| *y == year).map(|(_, v)| *v)
    }
}

/// Aggregate `attribute` per (market year, series key). Series are sorted by name.
pub fn prep_series(
    rows: &[&CleanRecord],
    attribute: &str,
    by: SeriesBy,
    aggregation: Aggregation,
) -> Vec<ChartSeries> {
    let mut cells: BTreeMap<&str, BTreeMap<i32, Vec<f64>>> = BTreeMap::new();
    for r in rows.iter().filter(|r| r.attribute_description == attribute) {
        cells
            .entry(by.key(r))
            .or_default()
            .entry(r.market_year)
            .or_default()
            .push(r.value);
    }

    cells
        .into_iter()
        .map(|(name, by_year)| ChartSeries {
            name: name.to_string(),
            points: by_year
                .into_iter()
                .map(|(year, values)| (year, combine(values, aggregation)))
                .collect(),
        })
        .collect()
}

fn combine(mut values: Vec<f64>, aggregation: Aggregation) -> f64 {
    values.sort_by(f64::total_cmp);
    let sum: f64 = values.iter().sum();
    match aggregation {
        Aggregation::Sum => sum,
        Aggregation::Mean if values.is_empty() => 0.0,
        Aggregation::Mean => sum / values.len() as f64,
    }
}

/// Everything the chart-builder needs to draw one chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub filter: ChartFilter,
    pub series_by: SeriesBy,
    pub aggregation: Aggregation,
    pub y1: String,
    pub y2: Option<String>,
    /// Keep only the top N countries by their latest-year Y1 value.
    pub top_n: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub title: String,
    pub caption: String,
    pub series_by: SeriesBy,
    pub y1_name: String,
    pub y2_name: Option<String>,
    pub y1_label: String,
    pub y2_label: Option<String>,
    pub y1: Vec<ChartSeries>,
    pub y2: Vec<ChartSeries>,
}

impl Chart {
    pub fn is_empty(&self) -> bool {
        self.y1.is_empty() && self.y2.is_empty()
    }

    /// Legend text for a series: countries carry the measure name, attributes are the measure.
    pub fn legend(&self, series: &ChartSeries, measure: &str) -> String {
        match self.series_by {
            SeriesBy::Country => format!("{} - {measure}", series.name),
            SeriesBy::Attribute => series.name.clone(),
        }
    }

    pub fn years(&self) -> Vec<i32> {
        self.y1
            .iter()
            .chain(&self.y2)
            .flat_map(|s| s.points.iter().map(|(y, _)| *y))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Countries ranked by their value in the latest year any Y1 series reaches.
fn top_countries_by_latest(series: &[ChartSeries], n: usize) -> BTreeSet<String> {
    let Some(latest) = series.iter().filter_map(|s| s.points.last().map(|(y, _)| *y)).max() else {
        return BTreeSet::new();
    };
    let mut at_latest: Vec<(&str, f64)> = series
        .iter()
        .filter_map(|s| Some((s.name.as_str(), s.value_at(latest)?)))
        .collect();
    at_latest.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    at_latest.into_iter().take(n).map(|(name, _)| name.to_string()).collect()
}

pub fn build_chart(records: &[CleanRecord], spec: &ChartSpec) -> Chart {
    let mut rows = spec.filter.apply(records);
    let mut y1 = prep_series(&rows, &spec.y1, spec.series_by, spec.aggregation);

    if let (Some(n), SeriesBy::Country) = (spec.top_n, spec.series_by) {
        if !y1.is_empty() {
            let keep = top_countries_by_latest(&y1, n);
            rows.retain(|r| keep.contains(&r.country_name));
            y1.retain(|s| keep.contains(&s.name));
        }
    }

    let y2 = spec
        .y2
        .as_deref()
        .map(|attr| prep_series(&rows, attr, spec.series_by, spec.aggregation))
        .unwrap_or_default();

    let products = spec.filter.products_label();
    let title = match &spec.y2 {
        Some(y2) => format!("{} vs {y2} - {products}", spec.y1),
        None => format!("{} - {products}", spec.y1),
    };

    Chart {
        title,
        caption: spec.filter.caption(),
        series_by: spec.series_by,
        y1_name: spec.y1.clone(),
        y2_name: spec.y2.clone(),
        y1_label: format!("{} {}", spec.y1, spec.filter.unit),
        y2_label: spec.y2.as_ref().map(|a| format!("{a} {}", spec.filter.unit)),
        y1,
        y2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(country: &str, attribute: &str, year: i32, value: f64) -> CleanRecord {
        CleanRecord {
            commodity_description: "Oil, Sunflowerseed".to_string(),
            country_name: country.to_string(),
            market_year: year,
            calendar_year: year,
            month: 0,
            attribute_description: attribute.to_string(),
            unit_description: "(1000 MT)".to_string(),
            value,
        }
    }

    fn sample() -> Vec<CleanRecord> {
        vec![
            rec("Russia", "Production", 2024, 90.0),
            rec("Russia", "Production", 2025, 100.0),
            rec("Ukraine", "Production", 2024, 120.0),
            rec("Ukraine", "Production", 2025, 80.0),
            rec("Argentina", "Production", 2025, 20.0),
            rec("Russia", "Exports", 2025, 40.0),
            rec("Ukraine", "Exports", 2025, 50.0),
            rec("Argentina", "Exports", 2025, 5.0),
        ]
    }

    fn spec() -> ChartSpec {
        ChartSpec {
            filter: ChartFilter {
                unit: "(1000 MT)".to_string(),
                ..ChartFilter::default()
            },
            series_by: SeriesBy::Country,
            aggregation: Aggregation::Sum,
            y1: "Production".to_string(),
            y2: None,
            top_n: None,
        }
    }

    #[test]
    fn filter_requires_unit_and_honours_lists() {
        let mut f = spec().filter;
        assert_eq!(f.apply(&sample()).len(), 8);
        f.countries = vec!["Russia".to_string()];
        f.years = vec![2025];
        assert_eq!(f.apply(&sample()).len(), 2);
        f.unit = "(HA)".to_string();
        assert!(f.apply(&sample()).is_empty());
    }

    #[test]
    fn series_by_attribute_sum_and_mean() {
        let data = sample();
        let rows: Vec<&CleanRecord> = data.iter().collect();
        let sum = prep_series(&rows, "Production", SeriesBy::Attribute, Aggregation::Sum);
        assert_eq!(sum.len(), 1);
        assert_eq!(sum[0].points, vec![(2024, 210.0), (2025, 200.0)]);

        let mean = prep_series(&rows, "Production", SeriesBy::Attribute, Aggregation::Mean);
        assert_eq!(mean[0].points, vec![(2024, 105.0), (2025, 200.0 / 3.0)]);
    }

    #[test]
    fn top_n_uses_latest_year_of_y1_and_limits_y2() {
        let mut s = spec();
        s.top_n = Some(2);
        s.y2 = Some("Exports".to_string());
        let chart = build_chart(&sample(), &s);

        let names: Vec<&str> = chart.y1.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Russia", "Ukraine"]);
        let y2: Vec<&str> = chart.y2.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(y2, vec!["Russia", "Ukraine"]);
        assert_eq!(chart.title, "Production vs Exports - All products");
        assert_eq!(chart.legend(&chart.y1[0], "Production"), "Russia - Production");
        assert_eq!(chart.years(), vec![2024, 2025]);
    }

    #[test]
    fn default_filter_prefers_known_selection() {
        let ds = Dataset::new(sample());
        let f = ChartFilter::default_for(&ds).unwrap();
        assert_eq!(f.products, vec!["Oil, Sunflowerseed".to_string()]);
        assert_eq!(f.unit, "(1000 MT)");
        assert_eq!(f.years, vec![2024, 2025]);
        assert_eq!(f.countries, vec!["Russia".to_string(), "Ukraine".to_string()]);
        assert_eq!(f.attributes, vec!["Production".to_string(), "Exports".to_string()]);
        assert_eq!(f.caption(), "Oil, Sunflowerseed | Unit: (1000 MT) | Years: 2024-2025");
    }
}
