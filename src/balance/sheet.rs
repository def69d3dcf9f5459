use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::balance::derive::{
    AttributeGrid, DERIVATIONS, DOMESTIC_CONSUMPTION, STOCK_TO_USE, derive_rows,
};
use crate::domain::CleanRecord;
use crate::report::{Ranked, top_n_with_others};

/// Display order of the balance sheet.
pub const ROW_ORDER: [&str; 10] = [
    "Beginning Stocks",
    "Production",
    "Imports",
    "Total Supply",
    "Exports",
    DOMESTIC_CONSUMPTION,
    "Total Use",
    "Ending Stocks",
    "Total Distribution",
    STOCK_TO_USE,
];

/// Attributes ranked across countries, with their chart titles.
pub const RANKINGS: [(&str, &str); 4] = [
    ("Production", "Producers"),
    ("Exports", "Exporters"),
    ("Imports", "Importers"),
    (DOMESTIC_CONSUMPTION, "Consumers"),
];

static THOUSAND_MT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)1000\s*MT").ok());

/// Balance sheets only use rows measured in thousand metric tons.
pub fn is_thousand_mt(unit: &str) -> bool {
    THOUSAND_MT.as_ref().is_some_and(|re| re.is_match(unit))
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceRow {
    pub attribute: &'static str,
    /// One cell per `BalanceSheet::years`; `None` when neither published nor derivable.
    pub values: Vec<Option<f64>>,
    pub derived: bool,
}

impl BalanceRow {
    pub fn is_percent(&self) -> bool {
        self.attribute == STOCK_TO_USE
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceSheet {
    pub country: String,
    pub commodity: String,
    pub years: Vec<i32>,
    pub rows: Vec<BalanceRow>,
    /// Attributes present in the selection before derivation, sorted.
    pub available: Vec<String>,
}

/// Build the balance sheet for one country and commodity.
///
/// Returns `None` when the selection has no thousand-metric-ton rows.
pub fn balance_sheet(records: &[CleanRecord], country: &str, commodity: &str) -> Option<BalanceSheet> {
    let mut grid = AttributeGrid::default();
    let mut any = false;
    for r in records.iter().filter(|r| {
        r.country_name == country
            && r.commodity_description == commodity
            && is_thousand_mt(&r.unit_description)
    }) {
        grid.add(&r.attribute_description, r.market_year, r.value);
        any = true;
    }
    if !any {
        return None;
    }

    let available = grid.attributes().map(str::to_string).collect();
    let derived = derive_rows(&mut grid);
    let years: Vec<i32> = grid.years().into_iter().collect();

    let rows = ROW_ORDER
        .iter()
        .map(|&attribute| BalanceRow {
            attribute,
            values: years.iter().map(|&y| grid.get(attribute, y)).collect(),
            derived: derived.contains(&attribute),
        })
        .collect();

    Some(BalanceSheet {
        country: country.to_string(),
        commodity: commodity.to_string(),
        years,
        rows,
        available,
    })
}

/// Per-country totals of `attribute` for one commodity and market year.
///
/// Domestic Consumption is synthesized per country when the feed does not
/// publish it, the same way the balance sheet derives it.
pub fn country_totals(
    records: &[CleanRecord],
    commodity: &str,
    year: i32,
    attribute: &str,
) -> BTreeMap<String, f64> {
    let mut by_country: BTreeMap<&str, AttributeGrid> = BTreeMap::new();
    for r in records.iter().filter(|r| {
        r.commodity_description == commodity
            && r.market_year == year
            && is_thousand_mt(&r.unit_description)
    }) {
        by_country
            .entry(r.country_name.as_str())
            .or_default()
            .add(&r.attribute_description, year, r.value);
    }

    by_country
        .into_iter()
        .filter_map(|(country, grid)| {
            let value = grid.get(attribute, year).or_else(|| {
                if attribute != DOMESTIC_CONSUMPTION {
                    return None;
                }
                DERIVATIONS[0].compute(&grid)?.get(&year).copied()
            })?;
            Some((country.to_string(), value))
        })
        .collect()
}

/// Top `n` countries for `attribute`, with the remainder bucketed as "Others".
pub fn ranking(
    records: &[CleanRecord],
    commodity: &str,
    year: i32,
    attribute: &str,
    n: usize,
) -> Vec<Ranked> {
    top_n_with_others(country_totals(records, commodity, year, attribute), n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(country: &str, attribute: &str, year: i32, unit: &str, value: f64) -> CleanRecord {
        CleanRecord {
            commodity_description: "Oil, Sunflowerseed".to_string(),
            country_name: country.to_string(),
            market_year: year,
            calendar_year: year,
            month: 0,
            attribute_description: attribute.to_string(),
            unit_description: unit.to_string(),
            value,
        }
    }

    fn sample() -> Vec<CleanRecord> {
        vec![
            rec("Russia", "Production", 2025, "(1000 MT)", 100.0),
            rec("Russia", "Exports", 2025, "(1000 MT)", 30.0),
            rec("Russia", "Ending Stocks", 2025, "(1000 MT)", 20.0),
            rec("Russia", "Food Use Dom. Cons.", 2025, "(1000 MT)", 10.0),
            rec("Russia", "Industrial Dom. Cons.", 2025, "(1000 MT)", 5.0),
            rec("Russia", "Feed Dom. Cons.", 2025, "(1000 MT)", 5.0),
            rec("Russia", "Production", 2024, "(1000 MT)", 90.0),
            rec("Russia", "Yield", 2025, "(MT/HA)", 1.8),
            rec("Ukraine", "Production", 2025, "(1000MT)", 60.0),
            rec("Ukraine", "Total Dom. Cons.", 2025, "(1000 mt)", 12.0),
        ]
    }

    fn cell(sheet: &BalanceSheet, attribute: &str, year: i32) -> Option<f64> {
        let col = sheet.years.iter().position(|&y| y == year)?;
        sheet.rows.iter().find(|r| r.attribute == attribute)?.values[col]
    }

    #[test]
    fn unit_filter_matches_thousand_mt_variants() {
        assert!(is_thousand_mt("(1000 MT)"));
        assert!(is_thousand_mt("(1000MT)"));
        assert!(is_thousand_mt("1000   mt"));
        assert!(!is_thousand_mt("(MT/HA)"));
        assert!(!is_thousand_mt("(1000 HA)"));
    }

    #[test]
    fn sheet_has_fixed_rows_and_derived_lines() {
        let sheet = balance_sheet(&sample(), "Russia", "Oil, Sunflowerseed").unwrap();
        assert_eq!(sheet.years, vec![2024, 2025]);
        let names: Vec<&str> = sheet.rows.iter().map(|r| r.attribute).collect();
        assert_eq!(names, ROW_ORDER.to_vec());

        assert_eq!(cell(&sheet, "Production", 2025), Some(100.0));
        assert_eq!(cell(&sheet, "Domestic Consumption", 2025), Some(20.0));
        assert_eq!(cell(&sheet, "Total Use", 2025), Some(50.0));
        assert_eq!(cell(&sheet, "Total Distribution", 2025), Some(70.0));
        assert_eq!(cell(&sheet, "Stock-to-Use (%)", 2025), Some(40.0));
        assert_eq!(cell(&sheet, "Total Use", 2024), None);
        assert_eq!(cell(&sheet, "Beginning Stocks", 2025), None);

        let stu = sheet.rows.iter().find(|r| r.attribute == STOCK_TO_USE).unwrap();
        assert!(stu.derived && stu.is_percent());
        assert!(!sheet.available.iter().any(|a| a == "Yield"));
    }

    #[test]
    fn selection_without_thousand_mt_rows_has_no_sheet() {
        let records = vec![rec("Russia", "Yield", 2025, "(MT/HA)", 1.8)];
        assert!(balance_sheet(&records, "Russia", "Oil, Sunflowerseed").is_none());
        assert!(balance_sheet(&sample(), "Brazil", "Oil, Sunflowerseed").is_none());
    }

    #[test]
    fn consumption_ranking_synthesizes_per_country() {
        let totals = country_totals(&sample(), "Oil, Sunflowerseed", 2025, DOMESTIC_CONSUMPTION);
        assert_eq!(totals.get("Russia"), Some(&20.0));
        assert_eq!(totals.get("Ukraine"), Some(&12.0));

        let top = ranking(&sample(), "Oil, Sunflowerseed", 2025, "Production", 1);
        assert_eq!(top[0].name, "Russia");
        assert_eq!(top[1].name, "Others");
        assert_eq!(top[1].value, 60.0);
    }
}
