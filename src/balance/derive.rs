//! Derived balance rows.
//!
//! The PSD feed does not publish every balance line for every commodity. The
//! missing ones are synthesized from the published ones by an ordered list of
//! steps; a step may read rows produced by earlier steps. A step whose target
//! already exists, or whose inputs are absent, does nothing.

use std::collections::{BTreeMap, BTreeSet};

pub const DOMESTIC_CONSUMPTION: &str = "Domestic Consumption";
pub const TOTAL_DOM_CONS: &str = "Total Dom. Cons.";
pub const TOTAL_USE: &str = "Total Use";
pub const TOTAL_DISTRIBUTION: &str = "Total Distribution";
pub const STOCK_TO_USE: &str = "Stock-to-Use (%)";
pub const ENDING_STOCKS: &str = "Ending Stocks";
pub const EXPORTS: &str = "Exports";

pub const CONSUMPTION_PARTS: [&str; 4] = [
    "Food Use Dom. Cons.",
    "Industrial Dom. Cons.",
    "Feed Waste Dom. Cons.",
    "Feed Dom. Cons.",
];

/// Attribute × market-year values. Absent cells are simply not stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeGrid {
    rows: BTreeMap<String, BTreeMap<i32, f64>>,
}

impl AttributeGrid {
    /// Add `value` to the (attribute, year) cell.
    pub fn add(&mut self, attribute: &str, year: i32, value: f64) {
        *self
            .rows
            .entry(attribute.to_string())
            .or_default()
            .entry(year)
            .or_insert(0.0) += value;
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.rows.contains_key(attribute)
    }

    pub fn get(&self, attribute: &str, year: i32) -> Option<f64> {
        self.rows.get(attribute)?.get(&year).copied()
    }

    pub fn row(&self, attribute: &str) -> Option<&BTreeMap<i32, f64>> {
        self.rows.get(attribute)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn years(&self) -> BTreeSet<i32> {
        self.rows.values().flat_map(|r| r.keys().copied()).collect()
    }

    fn insert_row(&mut self, attribute: &str, row: BTreeMap<i32, f64>) {
        self.rows.insert(attribute.to_string(), row);
    }
}

/// How a derived row is computed from existing rows.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// Copy `alias` if present; otherwise sum whichever `parts` exist
    /// (a missing part counts as zero, but at least one part must exist).
    AliasOrPartialSum {
        alias: &'static str,
        parts: &'static [&'static str],
    },
    /// Sum of all `terms`; every term must exist.
    Sum(&'static [&'static str]),
    /// `numerator / denominator × 100`; undefined where the denominator is zero.
    Percent {
        numerator: &'static str,
        denominator: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Derivation {
    pub target: &'static str,
    pub rule: Rule,
}

/// Dependency order: each step may read targets of the steps before it.
pub const DERIVATIONS: [Derivation; 4] = [
    Derivation {
        target: DOMESTIC_CONSUMPTION,
        rule: Rule::AliasOrPartialSum {
            alias: TOTAL_DOM_CONS,
            parts: &CONSUMPTION_PARTS,
        },
    },
    Derivation {
        target: TOTAL_USE,
        rule: Rule::Sum(&[DOMESTIC_CONSUMPTION, EXPORTS]),
    },
    Derivation {
        target: TOTAL_DISTRIBUTION,
        rule: Rule::Sum(&[TOTAL_USE, ENDING_STOCKS]),
    },
    Derivation {
        target: STOCK_TO_USE,
        rule: Rule::Percent {
            numerator: ENDING_STOCKS,
            denominator: TOTAL_USE,
        },
    },
];

impl Derivation {
    /// Compute the target row, or `None` when it exists already or cannot be derived.
    pub fn compute(&self, grid: &AttributeGrid) -> Option<BTreeMap<i32, f64>> {
        if grid.contains(self.target) {
            return None;
        }
        let row = match self.rule {
            Rule::AliasOrPartialSum { alias, parts } => match grid.row(alias) {
                Some(row) => row.clone(),
                None => {
                    let mut out = BTreeMap::new();
                    for part in parts.iter().filter_map(|p| grid.row(p)) {
                        for (&year, &v) in part {
                            *out.entry(year).or_insert(0.0) += v;
                        }
                    }
                    out
                }
            },
            Rule::Sum(terms) => {
                let rows: Vec<&BTreeMap<i32, f64>> =
                    terms.iter().map(|t| grid.row(t)).collect::<Option<_>>()?;
                let (first, rest) = rows.split_first()?;
                first
                    .iter()
                    .filter_map(|(&year, &v)| {
                        rest.iter()
                            .map(|r| r.get(&year).copied())
                            .sum::<Option<f64>>()
                            .map(|others| (year, v + others))
                    })
                    .collect()
            }
            Rule::Percent {
                numerator,
                denominator,
            } => {
                let num = grid.row(numerator)?;
                let den = grid.row(denominator)?;
                num.iter()
                    .filter_map(|(&year, &n)| {
                        let d = *den.get(&year)?;
                        (d != 0.0).then(|| (year, n / d * 100.0))
                    })
                    .collect()
            }
        };
        (!row.is_empty()).then_some(row)
    }
}

/// Apply every derivation in order. Returns the targets that were added.
pub fn derive_rows(grid: &mut AttributeGrid) -> Vec<&'static str> {
    let mut added = Vec::new();
    for step in &DERIVATIONS {
        if let Some(row) = step.compute(grid) {
            grid.insert_row(step.target, row);
            added.push(step.target);
        }
    }
    added
}
