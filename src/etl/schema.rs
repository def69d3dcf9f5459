//! The output contract shared with every dashboard view.
//!
//! Column names, the aggregation key, and the record-level invariants live here
//! as data so the cleaner, the aggregator, the snapshot writer and the snapshot
//! reader all agree on one definition.

use std::collections::BTreeSet;

use crate::config::YearWindow;
use crate::domain::{CleanRecord, RawObservation, ReferenceSet, ReferenceTable};
use crate::error::CleaningError;
use crate::etl::combine::RawTable;

/// Snapshot columns, in order.
pub const CANONICAL_COLUMNS: [&str; 8] = [
    "CommodityDescription",
    "CountryName",
    "MarketYear",
    "CalendarYear",
    "Month",
    "AttributeDescription",
    "UnitDescription",
    "Value",
];

/// Grouping columns of the aggregated snapshot.
pub const AGGREGATE_KEY: [&str; 6] = [
    "CommodityDescription",
    "CountryName",
    "MarketYear",
    "Month",
    "UnitDescription",
    "AttributeDescription",
];

/// Allow-list of commodity descriptions the snapshot is scoped to.
#[derive(Debug, Clone)]
pub struct TrackedCommodities {
    descriptions: BTreeSet<String>,
}

impl TrackedCommodities {
    pub fn new<I, S>(descriptions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            descriptions: descriptions
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .collect(),
        }
    }

    pub fn contains(&self, description: &str) -> bool {
        self.descriptions.contains(description)
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }
}

/// Every wire column and every lookup description the join depends on must exist.
///
/// An empty raw table has no columns at all and is accepted here; emptiness is
/// handled by the caller.
pub fn require_join_columns(raw: &RawTable, refs: &ReferenceSet) -> Result<(), CleaningError> {
    if !raw.is_empty() {
        for field in RawObservation::FIELDS {
            if !raw.has_column(field) {
                return Err(CleaningError::MissingSchemaField {
                    table: "observations",
                    field,
                });
            }
        }
    }

    for table in [&refs.commodities, &refs.countries, &refs.attributes, &refs.units] {
        require_reference_columns(table)?;
    }
    Ok(())
}

fn require_reference_columns(table: &ReferenceTable) -> Result<(), CleaningError> {
    for field in [table.kind.key_field(), table.kind.description_field()] {
        if !table.has_column(field) {
            return Err(CleaningError::MissingSchemaField {
                table: table.kind.table_name(),
                field,
            });
        }
    }
    Ok(())
}

/// Record-level invariants of the snapshot.
#[derive(Debug, Clone)]
pub struct OutputContract<'a> {
    pub tracked: &'a TrackedCommodities,
    pub window: YearWindow,
}

impl OutputContract<'_> {
    pub fn check_record(&self, record: &CleanRecord) -> Result<(), String> {
        let strings = [
            ("CommodityDescription", &record.commodity_description),
            ("CountryName", &record.country_name),
            ("AttributeDescription", &record.attribute_description),
            ("UnitDescription", &record.unit_description),
        ];
        for (name, value) in strings {
            if value.is_empty() {
                return Err(format!("{name} is empty"));
            }
            if value.trim() != value.as_str() {
                return Err(format!("{name} has surrounding whitespace: {value:?}"));
            }
        }
        if !self.tracked.contains(&record.commodity_description) {
            return Err(format!(
                "commodity {:?} is not tracked",
                record.commodity_description
            ));
        }
        if !self.window.contains(record.market_year) {
            return Err(format!(
                "market year {} is before {}",
                record.market_year, self.window.min_year
            ));
        }
        if !(0..=12).contains(&record.month) {
            return Err(format!("month {} out of range", record.month));
        }
        if !record.value.is_finite() {
            return Err("value is not finite".to_string());
        }
        Ok(())
    }

    pub fn check(&self, records: &[CleanRecord]) -> Result<(), CleaningError> {
        for (index, record) in records.iter().enumerate() {
            self.check_record(record)
                .map_err(|reason| CleaningError::ContractViolation { index, reason })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ReferenceKind, Scalar};
    use crate::etl::combine::combine;

    fn record() -> CleanRecord {
        CleanRecord {
            commodity_description: "Oil, Soybean".to_string(),
            country_name: "Brazil".to_string(),
            market_year: 2025,
            calendar_year: 2025,
            month: 10,
            attribute_description: "Production".to_string(),
            unit_description: "(1000 MT)".to_string(),
            value: 1.0,
        }
    }

    fn refs() -> ReferenceSet {
        ReferenceSet {
            commodities: ReferenceTable::from_pairs(ReferenceKind::Commodity, [("4232000", "Oil, Soybean")]),
            countries: ReferenceTable::from_pairs(ReferenceKind::Country, [("BR", "Brazil")]),
            attributes: ReferenceTable::from_pairs(ReferenceKind::Attribute, [("28", "Production")]),
            units: ReferenceTable::from_pairs(ReferenceKind::Unit, [("8", "(1000 MT)")]),
        }
    }

    #[test]
    fn contract_rejects_each_invariant() {
        let tracked = TrackedCommodities::new(["Oil, Soybean"]);
        let contract = OutputContract {
            tracked: &tracked,
            window: YearWindow::ending_at(2026, 5),
        };
        assert!(contract.check(&[record()]).is_ok());

        let cases = [
            CleanRecord { country_name: " Brazil".to_string(), ..record() },
            CleanRecord { unit_description: String::new(), ..record() },
            CleanRecord { commodity_description: "Wheat".to_string(), ..record() },
            CleanRecord { market_year: 2021, ..record() },
            CleanRecord { value: f64::NAN, ..record() },
        ];
        for bad in cases {
            let err = contract.check(&[record(), bad]).unwrap_err();
            assert!(matches!(err, CleaningError::ContractViolation { index: 1, .. }));
        }
    }

    #[test]
    fn missing_wire_column_is_a_schema_error() {
        let raw = combine(vec![vec![RawObservation {
            commodity_code: Some(Scalar::Text("4232000".into())),
            ..RawObservation::default()
        }]]);
        let err = require_join_columns(&raw, &refs()).unwrap_err();
        assert_eq!(
            err,
            CleaningError::MissingSchemaField {
                table: "observations",
                field: "countryCode"
            }
        );
    }

    #[test]
    fn reference_without_description_column_is_a_schema_error() {
        let mut refs = refs();
        refs.countries = ReferenceTable::from_json(
            ReferenceKind::Country,
            &serde_json::json!([{"countryCode": "BR", "name": "Brazil"}]),
        )
        .unwrap();
        let err = require_join_columns(&combine(Vec::new()), &refs).unwrap_err();
        assert_eq!(
            err,
            CleaningError::MissingSchemaField {
                table: "countries",
                field: "countryName"
            }
        );
    }
}
