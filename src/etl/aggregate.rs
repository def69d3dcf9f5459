//! Collapse cleaned records to one row per aggregation key.

use std::collections::BTreeMap;

use crate::domain::CleanRecord;

/// (CommodityDescription, CountryName, MarketYear, Month, UnitDescription, AttributeDescription)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AggregateKey {
    pub commodity_description: String,
    pub country_name: String,
    pub market_year: i32,
    pub month: i32,
    pub unit_description: String,
    pub attribute_description: String,
}

impl AggregateKey {
    pub fn of(record: &CleanRecord) -> Self {
        Self {
            commodity_description: record.commodity_description.clone(),
            country_name: record.country_name.clone(),
            market_year: record.market_year,
            month: record.month,
            unit_description: record.unit_description.clone(),
            attribute_description: record.attribute_description.clone(),
        }
    }
}

#[derive(Default)]
struct Group {
    values: Vec<f64>,
    calendar_year: i32,
}

/// Sum `Value` per key.
///
/// Values are summed in `total_cmp` order so that any permutation of the input
/// yields bit-identical sums. `CalendarYear` is not part of the key; each group
/// keeps the latest one so the output still has the full record schema.
/// Output is sorted by key.
pub fn aggregate(records: &[CleanRecord]) -> Vec<CleanRecord> {
    let mut groups: BTreeMap<AggregateKey, Group> = BTreeMap::new();
    for record in records {
        let group = groups.entry(AggregateKey::of(record)).or_insert_with(|| Group {
            values: Vec::new(),
            calendar_year: record.calendar_year,
        });
        group.values.push(record.value);
        group.calendar_year = group.calendar_year.max(record.calendar_year);
    }

    groups
        .into_iter()
        .map(|(key, mut group)| {
            group.values.sort_by(f64::total_cmp);
            let value = group.values.iter().copied().reduce(|a, b| a + b).unwrap_or(0.0);
            CleanRecord {
                commodity_description: key.commodity_description,
                country_name: key.country_name,
                market_year: key.market_year,
                calendar_year: group.calendar_year,
                month: key.month,
                attribute_description: key.attribute_description,
                unit_description: key.unit_description,
                value,
            }
        })
        .collect()
}
