//! Join, cast, trim and filter raw observations into `CleanRecord`s.
//!
//! Stage order:
//! 1. left-join the four lookup tables (unresolved codes become `None`)
//! 2. check that every column the join relies on exists
//! 3. cast years, month and value (rows that fail are dropped and counted)
//! 4. trim descriptions; rows with an unresolved or blank description are dropped and counted
//! 5. keep tracked commodities only
//! 6. keep market years inside the window

use tracing::{info, warn};

use crate::config::YearWindow;
use crate::domain::{CleanRecord, RawObservation, ReferenceSet, ReferenceTable, Scalar};
use crate::error::CleaningError;
use crate::etl::combine::RawTable;
use crate::etl::schema::{TrackedCommodities, require_join_columns};

/// A raw observation after the left joins, before any casting.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub commodity_description: Option<String>,
    pub country_name: Option<String>,
    pub attribute_description: Option<String>,
    pub unit_description: Option<String>,
    pub market_year: Option<Scalar>,
    pub calendar_year: Option<Scalar>,
    pub month: Option<Scalar>,
    pub value: Option<Scalar>,
}

/// Rows dropped because a lookup did not resolve, by lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnresolvedCounts {
    pub commodity: usize,
    pub country: usize,
    pub attribute: usize,
    pub unit: usize,
}

impl UnresolvedCounts {
    pub fn total(&self) -> usize {
        self.commodity + self.country + self.attribute + self.unit
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub rows_in: usize,
    pub cast_failures: usize,
    /// Per-lookup counts; a row missing two descriptions is counted twice here
    /// but only once in `rows_unresolved`.
    pub unresolved: UnresolvedCounts,
    pub rows_unresolved: usize,
    pub out_of_scope: usize,
    pub out_of_window: usize,
    pub rows_out: usize,
}

#[derive(Debug, Clone)]
pub struct CleanOutput {
    pub records: Vec<CleanRecord>,
    pub report: CleanReport,
}

/// Left join: every raw row yields exactly one joined row.
pub fn join(raw: &RawTable, refs: &ReferenceSet) -> Vec<JoinedRow> {
    raw.rows().iter().map(|row| join_row(row, refs)).collect()
}

fn join_row(row: &RawObservation, refs: &ReferenceSet) -> JoinedRow {
    let resolve = |table: &ReferenceTable, key: &Option<Scalar>| {
        key.as_ref()
            .and_then(|k| table.lookup(k))
            .map(str::to_string)
    };
    JoinedRow {
        commodity_description: resolve(&refs.commodities, &row.commodity_code),
        country_name: resolve(&refs.countries, &row.country_code),
        attribute_description: resolve(&refs.attributes, &row.attribute_id),
        unit_description: resolve(&refs.units, &row.unit_id),
        market_year: row.market_year.clone(),
        calendar_year: row.calendar_year.clone(),
        month: row.month.clone(),
        value: row.value.clone(),
    }
}

/// Run every cleaning stage. Inputs are not modified.
pub fn clean(
    raw: &RawTable,
    refs: &ReferenceSet,
    tracked: &TrackedCommodities,
    window: YearWindow,
) -> Result<CleanOutput, CleaningError> {
    let joined = join(raw, refs);
    require_join_columns(raw, refs)?;

    let mut report = CleanReport {
        rows_in: joined.len(),
        ..CleanReport::default()
    };
    let mut records = Vec::with_capacity(joined.len());

    for row in joined {
        let Some(numbers) = cast_numbers(&row) else {
            report.cast_failures += 1;
            continue;
        };

        let descriptions = [
            trimmed(row.commodity_description),
            trimmed(row.country_name),
            trimmed(row.attribute_description),
            trimmed(row.unit_description),
        ];
        if descriptions.iter().any(Option::is_none) {
            count_unresolved(&descriptions, &mut report.unresolved);
            report.rows_unresolved += 1;
            continue;
        }
        let [Some(commodity), Some(country), Some(attribute), Some(unit)] = descriptions else {
            continue;
        };

        if !tracked.contains(&commodity) {
            report.out_of_scope += 1;
            continue;
        }
        if !window.contains(numbers.market_year) {
            report.out_of_window += 1;
            continue;
        }

        records.push(CleanRecord {
            commodity_description: commodity,
            country_name: country,
            market_year: numbers.market_year,
            calendar_year: numbers.calendar_year,
            month: numbers.month,
            attribute_description: attribute,
            unit_description: unit,
            value: numbers.value,
        });
    }

    report.rows_out = records.len();
    log_report(&report);
    Ok(CleanOutput { records, report })
}

struct CastNumbers {
    market_year: i32,
    calendar_year: i32,
    month: i32,
    value: f64,
}

fn cast_numbers(row: &JoinedRow) -> Option<CastNumbers> {
    let month = row.month.as_ref()?.as_i32()?;
    if !(0..=12).contains(&month) {
        return None;
    }
    Some(CastNumbers {
        market_year: row.market_year.as_ref()?.as_i32()?,
        calendar_year: row.calendar_year.as_ref()?.as_i32()?,
        month,
        value: row.value.as_ref()?.as_f64()?,
    })
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn count_unresolved(descriptions: &[Option<String>; 4], counts: &mut UnresolvedCounts) {
    let [commodity, country, attribute, unit] = descriptions;
    counts.commodity += usize::from(commodity.is_none());
    counts.country += usize::from(country.is_none());
    counts.attribute += usize::from(attribute.is_none());
    counts.unit += usize::from(unit.is_none());
}

fn log_report(report: &CleanReport) {
    if report.cast_failures > 0 {
        warn!(rows = report.cast_failures, "dropped rows with non-numeric year/month/value");
    }
    if report.rows_unresolved > 0 {
        warn!(
            rows = report.rows_unresolved,
            commodity = report.unresolved.commodity,
            country = report.unresolved.country,
            attribute = report.unresolved.attribute,
            unit = report.unresolved.unit,
            "dropped rows with unresolved reference codes"
        );
    }
    info!(
        rows_in = report.rows_in,
        out_of_scope = report.out_of_scope,
        out_of_window = report.out_of_window,
        rows_out = report.rows_out,
        "cleaning finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReferenceKind;
    use crate::etl::combine::combine;

    fn refs() -> ReferenceSet {
        ReferenceSet {
            commodities: ReferenceTable::from_pairs(
                ReferenceKind::Commodity,
                [("4232000", " Oil, Soybean "), ("0410000", "Wheat")],
            ),
            countries: ReferenceTable::from_pairs(
                ReferenceKind::Country,
                [("BR", "Brazil  "), ("AR", "Argentina")],
            ),
            attributes: ReferenceTable::from_pairs(ReferenceKind::Attribute, [("28", "Production")]),
            units: ReferenceTable::from_pairs(ReferenceKind::Unit, [("8", "(1000 MT)")]),
        }
    }

    fn obs(commodity: &str, country: &str, year: i64, value: Scalar) -> RawObservation {
        RawObservation {
            commodity_code: Some(Scalar::Text(commodity.to_string())),
            country_code: Some(Scalar::Text(country.to_string())),
            attribute_id: Some(Scalar::Int(28)),
            unit_id: Some(Scalar::Int(8)),
            market_year: Some(Scalar::Text(year.to_string())),
            calendar_year: Some(Scalar::Int(year)),
            month: Some(Scalar::Text("10".to_string())),
            value: Some(value),
        }
    }

    fn tracked() -> TrackedCommodities {
        TrackedCommodities::new(["Oil, Soybean"])
    }

    fn window() -> YearWindow {
        YearWindow::ending_at(2026, 5)
    }

    #[test]
    fn left_join_keeps_rows_with_unknown_codes() {
        let raw = combine(vec![vec![
            obs("4232000", "BR", 2025, Scalar::Float(1.0)),
            obs("4232000", "XX", 2025, Scalar::Float(2.0)),
        ]]);
        let joined = join(&raw, &refs());
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].country_name.as_deref(), Some("Brazil  "));
        assert_eq!(joined[1].country_name, None);
        assert_eq!(joined[1].commodity_description.as_deref(), Some(" Oil, Soybean "));
    }

    #[test]
    fn clean_trims_casts_and_filters() {
        let raw = combine(vec![vec![
            obs("4232000", "BR", 2025, Scalar::Float(10.5)),
            obs("4232000", "AR", 2020, Scalar::Int(3)),
            obs("0410000", "AR", 2025, Scalar::Int(3)),
            obs("4232000", "XX", 2025, Scalar::Int(3)),
            obs("4232000", "AR", 2025, Scalar::Text("n/a".to_string())),
        ]]);

        let out = clean(&raw, &refs(), &tracked(), window()).unwrap();
        assert_eq!(out.records.len(), 1);
        let r = &out.records[0];
        assert_eq!(r.commodity_description, "Oil, Soybean");
        assert_eq!(r.country_name, "Brazil");
        assert_eq!(r.market_year, 2025);
        assert_eq!(r.month, 10);
        assert_eq!(r.value, 10.5);

        assert_eq!(
            out.report,
            CleanReport {
                rows_in: 5,
                cast_failures: 1,
                unresolved: UnresolvedCounts {
                    country: 1,
                    ..UnresolvedCounts::default()
                },
                rows_unresolved: 1,
                out_of_scope: 1,
                out_of_window: 1,
                rows_out: 1,
            }
        );
    }

    #[test]
    fn every_clean_row_satisfies_the_contract() {
        let mut rows = Vec::new();
        for year in 2018..=2027 {
            for country in ["BR", "AR", "ZZ"] {
                rows.push(obs("4232000", country, year, Scalar::Int(year)));
                rows.push(obs("0410000", country, year, Scalar::Int(year)));
            }
        }
        let raw = combine(vec![rows]);
        let tracked = tracked();
        let out = clean(&raw, &refs(), &tracked, window()).unwrap();
        assert!(!out.records.is_empty());

        let contract = crate::etl::schema::OutputContract {
            tracked: &tracked,
            window: window(),
        };
        contract.check(&out.records).unwrap();
        assert!(out.records.iter().all(|r| r.market_year >= 2022));
    }

    #[test]
    fn month_outside_calendar_fails_cast() {
        let mut row = obs("4232000", "BR", 2025, Scalar::Int(1));
        row.month = Some(Scalar::Int(13));
        let out = clean(&combine(vec![vec![row]]), &refs(), &tracked(), window()).unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.report.cast_failures, 1);
    }

    #[test]
    fn empty_raw_table_cleans_to_nothing() {
        let out = clean(&combine(Vec::new()), &refs(), &tracked(), window()).unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.report.rows_in, 0);
    }

    #[test]
    fn null_valued_wire_column_is_a_cast_failure_not_a_schema_error() {
        let row: RawObservation = serde_json::from_value(serde_json::json!({
            "commodityCode": "4232000",
            "countryCode": "BR",
            "attributeId": 28,
            "unitId": 8,
            "marketYear": "2025",
            "calendarYear": 2025,
            "month": 10,
            "value": null
        }))
        .unwrap();
        let out = clean(&combine(vec![vec![row]]), &refs(), &tracked(), window()).unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.report.cast_failures, 1);
    }

    #[test]
    fn null_only_description_column_drops_rows_as_unresolved() {
        let mut refs = refs();
        refs.countries = ReferenceTable::from_json(
            ReferenceKind::Country,
            &serde_json::json!([{"countryCode": "BR", "countryName": null}]),
        )
        .unwrap();
        let raw = combine(vec![vec![obs("4232000", "BR", 2025, Scalar::Int(1))]]);
        let out = clean(&raw, &refs, &tracked(), window()).unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.report.rows_unresolved, 1);
        assert_eq!(out.report.unresolved.country, 1);
    }

    #[test]
    fn structurally_missing_value_column_fails() {
        let mut row = obs("4232000", "BR", 2025, Scalar::Int(1));
        row.value = None;
        let err = clean(&combine(vec![vec![row]]), &refs(), &tracked(), window()).unwrap_err();
        assert_eq!(
            err,
            CleaningError::MissingSchemaField {
                table: "observations",
                field: "value"
            }
        );
    }
}
