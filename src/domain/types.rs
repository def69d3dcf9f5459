//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - deserialized straight from the PSD API payloads (`RawObservation`)
//! - joined against the lookup tables (`ReferenceTable`)
//! - written to and read back from the parquet snapshot (`CleanRecord`)

use std::collections::{BTreeSet, HashMap};

use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::FetchErrorKind;

/// The four lookup tables published next to the PSD series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReferenceKind {
    Commodity,
    Country,
    Attribute,
    Unit,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 4] = [
        ReferenceKind::Commodity,
        ReferenceKind::Country,
        ReferenceKind::Attribute,
        ReferenceKind::Unit,
    ];

    /// Path segment under the API base URL.
    pub fn endpoint(self) -> &'static str {
        match self {
            ReferenceKind::Commodity => "commodities",
            ReferenceKind::Country => "countries",
            ReferenceKind::Attribute => "commodityAttributes",
            ReferenceKind::Unit => "unitsOfMeasure",
        }
    }

    /// Join key, shared with the matching `RawObservation` field.
    pub fn key_field(self) -> &'static str {
        match self {
            ReferenceKind::Commodity => "commodityCode",
            ReferenceKind::Country => "countryCode",
            ReferenceKind::Attribute => "attributeId",
            ReferenceKind::Unit => "unitId",
        }
    }

    pub fn description_field(self) -> &'static str {
        match self {
            ReferenceKind::Commodity => "commodityName",
            ReferenceKind::Country => "countryName",
            ReferenceKind::Attribute => "attributeName",
            ReferenceKind::Unit => "unitDescription",
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            ReferenceKind::Commodity => "commodities",
            ReferenceKind::Country => "countries",
            ReferenceKind::Attribute => "commodity attributes",
            ReferenceKind::Unit => "units of measure",
        }
    }
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A loosely-typed scalar from an API payload.
///
/// The PSD API is not consistent about quoting: years and months arrive as
/// strings in some feeds and as numbers in others. Casting is the cleaner's job.
/// `Null` is a key sent as `null`, kept apart from a key that was never sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl Scalar {
    pub fn from_json(value: &Value) -> Option<Scalar> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(Scalar::Int)
                .or_else(|| n.as_f64().map(Scalar::Float)),
            Value::String(s) => Some(Scalar::Text(s.clone())),
            Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Normalized join key: trimmed text, integral numbers without a fraction.
    pub fn as_key(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Int(v) => v.to_string(),
            Scalar::Float(v) if v.fract() == 0.0 && v.is_finite() => format!("{}", *v as i64),
            Scalar::Float(v) => v.to_string(),
            Scalar::Text(s) => s.trim().to_string(),
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Scalar::Int(v) => i32::try_from(*v).ok(),
            Scalar::Float(v) if v.fract() == 0.0 && v.is_finite() => i32::try_from(*v as i64).ok(),
            Scalar::Float(_) | Scalar::Null => None,
            Scalar::Text(s) => s.trim().parse::<i32>().ok(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            Scalar::Int(v) => *v as f64,
            Scalar::Float(v) => *v,
            Scalar::Text(s) => s.trim().parse::<f64>().ok()?,
            Scalar::Null => return None,
        };
        v.is_finite().then_some(v)
    }
}

/// A key that is on the wire is `Some`, even when its value is `null`.
fn on_wire<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Scalar>, D::Error> {
    Ok(Some(Option::<Scalar>::deserialize(deserializer)?.unwrap_or(Scalar::Null)))
}

/// One record of `/commodity/{code}/country/all/year/{year}`.
///
/// `None` means the key was missing from the object; `Some(Scalar::Null)`
/// means it was sent as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawObservation {
    #[serde(deserialize_with = "on_wire")]
    pub commodity_code: Option<Scalar>,
    #[serde(deserialize_with = "on_wire")]
    pub country_code: Option<Scalar>,
    #[serde(deserialize_with = "on_wire")]
    pub attribute_id: Option<Scalar>,
    #[serde(deserialize_with = "on_wire")]
    pub unit_id: Option<Scalar>,
    #[serde(deserialize_with = "on_wire")]
    pub market_year: Option<Scalar>,
    #[serde(deserialize_with = "on_wire")]
    pub calendar_year: Option<Scalar>,
    #[serde(deserialize_with = "on_wire")]
    pub month: Option<Scalar>,
    #[serde(deserialize_with = "on_wire")]
    pub value: Option<Scalar>,
}

impl RawObservation {
    /// Field names as they appear on the wire.
    pub const FIELDS: [&'static str; 8] = [
        "commodityCode",
        "countryCode",
        "attributeId",
        "unitId",
        "marketYear",
        "calendarYear",
        "month",
        "value",
    ];

    pub fn field(&self, name: &str) -> Option<&Scalar> {
        match name {
            "commodityCode" => self.commodity_code.as_ref(),
            "countryCode" => self.country_code.as_ref(),
            "attributeId" => self.attribute_id.as_ref(),
            "unitId" => self.unit_id.as_ref(),
            "marketYear" => self.market_year.as_ref(),
            "calendarYear" => self.calendar_year.as_ref(),
            "month" => self.month.as_ref(),
            "value" => self.value.as_ref(),
            _ => None,
        }
    }

    /// Wire fields this record carried, `null` or not.
    pub fn present_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        Self::FIELDS
            .into_iter()
            .filter(move |name| self.field(name).is_some())
    }
}

/// Code → description lookup for one `ReferenceKind`.
#[derive(Debug, Clone)]
pub struct ReferenceTable {
    pub kind: ReferenceKind,
    entries: HashMap<String, String>,
    columns: BTreeSet<String>,
}

impl ReferenceTable {
    /// Build a table from an API body. The body must be a non-empty JSON array.
    ///
    /// Rows without a usable key or description are skipped. Columns are
    /// recorded from the object keys, so a column sent only as `null` still
    /// counts as present.
    pub fn from_json(kind: ReferenceKind, body: &Value) -> Result<Self, FetchErrorKind> {
        let rows = body
            .as_array()
            .ok_or_else(|| FetchErrorKind::Malformed("expected a JSON array".to_string()))?;
        if rows.is_empty() {
            return Err(FetchErrorKind::Empty);
        }

        let mut entries = HashMap::new();
        let mut columns = BTreeSet::new();
        for row in rows {
            let Some(obj) = row.as_object() else {
                return Err(FetchErrorKind::Malformed("expected an array of objects".to_string()));
            };
            columns.extend(obj.keys().cloned());

            let key = obj.get(kind.key_field()).and_then(Scalar::from_json);
            let description = obj
                .get(kind.description_field())
                .and_then(Value::as_str)
                .map(str::to_string);
            if let (Some(key), Some(description)) = (key, description) {
                entries.insert(key.as_key(), description);
            }
        }

        Ok(Self {
            kind,
            entries,
            columns,
        })
    }

    pub fn from_pairs<K, V>(kind: ReferenceKind, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let entries: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let columns = [kind.key_field(), kind.description_field()]
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            kind,
            entries,
            columns,
        }
    }

    pub fn lookup(&self, key: &Scalar) -> Option<&str> {
        if key.is_null() {
            return None;
        }
        self.entries.get(&key.as_key()).map(String::as_str)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All four lookup tables for one run.
#[derive(Debug, Clone)]
pub struct ReferenceSet {
    pub commodities: ReferenceTable,
    pub countries: ReferenceTable,
    pub attributes: ReferenceTable,
    pub units: ReferenceTable,
}

/// Canonical output row. Also the row type of the aggregated snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CleanRecord {
    pub commodity_description: String,
    pub country_name: String,
    pub market_year: i32,
    pub calendar_year: i32,
    pub month: i32,
    pub attribute_description: String,
    pub unit_description: String,
    pub value: f64,
}

impl CleanRecord {
    /// Leading segment of the commodity description, e.g. "Oil, Soybean" -> "Oil".
    pub fn product_type(&self) -> &str {
        product_type(&self.commodity_description)
    }
}

pub fn product_type(commodity_description: &str) -> &str {
    commodity_description
        .split(',')
        .next()
        .unwrap_or(commodity_description)
        .trim()
}

/// Which column becomes the legend of a chart-builder chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SeriesBy {
    /// One line per `CountryName`.
    Country,
    /// One line per `AttributeDescription`.
    Attribute,
}

/// How values sharing a (year, series) cell are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Mean,
}

impl SeriesBy {
    pub fn key<'a>(self, record: &'a CleanRecord) -> &'a str {
        match self {
            SeriesBy::Country => &record.country_name,
            SeriesBy::Attribute => &record.attribute_description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_observation_accepts_numbers_and_strings() {
        let raw: RawObservation = serde_json::from_value(json!({
            "commodityCode": "0813100",
            "countryCode": "AR",
            "marketYear": "2024",
            "calendarYear": 2025,
            "month": "07",
            "attributeId": 4,
            "unitId": 8,
            "value": 12.5
        }))
        .unwrap();

        assert_eq!(raw.commodity_code.as_ref().unwrap().as_key(), "0813100");
        assert_eq!(raw.market_year.as_ref().unwrap().as_i32(), Some(2024));
        assert_eq!(raw.month.as_ref().unwrap().as_i32(), Some(7));
        assert_eq!(raw.value.as_ref().unwrap().as_f64(), Some(12.5));
        assert_eq!(raw.present_fields().count(), 8);
    }

    #[test]
    fn null_fields_are_present_and_missing_fields_are_not() {
        let raw: RawObservation =
            serde_json::from_value(json!({"commodityCode": "0813100", "value": null})).unwrap();
        let present: Vec<_> = raw.present_fields().collect();
        assert_eq!(present, vec!["commodityCode", "value"]);
        assert_eq!(raw.value, Some(Scalar::Null));
        assert_eq!(raw.value.as_ref().unwrap().as_f64(), None);
        assert_eq!(raw.country_code, None);
    }

    #[test]
    fn reference_table_keeps_null_only_columns() {
        let table = ReferenceTable::from_json(
            ReferenceKind::Country,
            &json!([
                {"countryCode": "BR", "countryName": null},
                {"countryCode": "AR", "countryName": null}
            ]),
        )
        .unwrap();
        assert!(table.has_column("countryName"));
        assert!(table.is_empty());
        assert_eq!(table.lookup(&Scalar::Text("BR".into())), None);
        assert_eq!(table.lookup(&Scalar::Null), None);
    }

    #[test]
    fn reference_table_rejects_empty_and_non_array_bodies() {
        assert_eq!(
            ReferenceTable::from_json(ReferenceKind::Country, &json!([])).unwrap_err(),
            FetchErrorKind::Empty
        );
        assert!(matches!(
            ReferenceTable::from_json(ReferenceKind::Country, &json!({"message": "nope"})),
            Err(FetchErrorKind::Malformed(_))
        ));
    }

    #[test]
    fn reference_table_normalizes_numeric_keys() {
        let table = ReferenceTable::from_json(
            ReferenceKind::Attribute,
            &json!([
                {"attributeId": 4, "attributeName": "Area Harvested"},
                {"attributeId": "20", "attributeName": "Beginning Stocks"}
            ]),
        )
        .unwrap();
        assert_eq!(table.lookup(&Scalar::Text("4".into())), Some("Area Harvested"));
        assert_eq!(table.lookup(&Scalar::Int(20)), Some("Beginning Stocks"));
        assert!(table.has_column("attributeName"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn product_type_splits_on_first_comma() {
        assert_eq!(product_type("Oil, Soybean"), "Oil");
        assert_eq!(product_type("Oilseed, Soybean (Local)"), "Oilseed");
        assert_eq!(product_type("Cotton"), "Cotton");
    }
}
