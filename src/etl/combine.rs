//! Concatenate per-request batches into one raw table.

use std::collections::BTreeSet;

use crate::domain::RawObservation;

/// All raw observations of a run plus the wire columns that actually appeared.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    rows: Vec<RawObservation>,
    columns: BTreeSet<&'static str>,
}

impl RawTable {
    pub fn rows(&self) -> &[RawObservation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// A column is present when at least one row carried its key, even as `null`.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }
}

/// Batch order is kept, which helps when tracing a row back to its request.
pub fn combine<I>(batches: I) -> RawTable
where
    I: IntoIterator<Item = Vec<RawObservation>>,
{
    let mut table = RawTable::default();
    for batch in batches {
        for row in &batch {
            table.columns.extend(row.present_fields());
        }
        table.rows.extend(batch);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Scalar;

    fn obs(code: &str) -> RawObservation {
        RawObservation {
            commodity_code: Some(Scalar::Text(code.to_string())),
            value: Some(Scalar::Float(1.0)),
            ..RawObservation::default()
        }
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let table = combine(Vec::<Vec<RawObservation>>::new());
        assert!(table.is_empty());
        assert!(!table.has_column("value"));
    }

    #[test]
    fn concatenates_batches_in_order() {
        let table = combine(vec![vec![obs("a"), obs("b")], vec![], vec![obs("c")]]);
        assert_eq!(table.len(), 3);
        let codes: Vec<String> = table
            .rows()
            .iter()
            .map(|r| r.commodity_code.as_ref().unwrap().as_key())
            .collect();
        assert_eq!(codes, vec!["a", "b", "c"]);
        assert!(table.has_column("commodityCode"));
        assert!(table.has_column("value"));
        assert!(!table.has_column("countryCode"));
    }
}
