//! Export chart-builder rows to CSV.
//!
//! Columns are the snapshot columns in canonical order, so the file opens the
//! same way in spreadsheets as the parquet does in dataframe tools.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::CleanRecord;
use crate::error::AppError;

/// Write `rows` to `sink` with a header line.
pub fn write_records_csv<W: Write>(sink: W, rows: &[&CleanRecord]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(sink);
    for r in rows {
        writer.serialize(r)?;
    }
    if rows.is_empty() {
        writer.write_record(crate::etl::CANONICAL_COLUMNS)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `rows` to a CSV file at `path`.
pub fn export_records_csv(path: &Path, rows: &[&CleanRecord]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(4, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_records_csv(file, rows)
        .map_err(|e| AppError::new(4, format!("Failed to write export CSV '{}': {e}", path.display())))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "csv export written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(country: &str, value: f64) -> CleanRecord {
        CleanRecord {
            commodity_description: "Oil, Sunflowerseed".to_string(),
            country_name: country.to_string(),
            market_year: 2025,
            calendar_year: 2026,
            month: 9,
            attribute_description: "Exports".to_string(),
            unit_description: "(1000 MT)".to_string(),
            value,
        }
    }

    #[test]
    fn csv_has_canonical_header_and_quotes_commas() {
        let rows = [rec("Ukraine", 5400.0), rec("Russia", 3100.5)];
        let refs: Vec<&CleanRecord> = rows.iter().collect();
        let mut buf = Vec::new();
        write_records_csv(&mut buf, &refs).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("CommodityDescription,CountryName,MarketYear,CalendarYear,Month,AttributeDescription,UnitDescription,Value")
        );
        assert_eq!(
            lines.next(),
            Some("\"Oil, Sunflowerseed\",Ukraine,2025,2026,9,Exports,(1000 MT),5400.0")
        );
        assert_eq!(lines.count(), 1);
    }

    #[test]
    fn empty_export_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        export_records_csv(&path, &[]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("CommodityDescription,CountryName,"));
        assert_eq!(text.lines().count(), 1);
    }
}
