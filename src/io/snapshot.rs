//! Parquet snapshot of the cleaned dataset.
//!
//! The snapshot is the only artifact shared with the dashboard. It is written
//! to a hidden temp file next to the destination, fsynced, then renamed over the
//! previous snapshot, so a reader sees either the old file or the new one.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;
use tracing::info;

use crate::domain::CleanRecord;
use crate::error::SnapshotError;
use crate::etl::CANONICAL_COLUMNS;

/// Arrow schema of the snapshot, in `CANONICAL_COLUMNS` order.
pub fn snapshot_schema() -> SchemaRef {
    let fields = CANONICAL_COLUMNS
        .iter()
        .map(|&name| Field::new(name, column_type(name), false))
        .collect::<Vec<_>>();
    Arc::new(Schema::new(fields))
}

fn column_type(name: &str) -> DataType {
    match name {
        "MarketYear" | "CalendarYear" | "Month" => DataType::Int32,
        "Value" => DataType::Float64,
        _ => DataType::Utf8,
    }
}

/// Write `records` to `path`, replacing any previous snapshot atomically.
pub fn write_snapshot(path: &Path, records: &[CleanRecord]) -> Result<(), SnapshotError> {
    let io_err = |message: String| SnapshotError::Io {
        path: path.to_path_buf(),
        message,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| io_err(format!("failed to create directory: {e}")))?;

    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| io_err("snapshot path has no file name".to_string()))?;
    let tmp = parent.join(format!(".{file_name}.tmp.{}", std::process::id()));

    let result = write_parquet(&tmp, records).and_then(|()| {
        fs::rename(&tmp, path).map_err(|e| format!("failed to move snapshot into place: {e}"))
    });
    if let Err(message) = result {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(message));
    }

    if let Ok(dir) = File::open(&parent) {
        let _ = dir.sync_all();
    }
    info!(path = %path.display(), rows = records.len(), "snapshot written");
    Ok(())
}

fn write_parquet(path: &Path, records: &[CleanRecord]) -> Result<(), String> {
    let schema = snapshot_schema();
    let batch = to_record_batch(&schema, records).map_err(|e| format!("failed to build batch: {e}"))?;

    let file = File::create(path).map_err(|e| format!("failed to create temp file: {e}"))?;
    let sink = file
        .try_clone()
        .map_err(|e| format!("failed to clone file handle: {e}"))?;
    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();
    let mut writer =
        ArrowWriter::try_new(sink, schema, Some(props)).map_err(|e| format!("parquet writer: {e}"))?;
    writer.write(&batch).map_err(|e| format!("parquet write: {e}"))?;
    writer.close().map_err(|e| format!("parquet close: {e}"))?;
    file.sync_all().map_err(|e| format!("fsync: {e}"))?;
    Ok(())
}

fn to_record_batch(
    schema: &SchemaRef,
    records: &[CleanRecord],
) -> Result<RecordBatch, arrow::error::ArrowError> {
    let strings = |f: fn(&CleanRecord) -> &str| -> ArrayRef {
        Arc::new(StringArray::from_iter_values(records.iter().map(f)))
    };
    let ints = |f: fn(&CleanRecord) -> i32| -> ArrayRef {
        Arc::new(Int32Array::from_iter_values(records.iter().map(f)))
    };

    RecordBatch::try_new(
        schema.clone(),
        vec![
            strings(|r| r.commodity_description.as_str()),
            strings(|r| r.country_name.as_str()),
            ints(|r| r.market_year),
            ints(|r| r.calendar_year),
            ints(|r| r.month),
            strings(|r| r.attribute_description.as_str()),
            strings(|r| r.unit_description.as_str()),
            Arc::new(Float64Array::from_iter_values(records.iter().map(|r| r.value))) as ArrayRef,
        ],
    )
}

/// Read a snapshot back, checking column names and types first.
pub fn read_snapshot(path: &Path) -> Result<Vec<CleanRecord>, SnapshotError> {
    let io_err = |message: String| SnapshotError::Io {
        path: path.to_path_buf(),
        message,
    };

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SnapshotError::Missing(path.to_path_buf()));
        }
        Err(e) => return Err(io_err(e.to_string())),
    };

    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| io_err(format!("not a parquet file: {e}")))?;
    check_schema(builder.schema())?;
    let reader = builder.build().map_err(|e| io_err(e.to_string()))?;

    let mut out = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| io_err(e.to_string()))?;
        append_batch(&batch, &mut out)?;
    }
    Ok(out)
}

fn check_schema(found: &Schema) -> Result<(), SnapshotError> {
    let describe = |fields: Vec<(String, DataType)>| {
        fields
            .iter()
            .map(|(name, ty)| format!("{name}:{ty}"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let expected: Vec<(String, DataType)> = snapshot_schema()
        .fields()
        .iter()
        .map(|f| (f.name().clone(), f.data_type().clone()))
        .collect();
    let actual: Vec<(String, DataType)> = found
        .fields()
        .iter()
        .map(|f| (f.name().clone(), f.data_type().clone()))
        .collect();

    if expected != actual {
        return Err(SnapshotError::SchemaMismatch {
            expected: describe(expected),
            found: describe(actual),
        });
    }
    Ok(())
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, index: usize) -> Result<&'a T, SnapshotError> {
    let array = batch.column(index);
    if array.null_count() > 0 {
        return Err(SnapshotError::SchemaMismatch {
            expected: format!("non-null {}", CANONICAL_COLUMNS[index]),
            found: format!("{} null values", array.null_count()),
        });
    }
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| SnapshotError::SchemaMismatch {
            expected: format!("{} as {}", CANONICAL_COLUMNS[index], column_type(CANONICAL_COLUMNS[index])),
            found: array.data_type().to_string(),
        })
}

fn append_batch(batch: &RecordBatch, out: &mut Vec<CleanRecord>) -> Result<(), SnapshotError> {
    let commodity = column::<StringArray>(batch, 0)?;
    let country = column::<StringArray>(batch, 1)?;
    let market_year = column::<Int32Array>(batch, 2)?;
    let calendar_year = column::<Int32Array>(batch, 3)?;
    let month = column::<Int32Array>(batch, 4)?;
    let attribute = column::<StringArray>(batch, 5)?;
    let unit = column::<StringArray>(batch, 6)?;
    let value = column::<Float64Array>(batch, 7)?;

    out.reserve(batch.num_rows());
    for i in 0..batch.num_rows() {
        out.push(CleanRecord {
            commodity_description: commodity.value(i).to_string(),
            country_name: country.value(i).to_string(),
            market_year: market_year.value(i),
            calendar_year: calendar_year.value(i),
            month: month.value(i),
            attribute_description: attribute.value(i).to_string(),
            unit_description: unit.value(i).to_string(),
            value: value.value(i),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<CleanRecord> {
        vec![
            CleanRecord {
                commodity_description: "Oil, Sunflowerseed".to_string(),
                country_name: "Ukraine".to_string(),
                market_year: 2025,
                calendar_year: 2026,
                month: 9,
                attribute_description: "Exports".to_string(),
                unit_description: "(1000 MT)".to_string(),
                value: 5_400.0,
            },
            CleanRecord {
                commodity_description: "Oil, Sunflowerseed".to_string(),
                country_name: "Russia".to_string(),
                market_year: 2025,
                calendar_year: 2026,
                month: 9,
                attribute_description: "Production".to_string(),
                unit_description: "(1000 MT)".to_string(),
                value: 6_125.5,
            },
        ]
    }

    #[test]
    fn written_snapshot_reads_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("latest.parquet");
        write_snapshot(&path, &records()).unwrap();
        assert_eq!(read_snapshot(&path).unwrap(), records());

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn rewrite_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.parquet");
        write_snapshot(&path, &records()).unwrap();
        write_snapshot(&path, &records()[..1]).unwrap();
        assert_eq!(read_snapshot(&path).unwrap().len(), 1);
    }

    #[test]
    fn missing_snapshot_is_actionable() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_snapshot(&dir.path().join("nope.parquet")).unwrap_err();
        assert!(matches!(err, SnapshotError::Missing(_)));
        assert!(err.to_string().contains("psd refresh"));
    }

    #[test]
    fn foreign_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.parquet");
        let schema = Arc::new(Schema::new(vec![Field::new("Country", DataType::Utf8, false)]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(StringArray::from(vec!["Brazil"])) as ArrayRef],
        )
        .unwrap();
        let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let err = read_snapshot(&path).unwrap_err();
        assert!(matches!(err, SnapshotError::SchemaMismatch { .. }));
    }
}
