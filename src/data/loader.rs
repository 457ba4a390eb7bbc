use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    StringArray,
};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, Row, Table, dedupe_headers};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a sensor dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – header row followed by records (the usual upload)
/// * `.json`         – `[{ "Type": "L", "Torque [Nm]": 42.8, ... }, ...]`
/// * `.parquet`      – flat scalar columns
pub fn load_table(path: &Path) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" | "txt" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one record per line.
///
/// Records are read flexibly: a short record leaves its trailing columns
/// `Null`, surplus fields are dropped, and a record the reader cannot decode
/// is kept as a defective row so later stages still see one row per record.
fn load_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .context("opening CSV")?;

    let raw_headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if raw_headers.iter().all(|h| h.is_empty()) {
        bail!("CSV has no header row");
    }
    let headers = dedupe_headers(raw_headers);

    let mut rows = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                log::warn!("CSV row {row_no}: {e}");
                rows.push(Row {
                    index: row_no,
                    values: null_row(&headers),
                    defect: Some(format!("unreadable record: {e}")),
                });
                continue;
            }
        };

        if record.len() > headers.len() {
            log::warn!(
                "CSV row {row_no}: {} fields for {} columns, extra fields ignored",
                record.len(),
                headers.len()
            );
        }

        let mut values = null_row(&headers);
        for (col_name, value) in headers.iter().zip(record.iter()) {
            values.insert(col_name.clone(), CellValue::guess(value));
        }

        rows.push(Row { index: row_no, values, defect: None });
    }

    Ok(Table::new(headers, rows))
}

fn null_row(headers: &[String]) -> BTreeMap<String, CellValue> {
    headers.iter().map(|h| (h.clone(), CellValue::Null)).collect()
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "Product ID": "L47181", "Type": "L", "Air temperature [K]": 298.1 },
///   ...
/// ]
/// ```
///
/// Column order is the order of first appearance across records.
fn load_json(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut columns: Vec<String> = Vec::new();
    for rec in records {
        if let Some(obj) = rec.as_object() {
            for key in obj.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }

    let mut rows = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let mut values = null_row(&columns);
        let Some(obj) = rec.as_object() else {
            rows.push(Row {
                index: i,
                values,
                defect: Some(format!("row {i} is not a JSON object")),
            });
            continue;
        };

        for (key, val) in obj {
            values.insert(key.clone(), json_to_cell(val));
        }

        rows.push(Row { index: i, values, defect: None });
    }

    Ok(Table::new(columns, rows))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with flat scalar columns.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let arrays: Vec<ArrayRef> = schema
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(field, col)| scalar_column(field.name(), col))
            .collect();

        for row in 0..batch.num_rows() {
            let mut values = BTreeMap::new();
            for (field, col) in schema.fields().iter().zip(&arrays) {
                values.insert(field.name().clone(), extract_cell(col, row));
            }
            let index = rows.len();
            rows.push(Row { index, values, defect: None });
        }
    }

    Ok(Table::new(columns, rows))
}

// -- Parquet / Arrow helpers --

/// Cast a column to one of the types `extract_cell` reads: narrow and
/// unsigned integers to Int64, decimals and half floats to Float64,
/// dictionary and view strings to Utf8. Columns that cannot be cast are
/// returned unchanged and read as nulls.
fn scalar_column(name: &str, col: &ArrayRef) -> ArrayRef {
    let target = match col.data_type() {
        DataType::Utf8
        | DataType::LargeUtf8
        | DataType::Int32
        | DataType::Int64
        | DataType::Float32
        | DataType::Float64
        | DataType::Boolean => return Arc::clone(col),
        DataType::Int8
        | DataType::Int16
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => DataType::Int64,
        DataType::Float16 | DataType::Decimal128(..) | DataType::Decimal256(..) => DataType::Float64,
        DataType::Dictionary(..) | DataType::Utf8View => DataType::Utf8,
        other => {
            log::warn!("column '{name}': unsupported type {other}, values read as null");
            return Arc::clone(col);
        }
    };
    match cast(col.as_ref(), &target) {
        Ok(converted) => converted,
        Err(e) => {
            log::warn!("column '{name}': cannot read {} as {target}: {e}", col.data_type());
            Arc::clone(col)
        }
    }
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &ArrayRef, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => match any.downcast_ref::<StringArray>() {
            Some(s) => CellValue::String(s.value(row).to_string()),
            None => CellValue::Null,
        },
        DataType::LargeUtf8 => {
            CellValue::String(col.as_string::<i64>().value(row).to_string())
        }
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map_or(CellValue::Null, |a| CellValue::Integer(a.value(row) as i64)),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map_or(CellValue::Null, |a| CellValue::Integer(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map_or(CellValue::Null, |a| CellValue::Float(a.value(row) as f64)),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map_or(CellValue::Null, |a| CellValue::Float(a.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map_or(CellValue::Null, |a| CellValue::Bool(a.value(row))),
        _ => CellValue::Null,
    }
}
