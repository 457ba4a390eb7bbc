//! Dataset statistics for the dashboard.
//!
//! Every statistic is computed on its own. A statistic whose columns are
//! missing, or whose columns hold no usable values, is reported as `"N/A"`
//! instead of being dropped, and never stops the others from being computed.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::data::{CellValue, Table, load_table};

pub mod columns;

pub use columns::{DiscoveredColumns, discover_columns};

pub const NOT_APPLICABLE: &str = "N/A";
pub const DEFAULT_BINS: usize = 10;

// ---------------------------------------------------------------------------
// StatValue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum StatValue {
    Number(f64),
    NotApplicable,
    Counts(BTreeMap<String, u64>),
    Histogram { counts: Vec<u64>, bins: Vec<f64> },
    Groups(Vec<Map<String, Value>>),
}

impl StatValue {
    pub fn is_applicable(&self) -> bool {
        !matches!(self, StatValue::NotApplicable)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StatValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl Serialize for StatValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StatValue::Number(n) => serializer.serialize_f64(*n),
            StatValue::NotApplicable => serializer.serialize_str(NOT_APPLICABLE),
            StatValue::Counts(counts) => counts.serialize(serializer),
            StatValue::Histogram { counts, bins } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("counts", counts)?;
                map.serialize_entry("bins", bins)?;
                map.end()
            }
            StatValue::Groups(groups) => groups.serialize(serializer),
        }
    }
}

impl From<Option<StatValue>> for StatValue {
    fn from(value: Option<StatValue>) -> Self {
        value.unwrap_or(StatValue::NotApplicable)
    }
}

/// Flat statistic-name → value mapping.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct DatasetStatsReport(BTreeMap<String, StatValue>);

impl DatasetStatsReport {
    pub fn get(&self, key: &str) -> Option<&StatValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StatValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, key: &str, value: impl Into<StatValue>) {
        self.0.insert(key.to_string(), value.into());
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct StatsAggregator {
    bins: usize,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self { bins: DEFAULT_BINS }
    }
}

impl StatsAggregator {
    pub fn with_bins(bins: usize) -> Self {
        Self { bins: bins.max(1) }
    }

    pub fn aggregate_file(&self, path: &Path) -> Result<DatasetStatsReport> {
        let file_size = std::fs::metadata(path)
            .with_context(|| format!("Cannot stat {}", path.display()))?
            .len();
        let table = load_table(path)?;
        Ok(self.aggregate(&table, file_size))
    }

    pub fn aggregate(&self, table: &Table, file_size: u64) -> DatasetStatsReport {
        let cols = discover_columns(&table.columns);
        let mut report = DatasetStatsReport::default();

        report.insert("row_count", StatValue::Number(table.len() as f64));
        report.insert("column_count", StatValue::Number(table.columns.len() as f64));
        report.insert("file_size", StatValue::Number(file_size as f64));

        report.insert("machine_count", distinct_count(table, cols.machine_id.as_deref()));
        report.insert("type_counts", type_counts(table, cols.product_type.as_deref()));
        report.insert(
            "type_product_counts",
            type_product_counts(table, cols.product_type.as_deref(), cols.product_id.as_deref()),
        );

        let means = [
            ("avg_air_temperature", &cols.air_temperature),
            ("avg_process_temperature", &cols.process_temperature),
            ("avg_rotational_speed", &cols.rotational_speed),
            ("avg_torque", &cols.torque),
            ("avg_tool_wear", &cols.tool_wear),
        ];
        for (key, column) in means {
            report.insert(key, mean(table, column.as_deref()));
        }

        report.insert(
            "air_temperature_histogram",
            histogram(table, cols.air_temperature.as_deref(), self.bins),
        );
        report.insert(
            "process_temperature_histogram",
            histogram(table, cols.process_temperature.as_deref(), self.bins),
        );

        let pairs = [
            ("temp_by_product_type", ("air_temp", &cols.air_temperature), ("process_temp", &cols.process_temperature)),
            ("speed_torque_by_product_type", ("rotational_speed", &cols.rotational_speed), ("torque", &cols.torque)),
            ("process_speed_by_product_type", ("process_temp", &cols.process_temperature), ("rotational_speed", &cols.rotational_speed)),
            ("wear_torque_by_product_type", ("tool_wear", &cols.tool_wear), ("torque", &cols.torque)),
        ];
        for (key, (a_name, a_col), (b_name, b_col)) in pairs {
            let value = match (a_col, b_col) {
                (Some(a), Some(b)) => grouped_sums(table, &cols, (a_name, a.as_str()), (b_name, b.as_str())),
                _ => None,
            };
            report.insert(key, value);
        }

        let missing = report.iter().filter(|(_, v)| !v.is_applicable()).count();
        log::debug!("computed {} statistics, {missing} not applicable", report.len());
        report
    }
}

/// Statistics for a file with the default settings.
pub fn aggregate_file(path: &Path) -> Result<DatasetStatsReport> {
    StatsAggregator::default().aggregate_file(path)
}

pub fn aggregate(table: &Table, file_size: u64) -> DatasetStatsReport {
    StatsAggregator::default().aggregate(table, file_size)
}

// ---------------------------------------------------------------------------
// Individual statistics
// ---------------------------------------------------------------------------

fn round2(x: f64) -> f64 {
    let scaled = x * 100.0;
    if scaled.is_finite() { scaled.round() / 100.0 } else { x }
}

fn numbers(table: &Table, column: &str) -> Vec<f64> {
    table.column(column).filter_map(CellValue::as_f64).collect()
}

fn texts<'a>(table: &'a Table, column: &'a str) -> impl Iterator<Item = Option<String>> + 'a {
    table.column(column).map(CellValue::as_text)
}

fn distinct_count(table: &Table, column: Option<&str>) -> Option<StatValue> {
    let distinct = table.unique_values(column?);
    let count = distinct.iter().filter(|v| v.as_text().is_some()).count();
    Some(StatValue::Number(count as f64))
}

fn type_counts(table: &Table, column: Option<&str>) -> Option<StatValue> {
    let column = column?;
    let mut counts = BTreeMap::new();
    for t in texts(table, column).flatten() {
        *counts.entry(t).or_insert(0u64) += 1;
    }
    (!counts.is_empty()).then_some(StatValue::Counts(counts))
}

fn type_product_counts(
    table: &Table,
    type_col: Option<&str>,
    product_col: Option<&str>,
) -> Option<StatValue> {
    let (type_col, product_col) = (type_col?, product_col?);
    let mut counts: BTreeMap<(String, String), u64> = BTreeMap::new();
    for row in &table.rows {
        let t = row.get(type_col).and_then(CellValue::as_text);
        let p = row.get(product_col).and_then(CellValue::as_text);
        if let (Some(t), Some(p)) = (t, p) {
            *counts.entry((t, p)).or_insert(0) += 1;
        }
    }
    if counts.is_empty() {
        return None;
    }
    let groups = counts
        .into_iter()
        .map(|((t, p), n)| {
            let mut m = Map::new();
            m.insert("type".into(), Value::String(t));
            m.insert("product_id".into(), Value::String(p));
            m.insert("count".into(), Value::from(n));
            m
        })
        .collect();
    Some(StatValue::Groups(groups))
}

fn mean(table: &Table, column: Option<&str>) -> Option<StatValue> {
    let values = numbers(table, column?);
    if values.is_empty() {
        return None;
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    avg.is_finite().then(|| StatValue::Number(round2(avg)))
}

/// Equal-width bins over `[min, max]`; the last bin includes `max`.
fn histogram(table: &Table, column: Option<&str>, n_bins: usize) -> Option<StatValue> {
    let values = numbers(table, column?);
    let (mut lo, mut hi) = values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    });
    if values.is_empty() {
        return None;
    }
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let width = (hi - lo) / n_bins as f64;
    // A span past f64::MAX cannot be binned.
    if !width.is_finite() || width <= 0.0 {
        log::warn!("histogram range [{lo}, {hi}] cannot be binned");
        return None;
    }
    let mut counts = vec![0u64; n_bins];
    for v in values {
        let bin = (((v - lo) / width).floor() as usize).min(n_bins - 1);
        counts[bin] += 1;
    }
    let bins = (0..=n_bins).map(|i| lo + width * i as f64).collect();
    Some(StatValue::Histogram { counts, bins })
}

/// Per (type, product) sums of two numeric columns.
fn grouped_sums(
    table: &Table,
    cols: &DiscoveredColumns,
    (a_name, a_col): (&str, &str),
    (b_name, b_col): (&str, &str),
) -> Option<StatValue> {
    let type_col = cols.product_type.as_deref()?;
    let product_col = cols.product_id.as_deref()?;

    let mut sums: BTreeMap<(String, String), (f64, f64)> = BTreeMap::new();
    for row in &table.rows {
        let key = (
            row.get(type_col).and_then(CellValue::as_text),
            row.get(product_col).and_then(CellValue::as_text),
        );
        let vals = (
            row.get(a_col).and_then(CellValue::as_f64),
            row.get(b_col).and_then(CellValue::as_f64),
        );
        if let ((Some(t), Some(p)), (Some(a), Some(b))) = (key, vals) {
            let entry = sums.entry((t, p)).or_insert((0.0, 0.0));
            entry.0 += a;
            entry.1 += b;
        }
    }
    if sums.is_empty() {
        return None;
    }

    let groups = sums
        .into_iter()
        .map(|((t, p), (a, b))| {
            let mut m = Map::new();
            m.insert("type".into(), Value::String(t));
            m.insert("product_id".into(), Value::String(p));
            m.insert(format!("{a_name}_sum"), Value::from(round2(a)));
            m.insert(format!("{b_name}_sum"), Value::from(round2(b)));
            m
        })
        .collect();
    Some(StatValue::Groups(groups))
}
