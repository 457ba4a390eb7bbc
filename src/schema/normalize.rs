use serde::Serialize;
use serde_json::{Map, Value};

use crate::data::{CellValue, Row};

use super::features::{CanonicalFeature, FeatureKind, FeatureValue, Vocabulary};
use super::reconcile::ColumnMapping;

/// Identifier columns, highest priority first. Matched exactly.
pub const ID_COLUMNS: &[&str] = &[
    "Product ID", "ProductID", "product_id", "product id", "product-id", "id", "ID",
];

/// One row's resolved canonical values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecord {
    pub row_id: String,
    /// One entry per vocabulary feature, in vocabulary order.
    pub values: Vec<(CanonicalFeature, FeatureValue)>,
    /// Features that fell back to their default for this row.
    pub defaulted: Vec<CanonicalFeature>,
}

impl FeatureRecord {
    pub fn get(&self, feature: CanonicalFeature) -> Option<&FeatureValue> {
        self.values.iter().find(|(f, _)| *f == feature).map(|(_, v)| v)
    }

    /// JSON object keyed by display names, plus `Product ID`.
    pub fn snapshot(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("Product ID".to_string(), Value::String(self.row_id.clone()));
        for (feature, value) in &self.values {
            let v = match value {
                FeatureValue::Number(n) => serde_json::Number::from_f64(*n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                FeatureValue::Category(s) => Value::String(s.clone()),
            };
            obj.insert(feature.display_name().to_string(), v);
        }
        Value::Object(obj)
    }
}

/// Pick the identifier column for a file, if any.
pub fn resolve_id_column(columns: &[String]) -> Option<&str> {
    ID_COLUMNS
        .iter()
        .find_map(|id| columns.iter().find(|c| c.as_str() == *id))
        .map(String::as_str)
}

/// Build a complete record for one row. Never fails: missing or unusable
/// values take the feature default.
pub fn normalize_row(
    row: &Row,
    mapping: &ColumnMapping,
    vocabulary: &Vocabulary,
    id_column: Option<&str>,
) -> FeatureRecord {
    let row_id = id_column
        .and_then(|c| row.get(c))
        .and_then(CellValue::as_text)
        .unwrap_or_else(|| synthetic_row_id(row.index));

    let mut values = Vec::with_capacity(vocabulary.len());
    let mut defaulted = Vec::new();

    for feature in vocabulary.features() {
        let raw = mapping.column_for(feature).and_then(|c| row.get(c));
        match raw.and_then(|cell| parse_cell(feature, cell)) {
            Some(value) => values.push((feature, value)),
            None => {
                defaulted.push(feature);
                values.push((feature, feature.default_value()));
            }
        }
    }

    FeatureRecord { row_id, values, defaulted }
}

/// `ROW_<n>` with a 1-based `n`.
pub fn synthetic_row_id(index: usize) -> String {
    format!("ROW_{}", index + 1)
}

fn parse_cell(feature: CanonicalFeature, cell: &CellValue) -> Option<FeatureValue> {
    match feature.kind() {
        FeatureKind::Numeric => cell.as_f64().map(FeatureValue::Number),
        FeatureKind::Categorical => match cell {
            CellValue::Bool(_) => None,
            other => other.as_text().map(FeatureValue::Category),
        },
    }
}
