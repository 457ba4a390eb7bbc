use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ---------------------------------------------------------------------------
// CellValue – a single cell of an uploaded dataset
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common Pandas dtypes.
/// Grouped statistics key `BTreeMap`s on it, so `CellValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so we can put CellValue in BTreeSet --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => write!(f, ""),
        }
    }
}

impl CellValue {
    /// Guess the type of a raw text cell (CSV).
    pub fn guess(s: &str) -> CellValue {
        let s = s.trim();
        if s.is_empty() {
            return CellValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return CellValue::Float(f);
        }
        if s == "true" || s == "false" {
            return CellValue::Bool(s == "true");
        }
        CellValue::String(s.to_string())
    }

    /// Numeric interpretation; numeric text counts, non-finite values do not.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            CellValue::Float(v) => *v,
            CellValue::Integer(i) => *i as f64,
            CellValue::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        v.is_finite().then_some(v)
    }

    /// Text interpretation for categorical/key columns. `None` for nulls and
    /// blank strings.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::String(s) => {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            other => Some(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

// ---------------------------------------------------------------------------
// Row – one record of the uploaded file
// ---------------------------------------------------------------------------

/// A single input row.
#[derive(Debug, Clone)]
pub struct Row {
    /// 0-based position in the file (data rows only).
    pub index: usize,
    /// column_name → value. Columns absent from a short record are `Null`.
    pub values: BTreeMap<String, CellValue>,
    /// Set when the reader could not decode this record.
    pub defect: Option<String>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.values.get(column)
    }
}

// ---------------------------------------------------------------------------
// Table – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The full parsed dataset.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Column names in file order, unique.
    pub columns: Vec<String>,
    /// All rows in file order.
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate one column's values in row order (`Null` where missing).
    pub fn column<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a CellValue> + 'a {
        const NULL: &CellValue = &CellValue::Null;
        self.rows.iter().map(move |r| r.values.get(name).unwrap_or(NULL))
    }

    /// Sorted set of distinct non-null values in a column.
    pub fn unique_values(&self, name: &str) -> BTreeSet<CellValue> {
        self.column(name).filter(|v| !v.is_null()).cloned().collect()
    }
}

/// Make header names unique the way Pandas does: `a`, `a.1`, `a.2`, ...
pub fn dedupe_headers(raw: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut out = Vec::new();
    for name in raw {
        let mut candidate = name.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{name}.{n}");
            n += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guess_types() {
        assert_eq!(CellValue::guess(""), CellValue::Null);
        assert_eq!(CellValue::guess(" 42 "), CellValue::Integer(42));
        assert_eq!(CellValue::guess("298.1"), CellValue::Float(298.1));
        assert_eq!(CellValue::guess("true"), CellValue::Bool(true));
        assert_eq!(CellValue::guess("L"), CellValue::String("L".into()));
    }

    #[test]
    fn numeric_text_and_non_finite() {
        assert_eq!(CellValue::String(" 1.5 ".into()).as_f64(), Some(1.5));
        assert_eq!(CellValue::Float(f64::NAN).as_f64(), None);
        assert_eq!(CellValue::String("inf".into()).as_f64(), None);
        assert_eq!(CellValue::Bool(true).as_f64(), None);
    }

    #[test]
    fn duplicate_headers_get_suffixes() {
        let cols = dedupe_headers(["a", "b", "a", "a"].map(String::from));
        assert_eq!(cols, vec!["a", "b", "a.1", "a.2"]);
    }

    #[test]
    fn column_fills_missing_with_null() {
        let mut values = BTreeMap::new();
        values.insert("x".to_string(), CellValue::Integer(1));
        let rows = vec![
            Row { index: 0, values, defect: None },
            Row { index: 1, values: BTreeMap::new(), defect: None },
        ];
        let t = Table::new(vec!["x".into()], rows);
        let col: Vec<_> = t.column("x").cloned().collect();
        assert_eq!(col, vec![CellValue::Integer(1), CellValue::Null]);
    }
}
