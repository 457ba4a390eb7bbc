use std::collections::BTreeMap;

use serde::Serialize;

use super::features::{CanonicalFeature, Vocabulary};

// ---------------------------------------------------------------------------
// Matching policy
// ---------------------------------------------------------------------------

/// Picks the input column for one canonical feature.
///
/// `available` holds the columns not yet claimed by an earlier feature, in
/// file order. Implementations must be deterministic.
pub trait ColumnMatcher {
    fn find(&self, variants: &[String], available: &[&str]) -> Option<usize>;
}

/// Lower-case and strip everything but ASCII letters and digits.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Default policy: per variant (in priority order) an exact case-insensitive
/// hit, then a substring hit on normalized names in either direction.
/// First match wins, not best match.
///
/// Short generic variants such as `temp` or `min` can claim an unrelated
/// column when the intended one is missing. Feature order decides who gets an
/// ambiguous header first.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedSubstringMatcher;

impl ColumnMatcher for NormalizedSubstringMatcher {
    fn find(&self, variants: &[String], available: &[&str]) -> Option<usize> {
        let normalized: Vec<String> = available.iter().map(|c| normalize_name(c)).collect();

        for variant in variants {
            if let Some(i) = available
                .iter()
                .position(|col| col.trim().eq_ignore_ascii_case(variant.trim()))
            {
                return Some(i);
            }

            let nv = normalize_name(variant);
            if nv.is_empty() {
                continue;
            }
            if let Some(i) = normalized
                .iter()
                .position(|nc| !nc.is_empty() && (nc.contains(&nv) || nv.contains(nc.as_str())))
            {
                return Some(i);
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// ColumnMapping – one-to-one input column ↔ canonical feature
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnMapping {
    by_feature: BTreeMap<CanonicalFeature, String>,
    by_column: BTreeMap<String, CanonicalFeature>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a column to a feature. Returns `false` (and changes nothing) if
    /// either side is already bound.
    pub fn bind(&mut self, feature: CanonicalFeature, column: &str) -> bool {
        if self.by_feature.contains_key(&feature) || self.by_column.contains_key(column) {
            return false;
        }
        self.by_feature.insert(feature, column.to_string());
        self.by_column.insert(column.to_string(), feature);
        true
    }

    pub fn column_for(&self, feature: CanonicalFeature) -> Option<&str> {
        self.by_feature.get(&feature).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_feature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_feature.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalFeature, &str)> {
        self.by_feature.iter().map(|(f, c)| (*f, c.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub mapping: ColumnMapping,
    /// Features with no matching column, in vocabulary order.
    pub unmatched: Vec<CanonicalFeature>,
}

impl Reconciliation {
    pub fn is_complete(&self) -> bool {
        self.unmatched.is_empty()
    }
}

/// Map `columns` onto the vocabulary's features. Features are visited in
/// vocabulary order and each claimed column is removed from consideration.
pub fn reconcile(
    vocabulary: &Vocabulary,
    columns: &[String],
    matcher: &dyn ColumnMatcher,
) -> Reconciliation {
    let mut available: Vec<&str> = columns.iter().map(String::as_str).collect();
    let mut result = Reconciliation::default();

    for (feature, variants) in vocabulary.iter() {
        match matcher.find(variants, &available) {
            Some(i) if i < available.len() => {
                let column = available.remove(i);
                log::debug!("column '{column}' -> {}", feature.display_name());
                result.mapping.bind(feature, column);
            }
            _ => {
                log::warn!("no column found for feature '{feature}'");
                result.unmatched.push(feature);
            }
        }
    }

    result
}
