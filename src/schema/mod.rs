//! Schema reconciliation: map free-form headers onto the model's canonical
//! features and turn raw rows into complete feature records.
//!
//! ```text
//!   Table.columns ──► reconcile ──► ColumnMapping (+ unmatched features)
//!                                        │
//!   Row ───────────────────────► normalize_row ──► FeatureRecord
//! ```

pub mod features;
pub mod normalize;
pub mod reconcile;

pub use features::{CanonicalFeature, FeatureKind, FeatureValue, Vocabulary};
pub use normalize::{FeatureRecord, normalize_row, resolve_id_column};
pub use reconcile::{
    ColumnMapping, ColumnMatcher, NormalizedSubstringMatcher, Reconciliation, reconcile,
};
