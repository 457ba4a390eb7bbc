//! Error types for the prediction pipeline

use std::path::PathBuf;

use serde_json::{Value, json};
use thiserror::Error;

use crate::schema::CanonicalFeature;

/// Model Store / model handle failures.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("no model available in {}", .0.display())]
    NoModelAvailable(PathBuf),

    #[error("no model loaded")]
    Unavailable,

    #[error("feature list not found: {}", .0.display())]
    MissingSidecar(PathBuf),

    #[error("invalid model artifact {}: {reason}", path.display())]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Preprocessing transform rejected a record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("column '{0}' missing from input")]
    MissingColumn(String),

    #[error("column '{0}' expects a number")]
    NotNumeric(String),

    #[error("column '{0}' expects a category")]
    NotCategorical(String),

    #[error("unknown category '{value}' for column '{column}'")]
    UnknownCategory { column: String, value: String },
}

/// Classifier could not score a transformed vector.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("feature index {index} out of range for {width} inputs")]
    FeatureIndex { index: usize, width: usize },

    #[error("expected {expected} inputs, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("leaf has no samples")]
    EmptyLeaf,

    #[error("probability {0} outside [0, 1]")]
    InvalidProbability(f64),
}

/// A single record could not be scored.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("preprocessing failed: {0}")]
    Transform(#[from] TransformError),

    #[error("classifier failed: {0}")]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Prediction storage failures.
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// File-level failures of a batch run. Row-level problems never surface here.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("inference unavailable: {0}")]
    ModelUnavailable(#[from] ModelError),

    #[error("failed to process dataset: {0:#}")]
    Load(anyhow::Error),

    #[error("Missing required features: {}", join_features(.missing))]
    MissingFeatures { missing: Vec<CanonicalFeature> },

    #[error("persistence failure: {0}")]
    Persistence(#[from] RepoError),
}

impl BatchError {
    /// Structured `{error, details}` form handed to API consumers.
    pub fn to_json(&self) -> Value {
        match self {
            BatchError::MissingFeatures { missing } => json!({
                "error": "Missing required features",
                "details": missing.iter().map(|f| f.base_name()).collect::<Vec<_>>(),
            }),
            BatchError::ModelUnavailable(e) => json!({
                "error": "Model unavailable",
                "details": e.to_string(),
            }),
            BatchError::Load(e) => json!({
                "error": "Failed to process dataset",
                "details": format!("{e:#}"),
            }),
            BatchError::Persistence(e) => json!({
                "error": "Failed to store predictions",
                "details": e.to_string(),
            }),
        }
    }
}

fn join_features(features: &[CanonicalFeature]) -> String {
    features
        .iter()
        .map(|f| f.base_name())
        .collect::<Vec<_>>()
        .join(", ")
}
