//! Prediction storage.
//!
//! The pipeline only needs two guarantees from a store: a dataset's
//! predictions are replaced all at once, and its status can be set to a
//! terminal value with an optional message.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::batch::RowResult;
use crate::error::RepoError;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

/// Stored value of `prediction` for rows that could not be scored.
pub const ERROR_PREDICTION: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetStatus {
    Uploaded,
    Processing,
    Processed,
    Error,
}

impl DatasetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DatasetStatus::Uploaded => "uploaded",
            DatasetStatus::Processing => "processing",
            DatasetStatus::Processed => "processed",
            DatasetStatus::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DatasetStatus::Processed | DatasetStatus::Error)
    }
}

impl fmt::Display for DatasetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(DatasetStatus::Uploaded),
            "processing" => Ok(DatasetStatus::Processing),
            "processed" => Ok(DatasetStatus::Processed),
            "error" => Ok(DatasetStatus::Error),
            other => Err(format!("unknown dataset status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetState {
    pub status: DatasetStatus,
    pub error_message: Option<String>,
}

/// Persisted form of one row result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub product_id: String,
    /// `Normal`, `Failure`, or `error`.
    pub prediction: String,
    pub confidence: Option<f64>,
    pub features: Value,
    pub error: Option<String>,
}

impl From<&RowResult> for PredictionRecord {
    fn from(result: &RowResult) -> Self {
        match result {
            Ok(p) => PredictionRecord {
                product_id: p.row_id.clone(),
                prediction: p.label.to_string(),
                confidence: Some(p.confidence),
                features: p.features.snapshot(),
                error: None,
            },
            Err(e) => PredictionRecord {
                product_id: e.row_id.clone(),
                prediction: ERROR_PREDICTION.to_string(),
                confidence: None,
                features: Value::Object(Default::default()),
                error: Some(e.message.clone()),
            },
        }
    }
}

impl PredictionRecord {
    pub fn is_error(&self) -> bool {
        self.prediction == ERROR_PREDICTION
    }
}

/// Storage collaborator for batch results and dataset status.
pub trait PredictionRepository: Send + Sync {
    /// Register a dataset file; it starts `uploaded`.
    fn register_dataset(&self, file_path: &str) -> Result<i64, RepoError>;

    /// Path recorded at registration; `None` for unknown datasets.
    fn file_path(&self, dataset_id: i64) -> Result<Option<String>, RepoError>;

    /// Replace every stored prediction of a dataset in one step. Readers see
    /// either the old set or the new set, never a mix or an empty gap.
    fn replace_predictions(
        &self,
        dataset_id: i64,
        records: &[PredictionRecord],
    ) -> Result<(), RepoError>;

    fn predictions(&self, dataset_id: i64) -> Result<Vec<PredictionRecord>, RepoError>;

    fn set_status(
        &self,
        dataset_id: i64,
        status: DatasetStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepoError>;

    fn status(&self, dataset_id: i64) -> Result<Option<DatasetState>, RepoError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{Prediction, RowError};
    use crate::inference::Label;
    use crate::schema::FeatureRecord;

    #[test]
    fn status_round_trips_through_text() {
        for s in [
            DatasetStatus::Uploaded,
            DatasetStatus::Processing,
            DatasetStatus::Processed,
            DatasetStatus::Error,
        ] {
            assert_eq!(s.as_str().parse::<DatasetStatus>().unwrap(), s);
        }
        assert!("done".parse::<DatasetStatus>().is_err());
        assert!(!DatasetStatus::Processing.is_terminal());
    }

    #[test]
    fn records_from_results() {
        let ok: RowResult = Ok(Prediction {
            row_id: "L1".into(),
            label: Label::Failure,
            confidence: 0.9,
            features: FeatureRecord { row_id: "L1".into(), values: vec![], defaulted: vec![] },
        });
        let rec = PredictionRecord::from(&ok);
        assert_eq!(rec.prediction, "Failure");
        assert_eq!(rec.features["Product ID"], "L1");

        let err: RowResult = Err(RowError { row_id: "ROW_2".into(), message: "bad".into() });
        let rec = PredictionRecord::from(&err);
        assert!(rec.is_error());
        assert_eq!(rec.confidence, None);
        assert_eq!(rec.error.as_deref(), Some("bad"));
    }
}
