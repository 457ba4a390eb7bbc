use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::data::{Table, load_table};
use crate::error::BatchError;
use crate::inference::{InferenceEngine, Label};
use crate::model::{ModelArtifact, ModelHandle};
use crate::schema::{
    ColumnMatcher, FeatureRecord, NormalizedSubstringMatcher, normalize_row, reconcile,
    resolve_id_column,
};
use crate::schema::normalize::synthetic_row_id;

/// A scored row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub row_id: String,
    pub label: Label,
    pub confidence: f64,
    pub features: FeatureRecord,
}

/// A row that could not be scored. Never aborts the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub row_id: String,
    pub message: String,
}

pub type RowResult = Result<Prediction, RowError>;

/// Scores whole files against the current model.
pub struct BatchPredictor {
    engine: InferenceEngine,
    matcher: Box<dyn ColumnMatcher + Send + Sync>,
}

impl BatchPredictor {
    pub fn new(handle: ModelHandle) -> Self {
        Self {
            engine: InferenceEngine::new(handle),
            matcher: Box::new(NormalizedSubstringMatcher),
        }
    }

    pub fn with_matcher(mut self, matcher: impl ColumnMatcher + Send + Sync + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn handle(&self) -> &ModelHandle {
        self.engine.handle()
    }

    /// One result per data row, in file order.
    ///
    /// File-level problems (no model, unreadable file, missing canonical
    /// features) are errors; anything wrong with a single row becomes that
    /// row's `RowError`.
    pub fn predict_file(&self, path: &Path) -> Result<Vec<RowResult>, BatchError> {
        let artifact = self.snapshot()?;
        let table = load_table(path).map_err(BatchError::Load)?;
        log::info!("Scoring {} rows from {}", table.len(), path.display());
        self.predict_table(&artifact, &table)
    }

    /// The model every row of the next batch will use.
    pub fn snapshot(&self) -> Result<Arc<ModelArtifact>, BatchError> {
        Ok(self.engine.snapshot()?)
    }

    pub fn predict_table(
        &self,
        artifact: &ModelArtifact,
        table: &Table,
    ) -> Result<Vec<RowResult>, BatchError> {
        let reconciliation = reconcile(&artifact.vocabulary, &table.columns, self.matcher.as_ref());
        if !reconciliation.is_complete() {
            return Err(BatchError::MissingFeatures {
                missing: reconciliation.unmatched,
            });
        }

        let id_column = resolve_id_column(&table.columns);
        if id_column.is_none() {
            log::warn!("No identifier column found; using row numbers");
        }

        let results = table
            .rows
            .iter()
            .map(|row| {
                if let Some(defect) = &row.defect {
                    return Err(RowError {
                        row_id: synthetic_row_id(row.index),
                        message: defect.clone(),
                    });
                }
                let record = normalize_row(row, &reconciliation.mapping, &artifact.vocabulary, id_column);
                match InferenceEngine::infer_with(artifact, &record) {
                    Ok(inference) => Ok(Prediction {
                        row_id: record.row_id.clone(),
                        label: inference.label,
                        confidence: inference.confidence,
                        features: record,
                    }),
                    Err(e) => {
                        log::debug!("row {} failed: {e}", record.row_id);
                        Err(RowError {
                            row_id: record.row_id,
                            message: e.to_string(),
                        })
                    }
                }
            })
            .collect();

        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// BatchSummary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Rows labelled `Failure`.
    pub failures: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[RowResult]) -> Self {
        let mut summary = BatchSummary {
            total: results.len(),
            ..Default::default()
        };
        for r in results {
            match r {
                Ok(p) => {
                    summary.succeeded += 1;
                    if p.label == Label::Failure {
                        summary.failures += 1;
                    }
                }
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CellValue, Row};
    use crate::error::ModelError;
    use crate::model::{
        Classifier, FeatureFile, HandleUnknown, ModelFile, OneHotColumn, Preprocessor, TreeNode,
    };
    use crate::schema::CanonicalFeature;
    use std::collections::BTreeMap;

    fn artifact() -> ModelArtifact {
        let model = ModelFile {
            preprocessor: Preprocessor {
                numeric: vec!["Torque [Nm]".into()],
                categorical: vec![OneHotColumn {
                    column: "Type".into(),
                    categories: vec!["H".into(), "L".into(), "M".into()],
                    handle_unknown: HandleUnknown::Error,
                }],
            },
            classifier: Classifier::DecisionTree {
                root: TreeNode::split(0, 50.0, TreeNode::leaf(3.0, 1.0), TreeNode::leaf(1.0, 3.0)),
            },
        };
        let features = FeatureFile {
            features: vec!["Type".into(), "Torque [Nm]".into()],
            ..Default::default()
        };
        ModelArtifact::from_parts("model_t", model, features, Path::new("model_t.json")).unwrap()
    }

    fn row(index: usize, cells: &[(&str, &str)]) -> Row {
        let values: BTreeMap<String, CellValue> = cells
            .iter()
            .map(|(k, v)| (k.to_string(), CellValue::guess(v)))
            .collect();
        Row { index, values, defect: None }
    }

    fn table(rows: Vec<Row>) -> Table {
        Table::new(vec!["id".into(), "type".into(), "torque_nm".into()], rows)
    }

    #[test]
    fn one_result_per_row_in_order() {
        let t = table(vec![
            row(0, &[("id", "A"), ("type", "L"), ("torque_nm", "20")]),
            row(1, &[("id", "B"), ("type", "Z"), ("torque_nm", "20")]),
            row(2, &[("id", "C"), ("type", "M"), ("torque_nm", "70")]),
        ]);
        let p = BatchPredictor::new(ModelHandle::new());
        let out = p.predict_table(&artifact(), &t).unwrap();

        let ids: Vec<&str> = out
            .iter()
            .map(|r| match r {
                Ok(p) => p.row_id.as_str(),
                Err(e) => e.row_id.as_str(),
            })
            .collect();
        assert_eq!(ids, ["A", "B", "C"]);
        assert_eq!(out[0].as_ref().unwrap().label, Label::Normal);
        assert!(out[1].as_ref().unwrap_err().message.contains("'Z'"));
        assert_eq!(out[2].as_ref().unwrap().confidence, 0.75);

        let s = BatchSummary::from_results(&out);
        assert_eq!((s.total, s.succeeded, s.failed, s.failures), (3, 2, 1, 1));
    }

    #[test]
    fn defect_row_is_a_row_error() {
        let mut bad = row(1, &[]);
        bad.defect = Some("unequal lengths".into());
        let t = table(vec![row(0, &[("id", "A"), ("type", "L"), ("torque_nm", "1")]), bad]);
        let out = BatchPredictor::new(ModelHandle::new())
            .predict_table(&artifact(), &t)
            .unwrap();
        let err = out[1].as_ref().unwrap_err();
        assert_eq!(err.row_id, "ROW_2");
    }

    #[test]
    fn missing_features_fail_the_file() {
        let t = Table::new(vec!["type".into()], vec![row(0, &[("type", "L")])]);
        let err = BatchPredictor::new(ModelHandle::new())
            .predict_table(&artifact(), &t)
            .unwrap_err();
        match err {
            BatchError::MissingFeatures { missing } => {
                assert_eq!(missing, vec![CanonicalFeature::Torque]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn no_model_is_unavailable() {
        let p = BatchPredictor::new(ModelHandle::new());
        let err = p.predict_file(Path::new("does-not-matter.csv")).unwrap_err();
        assert!(matches!(err, BatchError::ModelUnavailable(ModelError::Unavailable)));
    }
}
