//! Inference engine: one feature record in, one label and confidence out.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{InferenceError, ModelError};
use crate::model::{ModelArtifact, ModelHandle};
use crate::schema::{FeatureRecord, FeatureValue};

/// Confidence at or above this is a predicted failure.
pub const FAILURE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    Normal,
    Failure,
}

impl Label {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= FAILURE_THRESHOLD {
            Label::Failure
        } else {
            Label::Normal
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Normal => "Normal",
            Label::Failure => "Failure",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Inference {
    pub label: Label,
    /// Raw probability of the failure class.
    pub confidence: f64,
}

/// Scores records against whatever model the handle currently holds.
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    handle: ModelHandle,
}

impl InferenceEngine {
    pub fn new(handle: ModelHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &ModelHandle {
        &self.handle
    }

    /// The model a whole batch is scored with. A reload after this call
    /// does not affect the returned artifact.
    pub fn snapshot(&self) -> Result<Arc<ModelArtifact>, ModelError> {
        self.handle.current()
    }

    /// Project onto the artifact's feature order, transform, classify.
    pub fn infer_with(
        artifact: &ModelArtifact,
        record: &FeatureRecord,
    ) -> Result<Inference, InferenceError> {
        let names: Vec<&str> = artifact.feature_names.iter().map(String::as_str).collect();
        let values: Vec<FeatureValue> = artifact
            .features
            .iter()
            .map(|f| record.get(*f).cloned().unwrap_or_else(|| f.default_value()))
            .collect();

        let x = artifact.preprocessor.transform(&names, &values)?;
        let confidence = artifact.classifier.predict_failure_proba(&x)?;

        Ok(Inference {
            label: Label::from_confidence(confidence),
            confidence,
        })
    }
}
