use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::schema::{CanonicalFeature, FeatureKind, Vocabulary};

use super::classifier::Classifier;
use super::preprocess::Preprocessor;

// ---------------------------------------------------------------------------
// On-disk files
// ---------------------------------------------------------------------------

/// Contents of `model_<ts>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub preprocessor: Preprocessor,
    pub classifier: Classifier,
}

/// Contents of `features_<ts>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureFile {
    /// Column order the preprocessor was fitted on.
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_types: BTreeMap<String, FeatureKind>,
    /// Extra header spellings per feature, tried after the built-in ones.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_mappings: BTreeMap<String, Vec<String>>,
}

// ---------------------------------------------------------------------------
// ModelArtifact – a loaded, validated (transform, classifier, features) triple
// ---------------------------------------------------------------------------

/// Immutable once built. Shared behind `Arc` by every inference call.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub version: String,
    pub preprocessor: Preprocessor,
    pub classifier: Classifier,
    /// Canonical features in fitted order.
    pub features: Vec<CanonicalFeature>,
    /// Feature names exactly as stored, parallel to `features`.
    pub feature_names: Vec<String>,
    pub vocabulary: Vocabulary,
    pub load_timestamp: DateTime<Utc>,
}

impl ModelArtifact {
    /// Validate and assemble an artifact. `origin` is only used in errors.
    pub fn from_parts(
        version: impl Into<String>,
        model: ModelFile,
        feature_file: FeatureFile,
        origin: &Path,
    ) -> Result<Self, ModelError> {
        let invalid = |reason: String| ModelError::InvalidArtifact {
            path: origin.to_path_buf(),
            reason,
        };

        if feature_file.features.is_empty() {
            return Err(invalid("empty feature list".into()));
        }

        let mut features = Vec::with_capacity(feature_file.features.len());
        for name in &feature_file.features {
            let feature = CanonicalFeature::from_name(name)
                .ok_or_else(|| invalid(format!("unsupported feature '{name}'")))?;
            if features.contains(&feature) {
                return Err(invalid(format!("feature '{name}' listed twice")));
            }
            features.push(feature);
        }

        for (name, declared) in &feature_file.feature_types {
            let feature = CanonicalFeature::from_name(name)
                .filter(|f| features.contains(f))
                .ok_or_else(|| invalid(format!("type declared for unlisted feature '{name}'")))?;
            if feature.kind() != *declared {
                return Err(invalid(format!(
                    "'{name}' declared {declared:?} but is {:?}",
                    feature.kind()
                )));
            }
        }

        let kind_of = |column: &str| {
            feature_file
                .features
                .iter()
                .position(|n| n == column)
                .map(|i| features[i].kind())
        };
        for column in &model.preprocessor.numeric {
            match kind_of(column) {
                Some(FeatureKind::Numeric) => {}
                Some(FeatureKind::Categorical) => {
                    return Err(invalid(format!("'{column}' is categorical but passed through as numeric")));
                }
                None => return Err(invalid(format!("transform reads unknown column '{column}'"))),
            }
        }
        for block in &model.preprocessor.categorical {
            match kind_of(&block.column) {
                Some(FeatureKind::Categorical) => {}
                Some(FeatureKind::Numeric) => {
                    return Err(invalid(format!("'{}' is numeric but one-hot encoded", block.column)));
                }
                None => {
                    return Err(invalid(format!("transform reads unknown column '{}'", block.column)));
                }
            }
        }

        let width = model.preprocessor.output_width();
        let fits = match &model.classifier {
            Classifier::Logistic { coefficients, .. } => coefficients.len() == width,
            Classifier::DecisionTree { .. } => model.classifier.required_width() <= width,
        };
        if !fits {
            return Err(invalid(format!(
                "classifier needs {} inputs, transform produces {width}",
                model.classifier.required_width()
            )));
        }

        let mut vocabulary = Vocabulary::new(&features);
        for (name, extra) in &feature_file.feature_mappings {
            match CanonicalFeature::from_name(name) {
                Some(f) => vocabulary.extend_variants(f, extra.iter().cloned()),
                None => log::warn!("ignoring mappings for unknown feature '{name}'"),
            }
        }

        Ok(Self {
            version: version.into(),
            preprocessor: model.preprocessor,
            classifier: model.classifier,
            features,
            feature_names: feature_file.features,
            vocabulary,
            load_timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::classifier::TreeNode;
    use crate::model::preprocess::OneHotColumn;

    fn model_file() -> ModelFile {
        ModelFile {
            preprocessor: Preprocessor {
                numeric: vec!["Torque [Nm]".into()],
                categorical: vec![OneHotColumn {
                    column: "Type".into(),
                    categories: vec!["H".into(), "L".into(), "M".into()],
                    handle_unknown: Default::default(),
                }],
            },
            classifier: Classifier::DecisionTree {
                root: TreeNode::split(0, 60.0, TreeNode::leaf(1.0, 0.0), TreeNode::leaf(0.0, 1.0)),
            },
        }
    }

    fn feature_file(names: &[&str]) -> FeatureFile {
        FeatureFile {
            features: names.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn builds_from_valid_parts() {
        let mut ff = feature_file(&["Type", "Torque [Nm]"]);
        ff.feature_mappings.insert("Torque".into(), vec!["twist".into()]);
        let a = ModelArtifact::from_parts("model_x", model_file(), ff, Path::new("m.json")).unwrap();
        assert_eq!(a.features, vec![CanonicalFeature::Type, CanonicalFeature::Torque]);
        let v = a.vocabulary.variants_of(CanonicalFeature::Torque).unwrap();
        assert_eq!(v.last().map(String::as_str), Some("twist"));
    }

    #[test]
    fn rejects_unknown_feature() {
        let err = ModelArtifact::from_parts(
            "v",
            model_file(),
            feature_file(&["Type", "Torque [Nm]", "Humidity"]),
            Path::new("m.json"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Humidity"));
    }

    #[test]
    fn rejects_transform_column_outside_feature_list() {
        let err = ModelArtifact::from_parts("v", model_file(), feature_file(&["Type"]), Path::new("m.json"))
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidArtifact { .. }));
    }

    #[test]
    fn declared_types_must_agree() {
        let mut ff = feature_file(&["Type", "Torque [Nm]"]);
        ff.feature_types.insert("Type".into(), FeatureKind::Categorical);
        ff.feature_types.insert("Torque [Nm]".into(), FeatureKind::Numeric);
        assert!(ModelArtifact::from_parts("v", model_file(), ff.clone(), Path::new("m.json")).is_ok());

        ff.feature_types.insert("Torque [Nm]".into(), FeatureKind::Categorical);
        let err = ModelArtifact::from_parts("v", model_file(), ff, Path::new("m.json")).unwrap_err();
        assert!(err.to_string().contains("'Torque [Nm]' declared Categorical"));

        let mut ff = feature_file(&["Type", "Torque [Nm]"]);
        ff.feature_types.insert("Tool wear [min]".into(), FeatureKind::Numeric);
        let err = ModelArtifact::from_parts("v", model_file(), ff, Path::new("m.json")).unwrap_err();
        assert!(err.to_string().contains("unlisted feature"));
    }

    #[test]
    fn rejects_logistic_width_mismatch() {
        let mut m = model_file();
        m.classifier = Classifier::Logistic { coefficients: vec![1.0], intercept: 0.0 };
        let err = ModelArtifact::from_parts("v", m, feature_file(&["Type", "Torque [Nm]"]), Path::new("m.json"))
            .unwrap_err();
        assert!(err.to_string().contains("transform produces 4"));
    }
}
