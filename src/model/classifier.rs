//! Fitted binary classifiers scoring the probability of the failure class.

use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Internal node: `x[feature] <= threshold` goes left.
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    /// Leaf with per-class sample counts `[normal, failure]`.
    Leaf { class_counts: [f64; 2] },
}

impl TreeNode {
    pub fn leaf(normal: f64, failure: f64) -> Self {
        TreeNode::Leaf { class_counts: [normal, failure] }
    }

    pub fn split(feature: usize, threshold: f64, left: TreeNode, right: TreeNode) -> Self {
        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Largest feature index referenced by any split.
    pub fn max_feature(&self) -> Option<usize> {
        match self {
            TreeNode::Leaf { .. } => None,
            TreeNode::Split { feature, left, right, .. } => {
                [Some(*feature), left.max_feature(), right.max_feature()]
                    .into_iter()
                    .flatten()
                    .max()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    DecisionTree { root: TreeNode },
    Logistic { coefficients: Vec<f64>, intercept: f64 },
}

impl Classifier {
    /// Probability of the failure class for one transformed vector.
    pub fn predict_failure_proba(&self, x: &[f64]) -> Result<f64, ClassifierError> {
        let p = match self {
            Classifier::DecisionTree { root } => traverse(root, x)?,
            Classifier::Logistic { coefficients, intercept } => {
                if coefficients.len() != x.len() {
                    return Err(ClassifierError::WidthMismatch {
                        expected: coefficients.len(),
                        actual: x.len(),
                    });
                }
                let z: f64 = intercept + coefficients.iter().zip(x).map(|(w, v)| w * v).sum::<f64>();
                sigmoid(z)
            }
        };

        if !(0.0..=1.0).contains(&p) {
            return Err(ClassifierError::InvalidProbability(p));
        }
        Ok(p)
    }

    /// Minimum input width this classifier can score.
    pub fn required_width(&self) -> usize {
        match self {
            Classifier::DecisionTree { root } => root.max_feature().map_or(0, |f| f + 1),
            Classifier::Logistic { coefficients, .. } => coefficients.len(),
        }
    }
}

fn traverse(root: &TreeNode, x: &[f64]) -> Result<f64, ClassifierError> {
    let mut node = root;
    loop {
        match node {
            TreeNode::Split { feature, threshold, left, right } => {
                let v = x.get(*feature).ok_or(ClassifierError::FeatureIndex {
                    index: *feature,
                    width: x.len(),
                })?;
                node = if *v <= *threshold { left } else { right };
            }
            TreeNode::Leaf { class_counts: [normal, failure] } => {
                let total = normal + failure;
                if !(total > 0.0) {
                    return Err(ClassifierError::EmptyLeaf);
                }
                return Ok(failure / total);
            }
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Classifier {
        Classifier::DecisionTree {
            root: TreeNode::split(0, 50.0, TreeNode::leaf(9.0, 1.0), TreeNode::leaf(1.0, 3.0)),
        }
    }

    #[test]
    fn tree_routes_on_threshold() {
        let c = stump();
        assert_eq!(c.predict_failure_proba(&[50.0]).unwrap(), 0.1);
        assert_eq!(c.predict_failure_proba(&[50.1]).unwrap(), 0.75);
        assert_eq!(c.required_width(), 1);
    }

    #[test]
    fn tree_reports_short_input_and_empty_leaf() {
        let c = stump();
        assert_eq!(
            c.predict_failure_proba(&[]).unwrap_err(),
            ClassifierError::FeatureIndex { index: 0, width: 0 }
        );
        let empty = Classifier::DecisionTree { root: TreeNode::leaf(0.0, 0.0) };
        assert_eq!(empty.predict_failure_proba(&[1.0]).unwrap_err(), ClassifierError::EmptyLeaf);
    }

    #[test]
    fn logistic_scores_and_checks_width() {
        let c = Classifier::Logistic { coefficients: vec![1.0, -1.0], intercept: 0.0 };
        assert_eq!(c.predict_failure_proba(&[2.0, 2.0]).unwrap(), 0.5);
        assert!(c.predict_failure_proba(&[5.0, 0.0]).unwrap() > 0.99);
        assert!(matches!(
            c.predict_failure_proba(&[1.0]),
            Err(ClassifierError::WidthMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn json_shape() {
        let json = r#"{
            "kind": "decision_tree",
            "root": {
                "feature": 1, "threshold": 0.5,
                "left": {"class_counts": [10, 0]},
                "right": {"class_counts": [2, 8]}
            }
        }"#;
        let c: Classifier = serde_json::from_str(json).unwrap();
        assert_eq!(c.required_width(), 2);
        assert_eq!(c.predict_failure_proba(&[0.0, 1.0]).unwrap(), 0.8);
    }
}
