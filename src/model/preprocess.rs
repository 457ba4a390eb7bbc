//! Fitted column transformer: numeric passthrough followed by one-hot blocks.

use serde::{Deserialize, Serialize};

use crate::error::TransformError;
use crate::schema::FeatureValue;

/// What to do with a category the encoder was not fitted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleUnknown {
    /// Emit an all-zero block.
    #[default]
    Ignore,
    /// Reject the record.
    Error,
}

/// One-hot block for a single categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotColumn {
    pub column: String,
    /// Fitted categories; output slot order.
    pub categories: Vec<String>,
    #[serde(default)]
    pub handle_unknown: HandleUnknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    /// Columns copied through unchanged, in output order.
    #[serde(default)]
    pub numeric: Vec<String>,
    /// One-hot encoded columns, emitted after the numeric block.
    #[serde(default)]
    pub categorical: Vec<OneHotColumn>,
}

impl Preprocessor {
    /// Width of the transformed vector.
    pub fn output_width(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(|c| c.categories.len()).sum::<usize>()
    }

    /// All input columns the transform reads.
    pub fn input_columns(&self) -> impl Iterator<Item = &str> {
        self.numeric
            .iter()
            .map(String::as_str)
            .chain(self.categorical.iter().map(|c| c.column.as_str()))
    }

    /// Transform one projected record. `names` and `values` are parallel and
    /// follow the artifact's feature order.
    pub fn transform(
        &self,
        names: &[&str],
        values: &[FeatureValue],
    ) -> Result<Vec<f64>, TransformError> {
        let mut out = Vec::with_capacity(self.output_width());

        for column in &self.numeric {
            let v = lookup(names, values, column)?
                .as_f64()
                .ok_or_else(|| TransformError::NotNumeric(column.clone()))?;
            out.push(v);
        }

        for block in &self.categorical {
            let value = lookup(names, values, &block.column)?
                .as_category()
                .ok_or_else(|| TransformError::NotCategorical(block.column.clone()))?;
            let hit = block.categories.iter().position(|c| c == value);
            if hit.is_none() && block.handle_unknown == HandleUnknown::Error {
                return Err(TransformError::UnknownCategory {
                    column: block.column.clone(),
                    value: value.to_string(),
                });
            }
            out.extend((0..block.categories.len()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));
        }

        Ok(out)
    }
}

fn lookup<'a>(
    names: &[&str],
    values: &'a [FeatureValue],
    column: &str,
) -> Result<&'a FeatureValue, TransformError> {
    names
        .iter()
        .position(|n| *n == column)
        .and_then(|i| values.get(i))
        .ok_or_else(|| TransformError::MissingColumn(column.to_string()))
}
