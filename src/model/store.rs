use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::error::ModelError;

use super::artifact::{FeatureFile, ModelArtifact, ModelFile};

const MODEL_PREFIX: &str = "model_";
const FEATURES_PREFIX: &str = "features_";
const EXT: &str = "json";

/// `%Y%m%d_%H%M%S`, so lexicographic order is chronological.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Summary of the newest model, for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_version: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub features: Vec<String>,
    pub status: &'static str,
}

/// Directory of timestamped `model_<ts>.json` / `features_<ts>.json` pairs.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn model_path(&self, timestamp: &str) -> PathBuf {
        self.dir.join(format!("{MODEL_PREFIX}{timestamp}.{EXT}"))
    }

    fn features_path(&self, timestamp: &str) -> PathBuf {
        self.dir.join(format!("{FEATURES_PREFIX}{timestamp}.{EXT}"))
    }

    /// Timestamps of all model files, oldest first.
    pub fn timestamps(&self) -> Result<Vec<String>, ModelError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ModelError::NoModelAvailable(self.dir.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut stamps = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(ts) = name
                .strip_prefix(MODEL_PREFIX)
                .and_then(|rest| rest.strip_suffix(&format!(".{EXT}")))
            {
                if !ts.is_empty() {
                    stamps.push(ts.to_string());
                }
            }
        }
        stamps.sort();
        Ok(stamps)
    }

    /// Newest timestamp, or `NoModelAvailable` for an empty directory.
    pub fn latest_timestamp(&self) -> Result<String, ModelError> {
        self.timestamps()?
            .pop()
            .ok_or_else(|| ModelError::NoModelAvailable(self.dir.clone()))
    }

    pub fn load_latest(&self) -> Result<ModelArtifact, ModelError> {
        let ts = self.latest_timestamp()?;
        self.load(&ts)
    }

    /// Load one specific artifact pair.
    pub fn load(&self, timestamp: &str) -> Result<ModelArtifact, ModelError> {
        let model_path = self.model_path(timestamp);
        let features_path = self.features_path(timestamp);
        log::info!("Loading model: {}", model_path.display());

        if !features_path.exists() {
            log::error!("feature list missing for {}", model_path.display());
            return Err(ModelError::MissingSidecar(features_path));
        }

        let model: ModelFile = serde_json::from_slice(&fs::read(&model_path)?)?;
        let features: FeatureFile = serde_json::from_slice(&fs::read(&features_path)?)?;

        let artifact = ModelArtifact::from_parts(
            format!("{MODEL_PREFIX}{timestamp}"),
            model,
            features,
            &model_path,
        )?;
        log::info!(
            "Model {} ready ({} features)",
            artifact.version,
            artifact.features.len()
        );
        Ok(artifact)
    }

    pub fn model_info(&self) -> Result<ModelInfo, ModelError> {
        let ts = self.latest_timestamp()?;
        let model_path = self.model_path(&ts);
        let last_modified = fs::metadata(&model_path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        let features_path = self.features_path(&ts);
        if !features_path.exists() {
            return Err(ModelError::MissingSidecar(features_path));
        }
        let features: FeatureFile = serde_json::from_slice(&fs::read(&features_path)?)?;

        Ok(ModelInfo {
            model_version: format!("{MODEL_PREFIX}{ts}"),
            last_modified,
            features: features.features,
            status: "operational",
        })
    }

    /// Write an artifact pair. Training tools and tests use this; the
    /// pipeline itself only reads.
    pub fn write_artifact(
        &self,
        timestamp: &str,
        model: &ModelFile,
        features: &FeatureFile,
    ) -> Result<(PathBuf, PathBuf), ModelError> {
        fs::create_dir_all(&self.dir)?;
        let model_path = self.model_path(timestamp);
        let features_path = self.features_path(timestamp);
        fs::write(&model_path, serde_json::to_vec_pretty(model)?)?;
        fs::write(&features_path, serde_json::to_vec_pretty(features)?)?;
        Ok((model_path, features_path))
    }
}
