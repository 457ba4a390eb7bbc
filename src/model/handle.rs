use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ModelError;

use super::artifact::ModelArtifact;
use super::store::ModelStore;

/// Reloadable reference to the current model.
///
/// Readers take an `Arc` snapshot; a reload swaps the whole `Arc`, so a
/// reader never sees a half-updated artifact and an in-flight batch keeps the
/// model it started with.
#[derive(Debug, Clone, Default)]
pub struct ModelHandle {
    inner: Arc<RwLock<Option<Arc<ModelArtifact>>>>,
}

impl ModelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the newest artifact from `store`, falling back to an empty
    /// handle (inference unavailable) when none can be loaded.
    pub fn from_store(store: &ModelStore) -> Self {
        let handle = Self::new();
        if let Err(e) = handle.reload(store) {
            log::error!("Model loading failed from {}: {e}", store.dir().display());
        }
        handle
    }

    pub fn current(&self) -> Result<Arc<ModelArtifact>, ModelError> {
        self.inner.read().clone().ok_or(ModelError::Unavailable)
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Install a new artifact, returning the previous one.
    pub fn replace(&self, artifact: Arc<ModelArtifact>) -> Option<Arc<ModelArtifact>> {
        self.inner.write().replace(artifact)
    }

    /// Re-read the newest artifact. On failure the current model stays.
    pub fn reload(&self, store: &ModelStore) -> Result<Arc<ModelArtifact>, ModelError> {
        let artifact = Arc::new(store.load_latest()?);
        match self.replace(Arc::clone(&artifact)) {
            Some(old) if old.version != artifact.version => {
                log::info!("Model {} replaces {}", artifact.version, old.version);
            }
            Some(_) => {}
            None => log::info!("Model {} loaded", artifact.version),
        }
        Ok(artifact)
    }
}
