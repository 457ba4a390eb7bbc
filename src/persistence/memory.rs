use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::RepoError;

use super::{DatasetState, DatasetStatus, PredictionRecord, PredictionRepository};

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    paths: HashMap<i64, String>,
    states: HashMap<i64, DatasetState>,
    predictions: HashMap<i64, Arc<Vec<PredictionRecord>>>,
}

/// In-process repository. A replace swaps the dataset's whole result vector
/// under one write lock.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    inner: RwLock<Inner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PredictionRepository for MemoryRepository {
    fn register_dataset(&self, file_path: &str) -> Result<i64, RepoError> {
        let mut inner = self.inner.write();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.paths.insert(id, file_path.to_string());
        inner.states.insert(
            id,
            DatasetState { status: DatasetStatus::Uploaded, error_message: None },
        );
        Ok(id)
    }

    fn file_path(&self, dataset_id: i64) -> Result<Option<String>, RepoError> {
        Ok(self.inner.read().paths.get(&dataset_id).cloned())
    }

    fn replace_predictions(
        &self,
        dataset_id: i64,
        records: &[PredictionRecord],
    ) -> Result<(), RepoError> {
        let fresh = Arc::new(records.to_vec());
        self.inner.write().predictions.insert(dataset_id, fresh);
        Ok(())
    }

    fn predictions(&self, dataset_id: i64) -> Result<Vec<PredictionRecord>, RepoError> {
        Ok(self
            .inner
            .read()
            .predictions
            .get(&dataset_id)
            .map(|v| v.as_ref().clone())
            .unwrap_or_default())
    }

    fn set_status(
        &self,
        dataset_id: i64,
        status: DatasetStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepoError> {
        self.inner.write().states.insert(
            dataset_id,
            DatasetState { status, error_message: error_message.map(str::to_string) },
        );
        Ok(())
    }

    fn status(&self, dataset_id: i64) -> Result<Option<DatasetState>, RepoError> {
        Ok(self.inner.read().states.get(&dataset_id).cloned())
    }
}
