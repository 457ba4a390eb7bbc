use std::path::Path;

use crate::data::load_table;
use crate::error::{BatchError, RepoError};
use crate::persistence::{DatasetStatus, PredictionRecord, PredictionRepository};

use super::predictor::{BatchPredictor, BatchSummary};

/// Score a stored dataset and record the outcome.
///
/// Without a model nothing is touched and the dataset keeps its status.
/// Otherwise the dataset moves to `processing`, then to `processed` with a
/// fresh prediction set, or to `error` carrying the failure message. A rerun
/// replaces earlier predictions instead of appending to them.
pub fn process_dataset(
    dataset_id: i64,
    path: &Path,
    predictor: &BatchPredictor,
    repo: &dyn PredictionRepository,
) -> Result<BatchSummary, BatchError> {
    let artifact = predictor.snapshot()?;

    repo.set_status(dataset_id, DatasetStatus::Processing, None)?;
    log::info!("Processing dataset {dataset_id} with {}", artifact.version);

    let outcome = load_table(path)
        .map_err(BatchError::Load)
        .and_then(|table| predictor.predict_table(&artifact, &table))
        .and_then(|results| {
            let records: Vec<PredictionRecord> = results.iter().map(PredictionRecord::from).collect();
            repo.replace_predictions(dataset_id, &records)?;
            repo.set_status(dataset_id, DatasetStatus::Processed, None)?;
            Ok(BatchSummary::from_results(&results))
        });

    match outcome {
        Ok(summary) => {
            log::info!(
                "Dataset {dataset_id}: {} rows, {} errors, {} predicted failures",
                summary.total,
                summary.failed,
                summary.failures
            );
            Ok(summary)
        }
        Err(e) => {
            let message = e.to_string();
            log::error!("Dataset {dataset_id} failed: {message}");
            if let Err(status_err) = repo.set_status(dataset_id, DatasetStatus::Error, Some(&message)) {
                log::error!("Could not record failure of dataset {dataset_id}: {status_err}");
            }
            Err(e)
        }
    }
}

/// Move a dataset whose job died without reporting to `error`. A dataset
/// that already reached `processed` or `error` is left alone. Returns
/// whether the status was changed.
pub fn abandon_dataset(
    dataset_id: i64,
    repo: &dyn PredictionRepository,
    message: &str,
) -> Result<bool, RepoError> {
    let finished = repo
        .status(dataset_id)?
        .is_some_and(|state| state.status.is_terminal());
    if finished {
        return Ok(false);
    }
    repo.set_status(dataset_id, DatasetStatus::Error, Some(message))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryRepository;

    #[test]
    fn abandoned_processing_becomes_error() {
        let repo = MemoryRepository::new();
        let id = repo.register_dataset("a.csv").unwrap();
        repo.set_status(id, DatasetStatus::Processing, None).unwrap();

        assert!(abandon_dataset(id, &repo, "worker panicked").unwrap());
        let state = repo.status(id).unwrap().unwrap();
        assert_eq!(state.status, DatasetStatus::Error);
        assert_eq!(state.error_message.as_deref(), Some("worker panicked"));
    }

    #[test]
    fn finished_dataset_is_not_overwritten() {
        let repo = MemoryRepository::new();
        let id = repo.register_dataset("a.csv").unwrap();
        repo.set_status(id, DatasetStatus::Processed, None).unwrap();

        assert!(!abandon_dataset(id, &repo, "worker panicked").unwrap());
        assert_eq!(repo.status(id).unwrap().unwrap().status, DatasetStatus::Processed);
    }
}
