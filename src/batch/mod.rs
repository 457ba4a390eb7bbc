//! Batch prediction: a whole file in, one result per row out.

pub mod job;
pub mod predictor;

pub use job::{abandon_dataset, process_dataset};
pub use predictor::{BatchPredictor, BatchSummary, Prediction, RowError, RowResult};
