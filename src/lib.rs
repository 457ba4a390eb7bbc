//! Failure prediction for industrial sensor datasets whose headers do not
//! follow one fixed schema.
//!
//! ```text
//!  file ──► data::load_table ──► schema::reconcile ──► schema::normalize_row
//!                                                            │
//!  model::ModelStore ──► model::ModelHandle ──► inference::InferenceEngine
//!                                                            │
//!                        batch::BatchPredictor ◄─────────────┘
//!                                │
//!                  persistence::PredictionRepository
//! ```

pub mod batch;
pub mod config;
pub mod data;
pub mod error;
pub mod inference;
pub mod model;
pub mod persistence;
pub mod schema;
pub mod stats;
