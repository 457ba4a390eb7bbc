//! Model artifacts: the fitted preprocessing transform, the classifier, and
//! the ordered feature list, plus the store that finds the newest one and
//! the handle that shares it.

pub mod artifact;
pub mod classifier;
pub mod handle;
pub mod preprocess;
pub mod store;

pub use artifact::{FeatureFile, ModelArtifact, ModelFile};
pub use classifier::{Classifier, TreeNode};
pub use handle::ModelHandle;
pub use preprocess::{HandleUnknown, OneHotColumn, Preprocessor};
pub use store::{ModelInfo, ModelStore, timestamp_now};
