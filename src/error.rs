use std::path::PathBuf;

use thiserror::Error;

/// Domain errors that callers may want to match on.
///
/// File and format failures travel as `anyhow::Error` with context attached;
/// these variants cover the conditions the pipeline itself detects.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{}: missing required column '{column}'", .file.display())]
    MissingColumn { file: PathBuf, column: String },

    #[error("model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("model was fitted on {expected} features but the input has {found}")]
    FeatureCountMismatch { expected: usize, found: usize },

    #[error("cannot fit a model on an empty feature table")]
    EmptyTrainingSet,

    #[error("model has not been fitted")]
    NotFitted,

    #[error("training data contains non-finite value at row {row}, column {column}")]
    NonFiniteInput { row: usize, column: usize },

    #[error("unknown group '{0}'")]
    UnknownGroup(String),

    #[error("group '{0}' is defined more than once")]
    DuplicateGroup(String),
}
