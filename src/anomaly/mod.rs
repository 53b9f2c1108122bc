//! Anomaly scoring
//!
//! - `isolation_forest`: the outlier-detection ensemble
//! - `scorer`: fit-or-load of the persisted model and per-group scoring

mod isolation_forest;
pub mod scorer;

pub use isolation_forest::*;
pub use scorer::*;

use ndarray::{Array1, Array2};

use crate::error::PipelineError;

/// Trait for unsupervised multivariate outlier models
pub trait OutlierModel {
    /// Fit the model to training data (rows are samples)
    fn fit(&mut self, data: &Array2<f64>) -> Result<(), PipelineError>;

    /// Per-sample score; lower means more anomalous
    fn score_samples(&self, data: &Array2<f64>) -> Result<Array1<f64>, PipelineError>;

    /// Get the name of the model
    fn name(&self) -> &str;
}
