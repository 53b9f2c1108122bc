use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::filter::DEFAULT_MIN_POINTS;
use crate::error::PipelineError;

/// Isolation-forest hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

/// A named input file whose feature table gets its own score array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSource {
    pub name: String,
    pub path: PathBuf,
}

impl GroupSource {
    pub fn new(name: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            path: path.into(),
        }
    }
}

/// Everything the scoring run needs. Missing keys in a config file fall back
/// to [`PipelineConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum points per band for an API light curve to be kept.
    pub min_points: usize,
    /// Raw light-curve files (API path).
    pub light_curves: Vec<GroupSource>,
    /// Pre-extracted feature files (offline path).
    pub feature_files: Vec<GroupSource>,
    /// Group whose feature table the model is fitted on.
    pub training_group: String,
    /// Fit and save a new model instead of loading one.
    pub train_model: bool,
    pub model_path: PathBuf,
    pub scores_path: PathBuf,
    /// When set, every group's feature table is also written here as CSV.
    pub features_dir: Option<PathBuf>,
    pub forest: ForestParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_points: DEFAULT_MIN_POINTS,
            light_curves: vec![GroupSource::new("dippers", "data/light_curves.csv")],
            feature_files: vec![
                GroupSource::new("other", "data/other.parquet"),
                GroupSource::new("yso", "data/yso.parquet"),
            ],
            training_group: "dippers".to_string(),
            train_model: false,
            model_path: PathBuf::from("models/yso_dippers_model.json"),
            scores_path: PathBuf::from("data/scores.json"),
            features_dir: None,
            forest: ForestParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    /// All group names in scoring order: light-curve groups first, then
    /// feature-file groups.
    pub fn group_names(&self) -> Vec<&str> {
        self.light_curves
            .iter()
            .chain(&self.feature_files)
            .map(|g| g.name.as_str())
            .collect()
    }

    /// Group names must be unique, and a training run needs its training
    /// group to exist.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let mut seen = HashSet::new();
        for name in self.group_names() {
            if !seen.insert(name) {
                return Err(PipelineError::DuplicateGroup(name.to_string()));
            }
        }
        if self.train_model && !seen.contains(self.training_group.as_str()) {
            return Err(PipelineError::UnknownGroup(self.training_group.clone()));
        }
        Ok(())
    }
}
