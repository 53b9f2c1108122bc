use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use super::{IsolationForest, OutlierModel};
use crate::config::ForestParams;
use crate::error::PipelineError;
use crate::features::FeatureTable;

// ---------------------------------------------------------------------------
// Model persistence
// ---------------------------------------------------------------------------

/// Fit a new forest on the statistic columns of `training`.
pub fn fit_model(training: &FeatureTable, params: &ForestParams) -> Result<IsolationForest> {
    if training.is_empty() {
        return Err(PipelineError::EmptyTrainingSet.into());
    }
    let mut forest = IsolationForest::from_params(params);
    forest
        .fit(&training.to_matrix())
        .context("fitting isolation forest")?;
    info!(
        "fitted {} trees on {} rows × {} features",
        forest.n_estimators,
        training.len(),
        training.n_features()
    );
    Ok(forest)
}

/// Write a fitted model as JSON, creating parent directories as needed.
pub fn save_model(model: &IsolationForest, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path)
        .with_context(|| format!("creating model file {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), model).context("serializing model")?;
    info!("saved model to {}", path.display());
    Ok(())
}

/// Read a model written by [`save_model`]. A missing file is a
/// [`PipelineError::ModelNotFound`].
pub fn load_model(path: &Path) -> Result<IsolationForest> {
    if !path.is_file() {
        return Err(PipelineError::ModelNotFound(path.to_path_buf()).into());
    }
    let file = File::open(path).with_context(|| format!("opening model file {}", path.display()))?;
    let model: IsolationForest = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing model file {}", path.display()))?;
    info!(
        "loaded model from {} ({} features)",
        path.display(),
        model.n_features()
    );
    Ok(model)
}

/// In training mode fit on `training` and persist to `model_path`; otherwise
/// load the model stored there.
pub fn fit_or_load(
    train: bool,
    model_path: &Path,
    training: Option<&FeatureTable>,
    params: &ForestParams,
) -> Result<IsolationForest> {
    if !train {
        return load_model(model_path);
    }
    let training = training.ok_or(PipelineError::EmptyTrainingSet)?;
    let model = fit_model(training, params)?;
    save_model(&model, model_path)?;
    Ok(model)
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
            .with_context(|| format!("creating directory {}", dir.display())),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// Named score arrays. Each array is aligned with the row order of the
/// feature table it was computed from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreTable {
    groups: BTreeMap<String, Vec<f64>>,
}

impl ScoreTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, group: impl Into<String>, scores: Vec<f64>) {
        self.groups.insert(group.into(), scores);
    }

    pub fn get(&self, group: &str) -> Option<&[f64]> {
        self.groups.get(group).map(Vec::as_slice)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Persist as a single JSON object `{ group: [score, ...] }`.
    pub fn save(&self, path: &Path) -> Result<()> {
        ensure_parent(path)?;
        let file =
            File::create(path).with_context(|| format!("creating scores file {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).context("serializing scores")?;
        info!("saved {} score groups to {}", self.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("opening scores file {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing scores file {}", path.display()))
    }
}

/// Score every named table independently with the same model.
pub fn score_tables<M: OutlierModel>(
    model: &M,
    tables: &[(&str, &FeatureTable)],
) -> Result<ScoreTable> {
    let mut scores = ScoreTable::new();
    for (name, table) in tables {
        let values = model
            .score_samples(&table.to_matrix())
            .with_context(|| format!("scoring group '{name}' with {}", model.name()))?;
        info!("{name}: scored {} objects", values.len());
        scores.insert(*name, values.to_vec());
    }
    Ok(scores)
}
