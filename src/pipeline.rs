//! End-to-end scoring run: selection cuts → feature tables → fit or load the
//! model → score every group → persist.

use anyhow::{Context, Result};
use log::info;

use crate::anomaly::{fit_or_load, score_tables, ScoreTable};
use crate::config::PipelineConfig;
use crate::data::filter::selection_cuts;
use crate::data::loader::load_offline_features;
use crate::features::{FeatureBuilder, FeatureTable};

/// Build the feature table of every configured group, in scoring order.
pub fn build_group_tables(
    config: &PipelineConfig,
    builder: &FeatureBuilder,
) -> Result<Vec<(String, FeatureTable)>> {
    let mut tables = Vec::new();

    for group in &config.light_curves {
        let (ids, curves) = selection_cuts(&group.path, config.min_points)
            .with_context(|| format!("group '{}'", group.name))?;
        let table = builder
            .from_light_curves(&ids, &curves)
            .with_context(|| format!("group '{}'", group.name))?;
        tables.push((group.name.clone(), table));
    }

    for group in &config.feature_files {
        let records =
            load_offline_features(&group.path).with_context(|| format!("group '{}'", group.name))?;
        let table = builder
            .from_offline(&records)
            .with_context(|| format!("group '{}'", group.name))?;
        tables.push((group.name.clone(), table));
    }

    Ok(tables)
}

/// Run the full pipeline described by `config` and return the scores that
/// were written to `config.scores_path`.
pub fn run(config: &PipelineConfig) -> Result<ScoreTable> {
    config.validate()?;

    let builder = FeatureBuilder::default();
    let tables = build_group_tables(config, &builder)?;

    if let Some(dir) = &config.features_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating features directory {}", dir.display()))?;
        for (name, table) in &tables {
            table.write_csv(&dir.join(format!("{name}.csv")))?;
        }
        info!("wrote {} feature tables to {}", tables.len(), dir.display());
    }

    let training = tables
        .iter()
        .find(|(name, _)| *name == config.training_group)
        .map(|(_, table)| table);
    let model = fit_or_load(config.train_model, &config.model_path, training, &config.forest)?;

    let named: Vec<(&str, &FeatureTable)> =
        tables.iter().map(|(name, table)| (name.as_str(), table)).collect();
    let scores = score_tables(&model, &named)?;
    scores.save(&config.scores_path)?;
    Ok(scores)
}
