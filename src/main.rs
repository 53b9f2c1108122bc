use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use yso_dippers::PipelineConfig;
use yso_dippers::pipeline;

/// Score light curves against an isolation forest trained on known dippers
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON pipeline configuration (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fit and save a new model instead of loading one
    #[arg(long)]
    train: bool,

    /// Model file to write (with --train) or read
    #[arg(long)]
    model: Option<PathBuf>,

    /// Output file for the score table
    #[arg(long)]
    scores: Option<PathBuf>,

    /// Minimum number of points per band
    #[arg(long)]
    min_points: Option<usize>,

    /// Also write each group's feature table as CSV into this directory
    #[arg(long)]
    features_dir: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        if self.train {
            config.train_model = true;
        }
        if let Some(model) = self.model {
            config.model_path = model;
        }
        if let Some(scores) = self.scores {
            config.scores_path = scores;
        }
        if let Some(n) = self.min_points {
            config.min_points = n;
        }
        if self.features_dir.is_some() {
            config.features_dir = self.features_dir;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let config = Args::parse().into_config()?;
    info!(
        "groups {:?}, {} mode",
        config.group_names(),
        if config.train_model { "training" } else { "scoring" }
    );

    let scores = pipeline::run(&config)?;
    for (group, values) in scores.groups() {
        println!("{group:>10}: {} scores", values.len());
    }
    println!("Scores written to {}", config.scores_path.display());
    Ok(())
}
