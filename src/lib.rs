//! Dipper scoring for young stellar objects
//!
//! Selects light curves with enough points per band, turns every object into
//! a fixed-width feature vector (per-band light-curve statistics plus
//! magnitude asymmetry), and scores the vectors with an isolation forest fitted
//! on known dippers.
//!
//! # Modules
//!
//! - `data`: light-curve and offline feature records, loading, selection cuts
//! - `features`: extractor, asymmetry statistic, feature-table builders
//! - `anomaly`: isolation forest, model persistence, per-group scoring
//! - `config`: pipeline configuration
//! - `pipeline`: the end-to-end run
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use yso_dippers::data::filter::selection_cuts;
//! use yso_dippers::features::calculate_features_from_api;
//!
//! let (ids, curves) = selection_cuts(Path::new("data/light_curves.csv"), 5)?;
//! let features = calculate_features_from_api(&ids, &curves)?;
//! println!("{} objects, {} columns", features.len(), features.header().len());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod anomaly;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod pipeline;

pub use config::{ForestParams, GroupSource, PipelineConfig};
pub use error::PipelineError;
