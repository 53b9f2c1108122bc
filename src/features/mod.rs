//! Feature engineering
//!
//! - `extractor`: per-band light-curve statistics
//! - `asymmetry`: magnitude asymmetry, shared by both builders
//! - `builder`: API-path and offline-path feature tables
//! - `table`: the flat feature table and its header

pub mod asymmetry;
pub mod builder;
pub mod extractor;
pub mod stats;
pub mod table;

pub use asymmetry::mag_asymmetry;
pub use builder::{build_features_from_file, calculate_features_from_api, FeatureBuilder};
pub use extractor::{Extractor, FeatureEvaluator, TimeSeries};
pub use table::{build_header, FeatureRow, FeatureTable};
