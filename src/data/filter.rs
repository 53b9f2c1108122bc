use std::path::Path;

use anyhow::Result;
use log::{debug, info};

use super::loader::load_light_curves;
use super::model::{Band, LightCurves};

/// Default minimum number of points required in each band.
pub const DEFAULT_MIN_POINTS: usize = 5;

/// Return the ids of objects with at least `min_points` records in *both*
/// bands.
///
/// Records in bands other than g and r are ignored. Ids come back sorted and
/// unique. An empty table yields an empty list.
pub fn select_objects(curves: &LightCurves, min_points: usize) -> Vec<String> {
    curves
        .by_object()
        .into_iter()
        .filter(|(id, points)| {
            let count = |band: Band| points.iter().filter(|p| p.band() == Some(band)).count();
            let (n_g, n_r) = (count(Band::G), count(Band::R));
            let keep = n_g >= min_points && n_r >= min_points;
            if !keep {
                debug!("{id}: rejected ({n_g} g points, {n_r} r points, need {min_points})");
            }
            keep
        })
        .map(|(id, _)| id.to_string())
        .collect()
}

/// Load a light-curve file and apply the per-band point-count cut.
///
/// Returns the surviving ids together with the complete, unfiltered record
/// table; per-object slicing happens in the feature builder.
pub fn selection_cuts(path: &Path, min_points: usize) -> Result<(Vec<String>, LightCurves)> {
    let curves = load_light_curves(path)?;
    let ids = select_objects(&curves, min_points);
    info!(
        "{}: {} of {} objects pass the {min_points}-point cut",
        path.display(),
        ids.len(),
        curves.by_object().len()
    );
    Ok((ids, curves))
}
