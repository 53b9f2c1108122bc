//! Assemble flat feature tables from raw light curves or from pre-extracted
//! offline rows. Both paths produce the same header for the same extractor.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use log::{info, warn};

use super::asymmetry::mag_asymmetry;
use super::extractor::{Extractor, TimeSeries};
use super::table::{build_header, FeatureRow, FeatureTable};
use crate::data::loader::load_offline_features;
use crate::data::model::{Band, BandSeries, LightCurves, OfflineRecord};

pub struct FeatureBuilder {
    extractor: Extractor,
}

impl FeatureBuilder {
    pub fn new(extractor: Extractor) -> Self {
        Self { extractor }
    }

    /// The table header this builder produces.
    pub fn header(&self) -> Vec<String> {
        build_header(&self.extractor.names())
    }

    /// Compute features for the selected objects from their raw points.
    ///
    /// Per band the points are time-sorted, run through the extractor, and
    /// followed by the magnitude asymmetry. Rows with an undefined statistic
    /// are dropped; the remaining rows keep the order of `ids`.
    pub fn from_light_curves(&self, ids: &[String], curves: &LightCurves) -> Result<FeatureTable> {
        let by_object = curves.by_object();
        let mut table = FeatureTable::new(self.header());

        for id in ids {
            let points = by_object.get(id.as_str()).map(Vec::as_slice).unwrap_or_default();
            if points.is_empty() {
                warn!("{id}: selected but has no light-curve points");
            }

            let mut values = Vec::with_capacity(table.n_features());
            for band in Band::ALL {
                let series = BandSeries::from_points(points.iter().copied(), band);
                values.extend(self.extractor.eval(&TimeSeries::from_band(&series)));
                values.push(mag_asymmetry(&series.m));
            }
            table.push(FeatureRow {
                object_id: id.clone(),
                values,
            })?;
        }

        let dropped = table.drop_undefined();
        info!("light curves: {} feature rows, {dropped} dropped as undefined", table.len());
        Ok(table)
    }

    /// Rebuild the feature table from pre-extracted offline rows.
    ///
    /// Rows missing either band are skipped and only the first row of each
    /// object id is used. Extractor statistics are taken from the nested
    /// per-band maps (missing names are undefined); the asymmetry is
    /// recomputed from the raw magnitudes of the matching band.
    pub fn from_offline(&self, records: &[OfflineRecord]) -> Result<FeatureTable> {
        let names = self.extractor.names();
        let mut table = FeatureTable::new(self.header());
        let mut seen: HashSet<&str> = HashSet::new();
        let mut incomplete = 0usize;

        for rec in records {
            if rec.g.is_none() || rec.r.is_none() {
                incomplete += 1;
                continue;
            }
            if !seen.insert(rec.object_id.as_str()) {
                continue;
            }

            let mut values = Vec::with_capacity(table.n_features());
            for band in Band::ALL {
                let stats = rec.band(band);
                values.extend(
                    names
                        .iter()
                        .map(|name| stats.and_then(|s| s.get(name)).copied().unwrap_or(f64::NAN)),
                );
                values.push(mag_asymmetry(&rec.magnitudes(band)));
            }
            table.push(FeatureRow {
                object_id: rec.object_id.clone(),
                values,
            })?;
        }

        let dropped = table.drop_undefined();
        info!(
            "offline: {} feature rows from {} records \
             ({incomplete} missing a band, {dropped} undefined)",
            table.len(),
            records.len()
        );
        Ok(table)
    }
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self::new(Extractor::standard())
    }
}

/// API path with the standard extractor.
pub fn calculate_features_from_api(ids: &[String], curves: &LightCurves) -> Result<FeatureTable> {
    FeatureBuilder::default().from_light_curves(ids, curves)
}

/// Offline path with the standard extractor, reading the rows from `path`.
pub fn build_features_from_file(path: &Path) -> Result<FeatureTable> {
    let records = load_offline_features(path)?;
    FeatureBuilder::default().from_offline(&records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{BandFeatures, LightCurvePoint};

    const G_MAGS: [f64; 6] = [15.0, 15.2, 14.9, 16.1, 15.05, 15.3];
    const R_MAGS: [f64; 6] = [14.5, 14.6, 14.4, 15.2, 14.55, 14.7];

    fn points(id: &str, g: &[f64], r: &[f64]) -> Vec<LightCurvePoint> {
        let mut out = Vec::new();
        // interleave bands and reverse time so the builder has to sort
        for (fid, mags) in [(2, r), (1, g)] {
            for (i, &m) in mags.iter().enumerate().rev() {
                out.push(LightCurvePoint {
                    object_id: id.into(),
                    fid,
                    jd: Some(2459000.0 + i as f64 + fid as f64 * 0.1),
                    magpsf: Some(m),
                    sigmapsf: Some(0.02 + 0.001 * i as f64),
                });
            }
        }
        out
    }

    #[test]
    fn api_table_has_one_row_per_defined_object() {
        let mut all = points("good", &G_MAGS, &R_MAGS);
        all.extend(points("flat", &[15.0; 6], &R_MAGS));
        let curves = LightCurves::new(all);

        let ids = vec!["flat".to_string(), "good".to_string()];
        let table = calculate_features_from_api(&ids, &curves).unwrap();

        assert_eq!(table.object_ids(), vec!["good"]);
        assert_eq!(table.header().len(), 1 + 2 * (Extractor::standard().size() + 1));
        assert!(table.rows()[0].is_defined());
    }

    #[test]
    fn asymmetry_columns_sit_after_each_band() {
        let curves = LightCurves::new(points("good", &G_MAGS, &R_MAGS));
        let table = calculate_features_from_api(&["good".to_string()], &curves).unwrap();

        let header = table.header();
        let per_band = Extractor::standard().size() + 1;
        let g_idx = header.iter().position(|h| h == "asymmetry_g").unwrap();
        let r_idx = header.iter().position(|h| h == "asymmetry_r").unwrap();
        assert_eq!(g_idx, per_band);
        assert_eq!(r_idx, 2 * per_band);

        let row = &table.rows()[0];
        assert_eq!(row.values[g_idx - 1], mag_asymmetry(&G_MAGS));
        assert_eq!(row.values[r_idx - 1], mag_asymmetry(&R_MAGS));
    }

    fn offline(id: &str, bands: (bool, bool), offset: f64) -> OfflineRecord {
        let names = Extractor::standard().names();
        let stats = |base: f64| -> BandFeatures {
            names
                .iter()
                .enumerate()
                .map(|(i, n)| (n.clone(), base + i as f64))
                .collect()
        };
        let mut cfid = vec![1; G_MAGS.len()];
        cfid.extend(vec![2; R_MAGS.len()]);
        let dcmag = G_MAGS.iter().chain(&R_MAGS).map(|m| m + offset).collect();
        OfflineRecord {
            object_id: id.into(),
            g: bands.0.then(|| stats(offset)),
            r: bands.1.then(|| stats(offset + 100.0)),
            cfid,
            dcmag,
        }
    }

    #[test]
    fn offline_skips_missing_bands_and_keeps_first_duplicate() {
        let records = vec![
            offline("a", (true, true), 0.0),
            offline("b", (true, false), 0.0),
            offline("a", (true, true), 50.0),
            offline("c", (true, true), 1.0),
        ];
        let table = FeatureBuilder::default().from_offline(&records).unwrap();

        assert_eq!(table.object_ids(), vec!["a", "c"]);
        // first occurrence of "a" has mean_g == 0.0
        assert_eq!(table.rows()[0].values[0], 0.0);
    }

    #[test]
    fn offline_missing_statistic_drops_row() {
        let mut rec = offline("a", (true, true), 0.0);
        rec.g.as_mut().unwrap().remove("skew");
        let table = FeatureBuilder::default().from_offline(&[rec]).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn both_paths_share_header_and_asymmetry() {
        let builder = FeatureBuilder::default();
        let curves = LightCurves::new(points("a", &G_MAGS, &R_MAGS));
        let api = builder.from_light_curves(&["a".to_string()], &curves).unwrap();
        let off = builder.from_offline(&[offline("a", (true, true), 0.0)]).unwrap();

        assert_eq!(api.header(), off.header());
        for column in ["asymmetry_g", "asymmetry_r"] {
            // values exclude the id column
            let idx = api.header().iter().position(|h| h == column).unwrap() - 1;
            assert!(api.rows()[0].values[idx].is_finite());
            assert_eq!(api.rows()[0].values[idx], off.rows()[0].values[idx], "{column}");
        }
    }
}
