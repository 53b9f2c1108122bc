use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Band – photometric filter
// ---------------------------------------------------------------------------

/// The two photometric bands a light curve is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Band {
    G,
    R,
}

impl Band {
    /// Both bands in feature-table order.
    pub const ALL: [Band; 2] = [Band::G, Band::R];

    /// Map a raw filter id (`i:fid` / `cfid`) onto a band.
    pub fn from_fid(fid: i64) -> Option<Band> {
        match fid {
            1 => Some(Band::G),
            2 => Some(Band::R),
            _ => None,
        }
    }

    pub fn fid(self) -> i64 {
        match self {
            Band::G => 1,
            Band::R => 2,
        }
    }

    /// Column-name suffix used in the flat feature header.
    pub fn suffix(self) -> &'static str {
        match self {
            Band::G => "g",
            Band::R => "r",
        }
    }

    /// Field name of this band inside the nested offline `lc_features` struct.
    pub fn key(self) -> &'static str {
        match self {
            Band::G => "1",
            Band::R => "2",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

// ---------------------------------------------------------------------------
// LightCurvePoint – one row of the light-curve CSV
// ---------------------------------------------------------------------------

/// A single photometric measurement as delivered by the alert API.
///
/// Empty numeric cells deserialize to `None` and are carried as NaN, so a bad
/// point poisons the statistics of its band rather than aborting the load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightCurvePoint {
    #[serde(rename = "i:objectId")]
    pub object_id: String,
    #[serde(rename = "i:fid")]
    pub fid: i64,
    #[serde(rename = "i:jd", deserialize_with = "csv::invalid_option")]
    pub jd: Option<f64>,
    #[serde(rename = "i:magpsf", deserialize_with = "csv::invalid_option")]
    pub magpsf: Option<f64>,
    #[serde(rename = "i:sigmapsf", deserialize_with = "csv::invalid_option")]
    pub sigmapsf: Option<f64>,
}

impl LightCurvePoint {
    pub fn band(&self) -> Option<Band> {
        Band::from_fid(self.fid)
    }

    pub fn time(&self) -> f64 {
        self.jd.unwrap_or(f64::NAN)
    }

    pub fn mag(&self) -> f64 {
        self.magpsf.unwrap_or(f64::NAN)
    }

    pub fn mag_err(&self) -> f64 {
        self.sigmapsf.unwrap_or(f64::NAN)
    }
}

// ---------------------------------------------------------------------------
// BandSeries – time-sorted arrays for one object in one band
// ---------------------------------------------------------------------------

/// Column-oriented view of one band of one light curve, sorted by time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandSeries {
    pub t: Vec<f64>,
    pub m: Vec<f64>,
    pub sigma: Vec<f64>,
}

impl BandSeries {
    /// Collect the points of `band`, ordered by observation time.
    pub fn from_points<'a, I>(points: I, band: Band) -> Self
    where
        I: IntoIterator<Item = &'a LightCurvePoint>,
    {
        let mut selected: Vec<&LightCurvePoint> =
            points.into_iter().filter(|p| p.band() == Some(band)).collect();
        selected.sort_by(|a, b| a.time().total_cmp(&b.time()));

        BandSeries {
            t: selected.iter().map(|p| p.time()).collect(),
            m: selected.iter().map(|p| p.mag()).collect(),
            sigma: selected.iter().map(|p| p.mag_err()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }
}

// ---------------------------------------------------------------------------
// LightCurves – the complete loaded record table
// ---------------------------------------------------------------------------

/// All light-curve records of one input file, in file order.
#[derive(Debug, Clone, Default)]
pub struct LightCurves {
    pub points: Vec<LightCurvePoint>,
}

impl LightCurves {
    pub fn new(points: Vec<LightCurvePoint>) -> Self {
        LightCurves { points }
    }

    /// Group record references by object id. Ids iterate in sorted order.
    pub fn by_object(&self) -> BTreeMap<&str, Vec<&LightCurvePoint>> {
        let mut grouped: BTreeMap<&str, Vec<&LightCurvePoint>> = BTreeMap::new();
        for p in &self.points {
            grouped.entry(p.object_id.as_str()).or_default().push(p);
        }
        grouped
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ---------------------------------------------------------------------------
// OfflineRecord – one row of a pre-extracted feature file
// ---------------------------------------------------------------------------

/// Extractor statistics of one band, keyed by feature name.
pub type BandFeatures = BTreeMap<String, f64>;

/// A row of an offline feature file: nested per-band statistics plus the raw
/// per-point band ids and magnitudes they were computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineRecord {
    pub object_id: String,
    pub g: Option<BandFeatures>,
    pub r: Option<BandFeatures>,
    pub cfid: Vec<i64>,
    pub dcmag: Vec<f64>,
}

impl OfflineRecord {
    pub fn band(&self, band: Band) -> Option<&BandFeatures> {
        match band {
            Band::G => self.g.as_ref(),
            Band::R => self.r.as_ref(),
        }
    }

    /// Magnitudes of the points observed in `band`.
    pub fn magnitudes(&self, band: Band) -> Vec<f64> {
        self.cfid
            .iter()
            .zip(&self.dcmag)
            .filter(|(fid, _)| **fid == band.fid())
            .map(|(_, &m)| m)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, fid: i64, jd: f64, mag: f64) -> LightCurvePoint {
        LightCurvePoint {
            object_id: id.to_string(),
            fid,
            jd: Some(jd),
            magpsf: Some(mag),
            sigmapsf: Some(0.1),
        }
    }

    #[test]
    fn band_series_is_time_sorted_and_band_filtered() {
        let points = vec![
            point("a", 1, 3.0, 13.0),
            point("a", 2, 1.5, 99.0),
            point("a", 1, 1.0, 11.0),
            point("a", 1, 2.0, 12.0),
        ];
        let series = BandSeries::from_points(&points, Band::G);
        assert_eq!(series.t, vec![1.0, 2.0, 3.0]);
        assert_eq!(series.m, vec![11.0, 12.0, 13.0]);
    }

    #[test]
    fn offline_magnitudes_follow_cfid() {
        let rec = OfflineRecord {
            object_id: "x".into(),
            g: None,
            r: None,
            cfid: vec![1, 2, 1, 3],
            dcmag: vec![10.0, 20.0, 11.0, 30.0],
        };
        assert_eq!(rec.magnitudes(Band::G), vec![10.0, 11.0]);
        assert_eq!(rec.magnitudes(Band::R), vec![20.0]);
    }

    #[test]
    fn only_two_band_ids_are_recognised() {
        assert_eq!(Band::from_fid(1), Some(Band::G));
        assert_eq!(Band::from_fid(2), Some(Band::R));
        assert_eq!(Band::from_fid(3), None);
    }
}
