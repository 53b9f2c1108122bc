//! Light-curve feature extractor
//!
//! A fixed, ordered set of per-band statistics computed from
//! `(time, magnitude, uncertainty)` arrays. Each evaluator declares how many
//! points it needs; short or degenerate series yield NaN rather than an error,
//! and the feature builder drops such rows.

use statrs::function::erf::erfc;

use super::stats::{mean, median_sorted, quantile_sorted, sorted, std_dev};
use crate::data::model::BandSeries;

/// Time series of one band, with the summary values most evaluators share.
#[derive(Debug, Clone)]
pub struct TimeSeries<'a> {
    pub t: &'a [f64],
    pub m: &'a [f64],
    /// Inverse-variance weights, `1 / σ²`.
    pub w: Vec<f64>,
    pub mean: f64,
    /// Sample standard deviation (ddof = 1).
    pub std: f64,
    pub median: f64,
    pub weighted_mean: f64,
    /// Magnitudes in ascending order.
    pub sorted_m: Vec<f64>,
}

impl<'a> TimeSeries<'a> {
    /// `t` must be ascending; all three slices must have equal length.
    pub fn new(t: &'a [f64], m: &'a [f64], sigma: &[f64]) -> Self {
        debug_assert_eq!(t.len(), m.len());
        debug_assert_eq!(m.len(), sigma.len());

        let w: Vec<f64> = sigma.iter().map(|s| 1.0 / (s * s)).collect();
        let w_sum: f64 = w.iter().sum();
        let weighted_mean = w.iter().zip(m).map(|(w, m)| w * m).sum::<f64>() / w_sum;
        let sorted_m = sorted(m);

        TimeSeries {
            t,
            m,
            mean: mean(m),
            std: std_dev(m, 1),
            median: median_sorted(&sorted_m),
            weighted_mean,
            sorted_m,
            w,
        }
    }

    pub fn from_band(series: &'a BandSeries) -> Self {
        Self::new(&series.t, &series.m, &series.sigma)
    }

    pub fn len(&self) -> usize {
        self.m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.m.is_empty()
    }

    fn min(&self) -> f64 {
        self.sorted_m.first().copied().unwrap_or(f64::NAN)
    }

    fn max(&self) -> f64 {
        self.sorted_m.last().copied().unwrap_or(f64::NAN)
    }

    fn quantile(&self, q: f64) -> f64 {
        quantile_sorted(&self.sorted_m, q)
    }
}

/// A statistic (or a small group of statistics) computed from one band.
pub trait FeatureEvaluator {
    /// Output names, in the order `compute` returns values.
    fn names(&self) -> Vec<String>;

    /// Minimum series length for which the statistic is defined.
    fn min_points(&self) -> usize;

    /// Compute the values. Only called with at least `min_points` points.
    fn compute(&self, ts: &TimeSeries) -> Vec<f64>;

    fn size(&self) -> usize {
        self.names().len()
    }

    /// Compute the values, or NaN for every output when the series is too
    /// short.
    fn eval(&self, ts: &TimeSeries) -> Vec<f64> {
        if ts.len() < self.min_points() {
            return vec![f64::NAN; self.size()];
        }
        self.compute(ts)
    }
}

// ---------------------------------------------------------------------------
// Location and scale
// ---------------------------------------------------------------------------

pub struct Mean;

impl FeatureEvaluator for Mean {
    fn names(&self) -> Vec<String> {
        vec!["mean".into()]
    }
    fn min_points(&self) -> usize {
        1
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        vec![ts.mean]
    }
}

pub struct WeightedMean;

impl FeatureEvaluator for WeightedMean {
    fn names(&self) -> Vec<String> {
        vec!["weighted_mean".into()]
    }
    fn min_points(&self) -> usize {
        1
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        vec![ts.weighted_mean]
    }
}

pub struct StandardDeviation;

impl FeatureEvaluator for StandardDeviation {
    fn names(&self) -> Vec<String> {
        vec!["standard_deviation".into()]
    }
    fn min_points(&self) -> usize {
        2
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        vec![ts.std]
    }
}

pub struct Median;

impl FeatureEvaluator for Median {
    fn names(&self) -> Vec<String> {
        vec!["median".into()]
    }
    fn min_points(&self) -> usize {
        1
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        vec![ts.median]
    }
}

/// Half the peak-to-peak range.
pub struct Amplitude;

impl FeatureEvaluator for Amplitude {
    fn names(&self) -> Vec<String> {
        vec!["amplitude".into()]
    }
    fn min_points(&self) -> usize {
        1
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        vec![0.5 * (ts.max() - ts.min())]
    }
}

/// Fraction of points further than `nstd` standard deviations from the mean.
pub struct BeyondNStd {
    pub nstd: f64,
}

impl FeatureEvaluator for BeyondNStd {
    fn names(&self) -> Vec<String> {
        vec![format!("beyond_{}_std", self.nstd)]
    }
    fn min_points(&self) -> usize {
        2
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        let limit = self.nstd * ts.std;
        let count = ts.m.iter().filter(|&&m| (m - ts.mean).abs() > limit).count();
        vec![count as f64 / ts.len() as f64]
    }
}

/// Range of the normalised cumulative sum of deviations from the mean.
pub struct Cusum;

impl FeatureEvaluator for Cusum {
    fn names(&self) -> Vec<String> {
        vec!["cusum".into()]
    }
    fn min_points(&self) -> usize {
        2
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        let norm = ts.len() as f64 * ts.std;
        let mut acc = 0.0;
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for m in ts.m {
            acc += (m - ts.mean) / norm;
            lo = lo.min(acc);
            hi = hi.max(acc);
        }
        vec![hi - lo]
    }
}

/// `Q(1 − q) − Q(q)`.
pub struct InterPercentileRange {
    pub quantile: f64,
}

impl FeatureEvaluator for InterPercentileRange {
    fn names(&self) -> Vec<String> {
        vec![format!("inter_percentile_range_{:.0}", self.quantile * 100.0)]
    }
    fn min_points(&self) -> usize {
        1
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        vec![ts.quantile(1.0 - self.quantile) - ts.quantile(self.quantile)]
    }
}

// ---------------------------------------------------------------------------
// Shape
// ---------------------------------------------------------------------------

/// Unbiased excess kurtosis.
pub struct Kurtosis;

impl FeatureEvaluator for Kurtosis {
    fn names(&self) -> Vec<String> {
        vec!["kurtosis".into()]
    }
    fn min_points(&self) -> usize {
        4
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        let n = ts.len() as f64;
        let m4: f64 = ts.m.iter().map(|m| ((m - ts.mean) / ts.std).powi(4)).sum();
        let k = n * (n + 1.0) / ((n - 1.0) * (n - 2.0) * (n - 3.0)) * m4
            - 3.0 * (n - 1.0).powi(2) / ((n - 2.0) * (n - 3.0));
        vec![k]
    }
}

/// Unbiased skewness.
pub struct Skew;

impl FeatureEvaluator for Skew {
    fn names(&self) -> Vec<String> {
        vec!["skew".into()]
    }
    fn min_points(&self) -> usize {
        3
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        let n = ts.len() as f64;
        let m3: f64 = ts.m.iter().map(|m| ((m - ts.mean) / ts.std).powi(3)).sum();
        vec![n / ((n - 1.0) * (n - 2.0)) * m3]
    }
}

/// `(Q(1 − n) − Q(n)) / (Q(1 − d) − Q(d))` for numerator quantile `n` and
/// denominator quantile `d`.
pub struct MagnitudePercentageRatio {
    pub numerator: f64,
    pub denominator: f64,
}

impl FeatureEvaluator for MagnitudePercentageRatio {
    fn names(&self) -> Vec<String> {
        vec![format!(
            "magnitude_percentage_ratio_{:.0}_{:.0}",
            self.numerator * 100.0,
            self.denominator * 100.0
        )]
    }
    fn min_points(&self) -> usize {
        1
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        let num = ts.quantile(1.0 - self.numerator) - ts.quantile(self.numerator);
        let den = ts.quantile(1.0 - self.denominator) - ts.quantile(self.denominator);
        vec![num / den]
    }
}

pub struct MedianAbsoluteDeviation;

impl FeatureEvaluator for MedianAbsoluteDeviation {
    fn names(&self) -> Vec<String> {
        vec!["median_absolute_deviation".into()]
    }
    fn min_points(&self) -> usize {
        1
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        let deviations: Vec<f64> = ts.m.iter().map(|m| (m - ts.median).abs()).collect();
        vec![median_sorted(&sorted(&deviations))]
    }
}

/// Fraction of points closer to the median than `quantile` times the
/// amplitude.
pub struct MedianBufferRangePercentage {
    pub quantile: f64,
}

impl FeatureEvaluator for MedianBufferRangePercentage {
    fn names(&self) -> Vec<String> {
        vec![format!("median_buffer_range_percentage_{:.0}", self.quantile * 100.0)]
    }
    fn min_points(&self) -> usize {
        1
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        let buffer = self.quantile * 0.5 * (ts.max() - ts.min());
        let inside = ts.m.iter().filter(|&&m| (m - ts.median).abs() < buffer).count();
        vec![inside as f64 / ts.len() as f64]
    }
}

/// Largest absolute distance from the median.
pub struct PercentAmplitude;

impl FeatureEvaluator for PercentAmplitude {
    fn names(&self) -> Vec<String> {
        vec!["percent_amplitude".into()]
    }
    fn min_points(&self) -> usize {
        1
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        vec![(ts.max() - ts.median).abs().max((ts.min() - ts.median).abs())]
    }
}

/// Coefficient of variation, `σ / mean`.
pub struct MeanVariance;

impl FeatureEvaluator for MeanVariance {
    fn names(&self) -> Vec<String> {
        vec!["mean_variance".into()]
    }
    fn min_points(&self) -> usize {
        2
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        vec![ts.std / ts.mean]
    }
}

/// Anderson–Darling normality statistic with the small-sample correction
/// `1 + 4/n − 25/n²`.
pub struct AndersonDarlingNormal;

impl FeatureEvaluator for AndersonDarlingNormal {
    fn names(&self) -> Vec<String> {
        vec!["anderson_darling_normal".into()]
    }
    fn min_points(&self) -> usize {
        4
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        let n = ts.len();
        let z: Vec<f64> = ts.sorted_m.iter().map(|m| (m - ts.mean) / ts.std).collect();
        // ln Φ(z) and ln(1 − Φ(z)) via erfc to keep the tails accurate
        let ln_cdf = |x: f64| (0.5 * erfc(-x / std::f64::consts::SQRT_2)).ln();
        let ln_sf = |x: f64| (0.5 * erfc(x / std::f64::consts::SQRT_2)).ln();

        let sum: f64 = (0..n)
            .map(|i| (2 * i + 1) as f64 * (ln_cdf(z[i]) + ln_sf(z[n - 1 - i])))
            .sum();
        let nf = n as f64;
        let a2 = -nf - sum / nf;
        vec![a2 * (1.0 + 4.0 / nf - 25.0 / (nf * nf))]
    }
}

// ---------------------------------------------------------------------------
// Time dependence
// ---------------------------------------------------------------------------

/// Ordinary least-squares line: slope, its standard error, and the residual
/// scatter.
pub struct LinearTrend;

impl FeatureEvaluator for LinearTrend {
    fn names(&self) -> Vec<String> {
        vec![
            "linear_trend".into(),
            "linear_trend_sigma".into(),
            "linear_trend_noise".into(),
        ]
    }
    fn min_points(&self) -> usize {
        3
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        let n = ts.len() as f64;
        let t_mean = mean(ts.t);
        let sxx: f64 = ts.t.iter().map(|t| (t - t_mean).powi(2)).sum();
        let sxy: f64 = ts
            .t
            .iter()
            .zip(ts.m)
            .map(|(t, m)| (t - t_mean) * (m - ts.mean))
            .sum();
        let slope = sxy / sxx;
        let rss: f64 = ts
            .t
            .iter()
            .zip(ts.m)
            .map(|(t, m)| (m - ts.mean - slope * (t - t_mean)).powi(2))
            .sum();
        let noise2 = rss / (n - 2.0);
        vec![slope, (noise2 / sxx).sqrt(), noise2.sqrt()]
    }
}

/// Inverse-variance weighted least-squares line: slope, its standard error,
/// and the reduced χ² of the fit.
pub struct LinearFit;

impl FeatureEvaluator for LinearFit {
    fn names(&self) -> Vec<String> {
        vec![
            "linear_fit_slope".into(),
            "linear_fit_slope_sigma".into(),
            "linear_fit_reduced_chi2".into(),
        ]
    }
    fn min_points(&self) -> usize {
        3
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        let n = ts.len() as f64;
        let w_sum: f64 = ts.w.iter().sum();
        let t_mean = ts.w.iter().zip(ts.t).map(|(w, t)| w * t).sum::<f64>() / w_sum;
        let m_mean = ts.weighted_mean;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for ((w, t), m) in ts.w.iter().zip(ts.t).zip(ts.m) {
            sxx += w * (t - t_mean).powi(2);
            sxy += w * (t - t_mean) * (m - m_mean);
        }
        let slope = sxy / sxx;
        let chi2: f64 = ts
            .w
            .iter()
            .zip(ts.t)
            .zip(ts.m)
            .map(|((w, t), m)| w * (m - m_mean - slope * (t - t_mean)).powi(2))
            .sum();
        vec![slope, (1.0 / sxx).sqrt(), chi2 / (n - 2.0)]
    }
}

/// Steepest change between consecutive observations. Coincident timestamps
/// give an infinite slope.
pub struct MaximumSlope;

impl FeatureEvaluator for MaximumSlope {
    fn names(&self) -> Vec<String> {
        vec!["maximum_slope".into()]
    }
    fn min_points(&self) -> usize {
        2
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        let slope = ts
            .t
            .windows(2)
            .zip(ts.m.windows(2))
            .map(|(t, m)| ((m[1] - m[0]) / (t[1] - t[0])).abs())
            .fold(f64::NEG_INFINITY, f64::max);
        vec![slope]
    }
}

// ---------------------------------------------------------------------------
// Error-weighted
// ---------------------------------------------------------------------------

/// χ² of the constant weighted-mean model per degree of freedom.
pub struct ReducedChi2;

impl FeatureEvaluator for ReducedChi2 {
    fn names(&self) -> Vec<String> {
        vec!["chi2".into()]
    }
    fn min_points(&self) -> usize {
        2
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        let chi2: f64 = ts
            .w
            .iter()
            .zip(ts.m)
            .map(|(w, m)| w * (m - ts.weighted_mean).powi(2))
            .sum();
        vec![chi2 / (ts.len() - 1) as f64]
    }
}

/// Stetson K: `Σ|δ| / √(N Σδ²)` with `δ` the error-normalised residual from
/// the weighted mean.
pub struct StetsonK;

impl FeatureEvaluator for StetsonK {
    fn names(&self) -> Vec<String> {
        vec!["stetson_K".into()]
    }
    fn min_points(&self) -> usize {
        2
    }
    fn compute(&self, ts: &TimeSeries) -> Vec<f64> {
        let residuals: Vec<f64> = ts
            .w
            .iter()
            .zip(ts.m)
            .map(|(w, m)| (m - ts.weighted_mean) * w.sqrt())
            .collect();
        let abs_sum: f64 = residuals.iter().map(|d| d.abs()).sum();
        let sq_sum: f64 = residuals.iter().map(|d| d * d).sum();
        vec![abs_sum / (ts.len() as f64 * sq_sum).sqrt()]
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// An ordered collection of evaluators producing one flat feature vector.
pub struct Extractor {
    features: Vec<Box<dyn FeatureEvaluator>>,
}

impl Extractor {
    pub fn new(features: Vec<Box<dyn FeatureEvaluator>>) -> Self {
        Self { features }
    }

    /// The feature set used for dipper scoring.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(Mean),
            Box::new(WeightedMean),
            Box::new(StandardDeviation),
            Box::new(Median),
            Box::new(Amplitude),
            Box::new(BeyondNStd { nstd: 1.0 }),
            Box::new(Cusum),
            Box::new(InterPercentileRange { quantile: 0.1 }),
            Box::new(Kurtosis),
            Box::new(LinearTrend),
            Box::new(LinearFit),
            Box::new(MagnitudePercentageRatio {
                numerator: 0.4,
                denominator: 0.05,
            }),
            Box::new(MagnitudePercentageRatio {
                numerator: 0.2,
                denominator: 0.05,
            }),
            Box::new(MaximumSlope),
            Box::new(MedianAbsoluteDeviation),
            Box::new(MedianBufferRangePercentage { quantile: 0.1 }),
            Box::new(PercentAmplitude),
            Box::new(MeanVariance),
            Box::new(AndersonDarlingNormal),
            Box::new(ReducedChi2),
            Box::new(Skew),
            Box::new(StetsonK),
        ])
    }

    /// All output names, in evaluation order.
    pub fn names(&self) -> Vec<String> {
        self.features.iter().flat_map(|f| f.names()).collect()
    }

    /// Number of values produced per band.
    pub fn size(&self) -> usize {
        self.features.iter().map(|f| f.size()).sum()
    }

    pub fn eval(&self, ts: &TimeSeries) -> Vec<f64> {
        self.features.iter().flat_map(|f| f.eval(ts)).collect()
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::standard()
    }
}
