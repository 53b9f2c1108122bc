use super::stats::{mean, nan_std, percentile};

/// Magnitude asymmetry of a light curve:
///
/// ```text
/// M = (mean(p10, p90) − median) / σ
/// ```
///
/// where the percentiles use linear interpolation and σ is the population
/// standard deviation ignoring NaN. The result is NaN or ±∞ when σ is zero,
/// the input is empty, or it contains NaN; callers drop such rows.
pub fn mag_asymmetry(mags: &[f64]) -> f64 {
    let p10 = percentile(mags, 10.0);
    let median = percentile(mags, 50.0);
    let p90 = percentile(mags, 90.0);
    (mean(&[p10, p90]) - median) / nan_std(mags)
}
