//! Small descriptive-statistics helpers shared by the extractor and the
//! asymmetry statistic.
//!
//! Every function returns NaN instead of failing on empty or degenerate input.

/// Arithmetic mean.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Standard deviation with `ddof` delta degrees of freedom.
pub fn std_dev(data: &[f64], ddof: usize) -> f64 {
    let n = data.len();
    if n <= ddof {
        return f64::NAN;
    }
    let mu = mean(data);
    let ss: f64 = data.iter().map(|x| (x - mu).powi(2)).sum();
    (ss / (n - ddof) as f64).sqrt()
}

/// Population standard deviation that skips NaN entries.
pub fn nan_std(data: &[f64]) -> f64 {
    let finite: Vec<f64> = data.iter().copied().filter(|x| !x.is_nan()).collect();
    std_dev(&finite, 0)
}

/// Ascending copy of `data`. NaN values sort last.
pub fn sorted(data: &[f64]) -> Vec<f64> {
    let mut v = data.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

/// Quantile `q ∈ [0, 1]` of already-sorted data, linearly interpolating
/// between the two closest ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Percentile `p ∈ [0, 100]` of unsorted data. Any NaN in the input makes the
/// result NaN.
pub fn percentile(data: &[f64], p: f64) -> f64 {
    if data.iter().any(|x| x.is_nan()) {
        return f64::NAN;
    }
    quantile_sorted(&sorted(data), p / 100.0)
}

/// Median of already-sorted data.
pub fn median_sorted(sorted: &[f64]) -> f64 {
    quantile_sorted(sorted, 0.5)
}
