//! Percentile helper for corridor baseline statistics.

/// Linear-interpolated percentile of a sample.
///
/// `rank = (pct/100)·(n−1)`; the value is interpolated between the two
/// nearest order statistics. Returns 0 for an empty sample.
pub fn percentile_linear(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0) * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(n - 1);
    let frac = rank - lower as f64;
    sorted[lower] + frac * (sorted[upper] - sorted[lower])
}
