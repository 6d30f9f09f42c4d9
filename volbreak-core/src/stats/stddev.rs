//! Population standard deviation (divide by N) of the trailing `period` values.

use super::trailing;

pub fn stddev(values: &[f64], period: usize) -> Option<f64> {
    let window = trailing(values, period)?;

    let first = window[0];
    if window.iter().all(|&v| v == first) {
        return Some(0.0);
    }

    let n = period as f64;
    let mean = window.iter().sum::<f64>() / n;
    // Deviations are scaled by the largest one before squaring so tiny but
    // distinct values cannot underflow to zero.
    let scale = window
        .iter()
        .map(|v| (v - mean).abs())
        .fold(0.0_f64, f64::max);
    if scale == 0.0 || !scale.is_finite() {
        let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        return Some(variance.max(0.0).sqrt());
    }
    let scaled = window
        .iter()
        .map(|v| ((v - mean) / scale).powi(2))
        .sum::<f64>()
        / n;
    Some(scale * scaled.sqrt())
}
