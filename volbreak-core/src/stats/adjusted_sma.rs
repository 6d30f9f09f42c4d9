//! Adjusted (trimmed) SMA.
//!
//! Drops exactly one occurrence of the maximum and one of the minimum from the
//! trailing `period` values and averages the remaining `period - 2`. Used as the
//! volume baseline so that a single earlier spike does not inflate it.

use super::trailing;

pub fn adjusted_sma(values: &[f64], period: usize) -> Option<f64> {
    if period < 3 {
        return None;
    }
    let window = trailing(values, period)?;

    let (sum, max, min) = window.iter().fold(
        (0.0, f64::NEG_INFINITY, f64::INFINITY),
        |(sum, max, min), &v| (sum + v, max.max(v), min.min(v)),
    );
    Some((sum - max - min) / (period - 2) as f64)
}
