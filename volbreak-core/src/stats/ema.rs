//! Exponential Moving Average (EMA).
//!
//! Seed: SMA of the oldest `period` values.
//! Recursive over the rest: EMA[t] = alpha * v[t] + (1 - alpha) * EMA[t-1],
//! alpha = 2 / (period + 1). The result is the value after the newest input.

pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    if values.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    Some(
        values[period..]
            .iter()
            .fold(seed, |prev, &v| alpha * v + (1.0 - alpha) * prev),
    )
}
