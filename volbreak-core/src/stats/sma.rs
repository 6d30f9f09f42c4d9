//! Simple Moving Average (SMA).
//!
//! Mean of the trailing `period` values.

use super::trailing;

pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    let window = trailing(values, period)?;
    Some(window.iter().sum::<f64>() / period as f64)
}
