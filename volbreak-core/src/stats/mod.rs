//! Statistics over a window of chronologically ordered values.
//!
//! Every statistic takes the values oldest-first plus a `period` and returns
//! `None` rather than a partial value when the data cannot support it:
//! fewer than `period` values, a zero period, or a non-finite value among the
//! values used.

pub mod adjusted_sma;
pub mod ema;
pub mod sma;
pub mod stddev;

pub use adjusted_sma::adjusted_sma;
pub use ema::ema;
pub use sma::sma;
pub use stddev::stddev;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Statistic selectable as a baseline or point query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Sma,
    #[default]
    AdjustedSma,
    Ema,
    StdDev,
}

impl Statistic {
    pub fn compute(&self, values: &[f64], period: usize) -> Option<f64> {
        match self {
            Statistic::Sma => sma(values, period),
            Statistic::AdjustedSma => adjusted_sma(values, period),
            Statistic::Ema => ema(values, period),
            Statistic::StdDev => stddev(values, period),
        }
    }

    /// Smallest period for which the statistic is defined.
    pub fn min_period(&self) -> usize {
        match self {
            Statistic::AdjustedSma => 3,
            _ => 1,
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Statistic::Sma => "sma",
            Statistic::AdjustedSma => "adjusted_sma",
            Statistic::Ema => "ema",
            Statistic::StdDev => "stddev",
        };
        f.write_str(name)
    }
}

impl FromStr for Statistic {
    type Err = StatisticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "sma" => Ok(Statistic::Sma),
            "adjusted_sma" | "adj_sma" | "trimmed_sma" => Ok(Statistic::AdjustedSma),
            "ema" => Ok(Statistic::Ema),
            "stddev" | "std" | "stdev" => Ok(Statistic::StdDev),
            _ => Err(StatisticError::Unknown(s.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum StatisticError {
    #[error("unknown statistic '{0}' (expected sma, adjusted_sma, ema or stddev)")]
    Unknown(String),
}

/// Trailing `period` values, or `None` when the input cannot support them.
fn trailing(values: &[f64], period: usize) -> Option<&[f64]> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    if window.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(window)
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for statistic tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
