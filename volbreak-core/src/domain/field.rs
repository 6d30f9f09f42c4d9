//! Bar field selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::Bar;

/// Scalar field of a bar that a statistic is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl PriceField {
    pub const ALL: [PriceField; 5] = [
        PriceField::Open,
        PriceField::High,
        PriceField::Low,
        PriceField::Close,
        PriceField::Volume,
    ];

    pub fn extract(&self, bar: &Bar) -> f64 {
        match self {
            PriceField::Open => bar.open,
            PriceField::High => bar.high,
            PriceField::Low => bar.low,
            PriceField::Close => bar.close,
            PriceField::Volume => bar.volume as f64,
        }
    }

    /// One-letter code (`O`, `H`, `L`, `C`, `V`).
    pub fn code(&self) -> char {
        match self {
            PriceField::Open => 'O',
            PriceField::High => 'H',
            PriceField::Low => 'L',
            PriceField::Close => 'C',
            PriceField::Volume => 'V',
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
            PriceField::Volume => "volume",
        };
        f.write_str(name)
    }
}

impl FromStr for PriceField {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "o" | "open" => Ok(PriceField::Open),
            "h" | "high" => Ok(PriceField::High),
            "l" | "low" => Ok(PriceField::Low),
            "c" | "close" => Ok(PriceField::Close),
            "v" | "volume" => Ok(PriceField::Volume),
            _ => Err(FieldError::Unknown(s.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FieldError {
    #[error("unknown field code '{0}' (expected one of O, H, L, C, V)")]
    Unknown(String),
}
