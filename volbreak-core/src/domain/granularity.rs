//! Granularity — the time span covered by one bar.

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Bar span in whole minutes (`1min`, `5min`, `15min`, ...).
///
/// Serialized as its display string so config files read `granularity = "5min"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Granularity {
    minutes: u32,
}

impl Granularity {
    pub const ONE_MINUTE: Granularity = Granularity { minutes: 1 };
    pub const FIVE_MINUTES: Granularity = Granularity { minutes: 5 };
    pub const FIFTEEN_MINUTES: Granularity = Granularity { minutes: 15 };

    pub fn from_minutes(minutes: u32) -> Result<Self, GranularityError> {
        if minutes == 0 {
            return Err(GranularityError::Zero);
        }
        Ok(Self { minutes })
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.minutes))
    }

    /// How many bars of `native` make up one bar of `self`, if it divides evenly.
    pub fn multiple_of(&self, native: Granularity) -> Option<usize> {
        if self.minutes % native.minutes == 0 {
            Some((self.minutes / native.minutes) as usize)
        } else {
            None
        }
    }

    /// True when `t` sits on a boundary of this granularity (minute-of-day
    /// divisible by the bar span, zero seconds).
    pub fn is_aligned(&self, t: NaiveDateTime) -> bool {
        let minute_of_day = t.hour() * 60 + t.minute();
        t.second() == 0 && t.nanosecond() == 0 && minute_of_day % self.minutes == 0
    }
}

impl Default for Granularity {
    fn default() -> Self {
        Self::FIVE_MINUTES
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}min", self.minutes)
    }
}

impl FromStr for Granularity {
    type Err = GranularityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_ascii_lowercase();
        let (digits, scale) = if let Some(n) = trimmed.strip_suffix("min") {
            (n, 1)
        } else if let Some(n) = trimmed.strip_suffix('m') {
            (n, 1)
        } else if let Some(n) = trimmed.strip_suffix('h') {
            (n, 60)
        } else {
            (trimmed.as_str(), 1)
        };

        let value: u32 = digits
            .trim()
            .parse()
            .map_err(|_| GranularityError::Unparseable(s.to_string()))?;
        let minutes = value
            .checked_mul(scale)
            .ok_or_else(|| GranularityError::Unparseable(s.to_string()))?;
        Self::from_minutes(minutes)
    }
}

impl TryFrom<String> for Granularity {
    type Error = GranularityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Granularity> for String {
    fn from(g: Granularity) -> Self {
        g.to_string()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum GranularityError {
    #[error("granularity must be at least one minute")]
    Zero,

    #[error("cannot parse granularity '{0}' (expected e.g. 1min, 5min, 15min, 1h)")]
    Unparseable(String),
}
