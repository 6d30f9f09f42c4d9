//! Bar — the fundamental market data unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Granularity, SymbolId};

/// Open/high/low/close prices of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlc {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Ohlc {
    pub fn new(open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
        }
    }

    /// Flat bar where every price is `price`.
    pub fn flat(price: f64) -> Self {
        Self::new(price, price, price, price)
    }
}

/// OHLCV bar for one symbol over `[start_time, end_time)` at a fixed granularity.
///
/// Timestamps are exchange-local wall clock. Bars are never mutated after
/// ingestion; aggregation produces new bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: SymbolId,
    pub granularity: Granularity,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Build a validated bar spanning one `granularity` from `start_time`.
    pub fn new(
        symbol: SymbolId,
        granularity: Granularity,
        start_time: NaiveDateTime,
        ohlc: Ohlc,
        volume: u64,
    ) -> Result<Self, BarError> {
        let bar = Self {
            symbol,
            granularity,
            start_time,
            end_time: start_time + granularity.duration(),
            open: ohlc.open,
            high: ohlc.high,
            low: ohlc.low,
            close: ohlc.close,
            volume,
        };
        bar.check()?;
        Ok(bar)
    }

    pub fn ohlc(&self) -> Ohlc {
        Ohlc::new(self.open, self.high, self.low, self.close)
    }

    pub fn key(&self) -> BarKey {
        BarKey {
            symbol: self.symbol.clone(),
            granularity: self.granularity,
            start_time: self.start_time,
        }
    }

    /// Basic OHLC sanity check: finite prices inside `[low, high]`, positive span.
    pub fn is_sane(&self) -> bool {
        self.check().is_ok()
    }

    fn check(&self) -> Result<(), BarError> {
        if self.start_time >= self.end_time {
            return Err(BarError::EmptySpan {
                start: self.start_time,
                end: self.end_time,
            });
        }
        for (name, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if !value.is_finite() {
                return Err(BarError::NonFinite { field: name, value });
            }
        }
        if self.high < self.low {
            return Err(BarError::InvertedRange {
                high: self.high,
                low: self.low,
            });
        }
        for (name, value) in [("open", self.open), ("close", self.close)] {
            if value < self.low || value > self.high {
                return Err(BarError::OutsideRange {
                    field: name,
                    value,
                    low: self.low,
                    high: self.high,
                });
            }
        }
        Ok(())
    }
}

/// Identity of a bar: one per `(symbol, granularity, start_time)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BarKey {
    pub symbol: SymbolId,
    pub granularity: Granularity,
    pub start_time: NaiveDateTime,
}

#[derive(Debug, Error, PartialEq)]
pub enum BarError {
    #[error("bar span is empty: start {start} is not before end {end}")]
    EmptySpan {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("{field} is not finite ({value})")]
    NonFinite { field: &'static str, value: f64 },

    #[error("high {high} is below low {low}")]
    InvertedRange { high: f64, low: f64 },

    #[error("{field} {value} lies outside [{low}, {high}]")]
    OutsideRange {
        field: &'static str,
        value: f64,
        low: f64,
        high: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, 10)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn sample_bar() -> Bar {
        Bar::new(
            SymbolId::new("SPY"),
            Granularity::FIVE_MINUTES,
            start(),
            Ohlc::new(100.0, 105.0, 98.0, 103.0),
            50_000,
        )
        .unwrap()
    }

    #[test]
    fn bar_is_sane() {
        let bar = sample_bar();
        assert!(bar.is_sane());
        assert_eq!(bar.end_time - bar.start_time, chrono::Duration::minutes(5));
    }

    #[test]
    fn nan_price_is_not_sane() {
        let mut bar = sample_bar();
        bar.open = f64::NAN;
        assert!(!bar.is_sane());
    }

    #[test]
    fn new_rejects_inverted_high_low() {
        let err = Bar::new(
            SymbolId::new("SPY"),
            Granularity::FIVE_MINUTES,
            start(),
            Ohlc::new(100.0, 97.0, 98.0, 97.5),
            10,
        )
        .unwrap_err();
        assert!(matches!(err, BarError::InvertedRange { .. }));
    }

    #[test]
    fn new_rejects_close_above_high() {
        let err = Bar::new(
            SymbolId::new("SPY"),
            Granularity::FIVE_MINUTES,
            start(),
            Ohlc::new(100.0, 101.0, 99.0, 102.0),
            10,
        )
        .unwrap_err();
        assert!(matches!(err, BarError::OutsideRange { field: "close", .. }));
    }

    #[test]
    fn empty_span_is_not_sane() {
        let mut bar = sample_bar();
        bar.end_time = bar.start_time;
        assert!(!bar.is_sane());
    }

    #[test]
    fn key_identifies_symbol_granularity_and_start() {
        let bar = sample_bar();
        let mut later = sample_bar();
        later.start_time += chrono::Duration::minutes(5);
        later.end_time += chrono::Duration::minutes(5);

        assert_eq!(bar.key().symbol, SymbolId::new("SPY"));
        assert_eq!(bar.key(), sample_bar().key());
        assert!(bar.key() < later.key());
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let bar = sample_bar();
        let json = serde_json::to_string(&bar).unwrap();
        let deser: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, deser);
    }
}
