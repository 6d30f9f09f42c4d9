//! Property tests for statistics and aggregation invariants.
//!
//! Uses proptest to verify:
//! 1. Standard deviation is non-negative, and zero exactly for constant windows
//! 2. Adjusted SMA lies between the window's min and max
//! 3. EMA over exactly `period` values equals the SMA
//! 4. Aggregated bars conserve volume and bound prices
//! 5. Count-based windows are always exactly `period` bars

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use volbreak_core::domain::{Bar, Granularity, Ohlc, PriceField, SymbolId};
use volbreak_core::stats::{adjusted_sma, ema, sma, stddev};
use volbreak_core::{BarAggregator, WindowSelector};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_values(min_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0..1_000_000.0_f64, min_len..60)
}

fn arb_volumes() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0..100_000_u64, 0..80)
}

fn session_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 4, 10)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

fn minute_bars(volumes: &[u64]) -> Vec<Bar> {
    volumes
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let mid = 50.0 + (i % 7) as f64;
            Bar::new(
                SymbolId::new("PROP"),
                Granularity::ONE_MINUTE,
                session_start() + Duration::minutes(i as i64),
                Ohlc::new(mid, mid + 1.0 + (i % 3) as f64, mid - 1.0, mid + 0.5),
                v,
            )
            .unwrap()
        })
        .collect()
}

// ── 1. Standard deviation ────────────────────────────────────────────

proptest! {
    #[test]
    fn stddev_is_non_negative(values in arb_values(1)) {
        let period = values.len();
        let sd = stddev(&values, period).unwrap();
        prop_assert!(sd >= 0.0);
    }

    #[test]
    fn stddev_of_constant_window_is_zero(value in -1e6..1e6_f64, len in 1usize..50) {
        let values = vec![value; len];
        prop_assert_eq!(stddev(&values, len), Some(0.0));
    }

    #[test]
    fn stddev_of_distinct_values_is_positive(
        mantissas in prop::collection::vec(1.0..10.0_f64, 2..30),
        exponent in -300i32..300,
    ) {
        let scale = 10f64.powi(exponent);
        let values: Vec<f64> = mantissas.iter().map(|m| m * scale).collect();
        prop_assume!(values.iter().any(|&v| v != values[0]));
        prop_assert!(stddev(&values, values.len()).unwrap() > 0.0);
    }
}

// ── 2. Adjusted SMA bounds ───────────────────────────────────────────

proptest! {
    #[test]
    fn adjusted_sma_within_window_range(values in arb_values(3)) {
        let period = values.len();
        let adj = adjusted_sma(&values, period).unwrap();
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        prop_assert!(adj >= min - 1e-3 && adj <= max + 1e-3);
    }

    #[test]
    fn statistics_need_period_values(values in arb_values(0), extra in 1usize..10) {
        let period = values.len() + extra;
        prop_assert!(sma(&values, period).is_none());
        prop_assert!(adjusted_sma(&values, period).is_none());
        prop_assert!(ema(&values, period).is_none());
        prop_assert!(stddev(&values, period).is_none());
    }
}

// ── 3. EMA seed ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn ema_of_exactly_period_values_is_sma(values in arb_values(1)) {
        let period = values.len();
        let e = ema(&values, period).unwrap();
        let s = sma(&values, period).unwrap();
        prop_assert!((e - s).abs() <= 1e-9 * s.abs().max(1.0));
    }
}

// ── 4. Aggregation conservation ──────────────────────────────────────

proptest! {
    #[test]
    fn aggregation_conserves_volume_and_bounds(volumes in arb_volumes()) {
        let bars = minute_bars(&volumes);
        let out = BarAggregator::new(5).aggregate(&bars);

        // Contiguous, aligned input: every complete run of 5 becomes a bar.
        prop_assert_eq!(out.len(), bars.len() / 5);
        for (j, agg) in out.iter().enumerate() {
            let run = &bars[j * 5..j * 5 + 5];
            prop_assert_eq!(agg.volume, run.iter().map(|b| b.volume).sum::<u64>());
            prop_assert_eq!(agg.open, run[0].open);
            prop_assert_eq!(agg.close, run[4].close);
            prop_assert!(run.iter().all(|b| b.high <= agg.high && b.low >= agg.low));
            prop_assert!(agg.is_sane());
        }
    }
}

// ── 5. Count-based windows ───────────────────────────────────────────

proptest! {
    #[test]
    fn window_is_exactly_period_or_none(volumes in arb_volumes(), period in 1usize..30) {
        let bars = minute_bars(&volumes);
        let selector = WindowSelector::default();
        for end in 0..bars.len() {
            match selector.select_in(&bars, end, period) {
                Some(window) => {
                    prop_assert!(end + 1 >= period);
                    prop_assert_eq!(window.len(), period);
                    prop_assert_eq!(window.anchor().map(|b| b.start_time), Some(bars[end].start_time));
                    prop_assert_eq!(window.values(PriceField::Volume).len(), period);
                }
                None => prop_assert!(end + 1 < period),
            }
        }
    }
}
