//! End-to-end scanner tests through the `BarStore` seam.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use volbreak_core::data::{BarStore, InMemoryStore};
use volbreak_core::domain::{sort_for_presentation, Bar, Granularity, Ohlc, PriceField, SymbolId};
use volbreak_core::stats::Statistic;
use volbreak_core::{
    scan, statistic_at, BarAggregator, BreakoutScanner, Reference, ScanParams, StatRequest,
    WindowPolicy,
};

fn day(d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 4, d)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

fn series(symbol: &str, start: NaiveDateTime, granularity: Granularity, volumes: &[u64]) -> Vec<Bar> {
    let step = i64::from(granularity.minutes());
    volumes
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            Bar::new(
                SymbolId::new(symbol),
                granularity,
                start + Duration::minutes(step * i as i64),
                Ohlc::new(20.0, 21.0, 19.5, 20.5),
                v,
            )
            .unwrap()
        })
        .collect()
}

fn spike(len: usize, at: usize, base: u64, peak: u64) -> Vec<u64> {
    (0..len).map(|i| if i == at { peak } else { base }).collect()
}

#[test]
fn nineteen_quiet_bars_then_a_spike() {
    let store = InMemoryStore::from_bars(series(
        "AAPL",
        day(10),
        Granularity::FIVE_MINUTES,
        &spike(20, 19, 1000, 50_000),
    ));

    let records = scan(&store, &[SymbolId::new("AAPL")], &ScanParams::default()).unwrap();

    assert_eq!(records.len(), 1);
    assert!((records[0].ratio - 50.0).abs() < 1e-9);
    assert_eq!(records[0].timestamp, day(10) + Duration::minutes(95));
}

#[test]
fn fifteen_bars_are_insufficient_for_a_twenty_bar_lookback() {
    let bars = series("AAPL", day(10), Granularity::FIVE_MINUTES, &spike(15, 14, 1000, 90_000));
    let store = InMemoryStore::from_bars(bars.clone());

    for statistic in [
        Statistic::Sma,
        Statistic::AdjustedSma,
        Statistic::Ema,
        Statistic::StdDev,
    ] {
        let request = StatRequest {
            symbol: SymbolId::new("AAPL"),
            granularity: Granularity::FIVE_MINUTES,
            field: PriceField::Volume,
            statistic,
            period: 20,
            reference: Reference::Bar(bars[14].start_time),
            policy: WindowPolicy::ByCount,
        };
        assert_eq!(statistic_at(&store, &request).unwrap(), None);
    }

    let records = scan(&store, &[SymbolId::new("AAPL")], &ScanParams::default()).unwrap();
    assert!(records.is_empty());
}

#[test]
fn scanning_twice_is_idempotent() {
    let mut volumes = spike(60, 30, 1000, 40_000);
    volumes[45] = 25_000;
    let store = InMemoryStore::from_bars(series("MSFT", day(10), Granularity::FIVE_MINUTES, &volumes));
    let symbols = [SymbolId::new("MSFT")];

    let first = scan(&store, &symbols, &ScanParams::default()).unwrap();
    let second = scan(&store, &symbols, &ScanParams::default()).unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
}

#[test]
fn count_window_spans_overnight_gap_but_legacy_window_does_not() {
    // Ten bars at the end of one session, ten at the start of the next; the
    // spike is the 20th bar overall, right after the overnight gap.
    let mut bars = series("NVDA", day(9) + Duration::minutes(340), Granularity::FIVE_MINUTES, &[1000; 10]);
    bars.extend(series("NVDA", day(10), Granularity::FIVE_MINUTES, &spike(10, 9, 1000, 30_000)));
    let store = InMemoryStore::from_bars(bars);
    let symbols = [SymbolId::new("NVDA")];

    let by_count = scan(&store, &symbols, &ScanParams::default()).unwrap();
    assert_eq!(by_count.len(), 1);

    let legacy = ScanParams {
        window_policy: WindowPolicy::ByElapsedTime,
        ..ScanParams::default()
    };
    assert!(scan(&store, &symbols, &legacy).unwrap().is_empty());
}

#[test]
fn one_minute_history_aggregated_before_scanning() {
    // 100 one-minute bars: twenty 5-minute bars, the last holding a spike.
    let mut volumes = vec![200; 100];
    for v in volumes.iter_mut().skip(95) {
        *v = 10_000;
    }
    let minutes = series("AMD", day(10), Granularity::ONE_MINUTE, &volumes);
    let five = BarAggregator::between(Granularity::ONE_MINUTE, Granularity::FIVE_MINUTES)
        .unwrap()
        .aggregate(&minutes);
    assert_eq!(five.len(), 20);

    let scan = BreakoutScanner::new(ScanParams::default()).scan_bars(&SymbolId::new("AMD"), &five);
    assert_eq!(scan.records.len(), 1);
    assert_eq!(scan.records[0].volume, 50_000);
    assert!((scan.records[0].ratio - 50.0).abs() < 1e-9);
}

#[test]
fn multi_symbol_records_sort_for_presentation() {
    let mut bars = series("AAA", day(10), Granularity::FIVE_MINUTES, &spike(25, 22, 1000, 90_000));
    bars.extend(series("BBB", day(10), Granularity::FIVE_MINUTES, &spike(25, 22, 1000, 90_000)));
    bars.extend(series("CCC", day(11), Granularity::FIVE_MINUTES, &spike(25, 20, 1000, 90_000)));
    let store = InMemoryStore::from_bars(bars);
    let symbols: Vec<SymbolId> = store.list_symbols().unwrap().into_iter().collect();

    let mut records = scan(&store, &symbols, &ScanParams::default()).unwrap();
    sort_for_presentation(&mut records);

    let order: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(order, vec!["CCC", "AAA", "BBB"]);
}
