//! Symbol status — where each symbol's data stands at a point in time.
//!
//! For each symbol: the latest bar at or before `as_of`, how many bars lead up
//! to it, and the baseline the scanner would compute for that bar. When the
//! baseline is missing or zero the window's raw volumes are included so the
//! cause is visible.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use volbreak_core::data::BarStore;
use volbreak_core::domain::{Bar, PriceField, SymbolId};
use volbreak_core::{BaselineAnchor, WindowSelector};

use crate::config::ScanConfig;
use crate::data_loader::{load_history, SeriesSource};
use crate::scan::{resolve_symbols, ScanError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolStatus {
    pub symbol: SymbolId,
    pub source: SeriesSource,
    /// Start time of the latest bar at or before `as_of`.
    pub latest_bar: Option<NaiveDateTime>,
    /// Bars at or before `as_of`.
    pub bar_count: usize,
    pub latest_volume: Option<u64>,
    pub baseline: Option<f64>,
    pub ratio: Option<f64>,
    /// Volumes of the baseline window, oldest first. Only filled when the
    /// baseline is missing or zero.
    pub window_volumes: Vec<u64>,
}

impl SymbolStatus {
    fn empty(symbol: SymbolId, source: SeriesSource) -> Self {
        Self {
            symbol,
            source,
            latest_bar: None,
            bar_count: 0,
            latest_volume: None,
            baseline: None,
            ratio: None,
            window_volumes: Vec::new(),
        }
    }
}

/// Status of every resolved symbol as of `as_of`.
pub fn symbol_status<S: BarStore + ?Sized>(
    store: &S,
    config: &ScanConfig,
    as_of: NaiveDateTime,
    symbols: Option<&[SymbolId]>,
) -> Result<Vec<SymbolStatus>, ScanError> {
    config.validate()?;
    let symbols = resolve_symbols(store, config, symbols)?;
    let mut out = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let loaded = load_history(store, &symbol, config)?;
        let upto = loaded.bars.partition_point(|b| b.start_time <= as_of);
        out.push(status_of(symbol, loaded.source, &loaded.bars[..upto], config));
    }
    Ok(out)
}

fn status_of(symbol: SymbolId, source: SeriesSource, bars: &[Bar], config: &ScanConfig) -> SymbolStatus {
    let Some(latest) = bars.last() else {
        return SymbolStatus::empty(symbol, source);
    };
    let period = config.lookback_period;
    let latest_index = bars.len() - 1;
    let window_end = match config.anchor {
        BaselineAnchor::Inclusive => Some(latest_index),
        BaselineAnchor::Preceding => latest_index.checked_sub(1),
    };

    let selector = WindowSelector::new(config.window_policy);
    let window = window_end.and_then(|end| selector.select_in(bars, end, period));
    let baseline = window
        .as_ref()
        .and_then(|w| config.baseline.compute(&w.values(PriceField::Volume), period));
    let ratio = baseline
        .filter(|b| b.is_finite() && *b != 0.0)
        .map(|b| latest.volume as f64 / b);

    let window_volumes = if ratio.is_some() {
        Vec::new()
    } else if let Some(w) = &window {
        w.chronological().iter().map(|b| b.volume).collect()
    } else {
        // Partial window: whatever bars exist up to the window end.
        let end = window_end.map_or(0, |e| e + 1);
        bars[end.saturating_sub(period)..end]
            .iter()
            .map(|b| b.volume)
            .collect()
    };

    SymbolStatus {
        symbol,
        source,
        latest_bar: Some(latest.start_time),
        bar_count: bars.len(),
        latest_volume: Some(latest.volume),
        baseline,
        ratio,
        window_volumes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use volbreak_core::data::InMemoryStore;
    use volbreak_core::domain::{Granularity, Ohlc};

    fn open() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, 10)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn series(symbol: &str, volumes: &[u64]) -> Vec<Bar> {
        volumes
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                Bar::new(
                    SymbolId::new(symbol),
                    Granularity::FIVE_MINUTES,
                    open() + Duration::minutes(5 * i as i64),
                    Ohlc::flat(42.0),
                    v,
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn reports_baseline_for_latest_bar_before_as_of() {
        let mut volumes = vec![1_000; 30];
        volumes[29] = 99_000;
        let store = InMemoryStore::from_bars(series("AAPL", &volumes));

        // as_of just before the spike bar.
        let as_of = open() + Duration::minutes(5 * 28 + 2);
        let status = symbol_status(&store, &ScanConfig::default(), as_of, None).unwrap();
        assert_eq!(status.len(), 1);
        let s = &status[0];
        assert_eq!(s.latest_bar, Some(open() + Duration::minutes(5 * 28)));
        assert_eq!(s.bar_count, 29);
        assert_eq!(s.baseline, Some(1_000.0));
        assert_eq!(s.ratio, Some(1.0));
        assert!(s.window_volumes.is_empty());
    }

    #[test]
    fn zero_baseline_shows_window_volumes() {
        let store = InMemoryStore::from_bars(series("IDLE", &[0; 20]));
        let status =
            symbol_status(&store, &ScanConfig::default(), open() + Duration::days(1), None)
                .unwrap();
        let s = &status[0];
        assert_eq!(s.baseline, Some(0.0));
        assert_eq!(s.ratio, None);
        assert_eq!(s.window_volumes, vec![0; 20]);
    }

    #[test]
    fn short_history_has_no_baseline() {
        let store = InMemoryStore::from_bars(series("NEW", &[5, 6, 7]));
        let status =
            symbol_status(&store, &ScanConfig::default(), open() + Duration::days(1), None)
                .unwrap();
        let s = &status[0];
        assert_eq!(s.bar_count, 3);
        assert_eq!(s.baseline, None);
        assert_eq!(s.window_volumes, vec![5, 6, 7]);
    }

    #[test]
    fn nothing_before_as_of() {
        let store = InMemoryStore::from_bars(series("LATE", &[100; 5]));
        let status = symbol_status(
            &store,
            &ScanConfig::default(),
            open() - Duration::minutes(1),
            None,
        )
        .unwrap();
        assert_eq!(status[0], SymbolStatus::empty(SymbolId::new("LATE"), SeriesSource::Stored));
    }
}
