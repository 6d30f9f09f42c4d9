//! Breakout scanner — walks a symbol's bar history and flags abnormal volume.
//!
//! For every bar with a full lookback window, the baseline statistic of volume
//! over the window is compared with the bar's own volume. A bar whose
//! `volume / baseline` exceeds the threshold becomes a [`BreakoutRecord`].
//! Insufficient windows and zero or undefined baselines are skipped, not errors.
//! The scanner holds no state between calls: scanning the same bars twice
//! yields the same records.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{BarStore, StoreError};
use crate::domain::{Bar, BreakoutRecord, Granularity, PriceField, SymbolId};
use crate::stats::Statistic;
use crate::window::{WindowPolicy, WindowSelector};

/// Where the baseline window ends relative to the bar being tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineAnchor {
    /// Window ends at the tested bar (the bar is part of its own baseline).
    #[default]
    Inclusive,
    /// Window is the `lookback_period` bars strictly before the tested bar.
    Preceding,
}

/// Scan parameters. Defaults: 5-minute bars, 20-bar lookback, ratio above 10.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanParams {
    pub granularity: Granularity,
    pub lookback_period: usize,
    pub ratio_threshold: f64,
    pub baseline: Statistic,
    pub anchor: BaselineAnchor,
    pub window_policy: WindowPolicy,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            granularity: Granularity::FIVE_MINUTES,
            lookback_period: 20,
            ratio_threshold: 10.0,
            baseline: Statistic::AdjustedSma,
            anchor: BaselineAnchor::Inclusive,
            window_policy: WindowPolicy::ByCount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InsufficientData,
    DegenerateBaseline,
}

/// Outcome of testing one bar.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Breakout(BreakoutRecord),
    BelowThreshold { baseline: f64, ratio: f64 },
    Skipped(SkipReason),
}

/// Per-symbol counters for one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub bars: usize,
    pub evaluated: usize,
    pub breakouts: usize,
    pub skipped_insufficient: usize,
    pub skipped_degenerate: usize,
}

/// Records and counters for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolScan {
    pub symbol: SymbolId,
    pub records: Vec<BreakoutRecord>,
    pub summary: ScanSummary,
}

#[derive(Debug, Clone)]
pub struct BreakoutScanner {
    params: ScanParams,
    selector: WindowSelector,
}

impl BreakoutScanner {
    pub fn new(params: ScanParams) -> Self {
        let selector = WindowSelector::new(params.window_policy);
        Self { params, selector }
    }

    pub fn params(&self) -> &ScanParams {
        &self.params
    }

    /// Test the bar at `index` of a chronological history.
    pub fn evaluate(&self, history: &[Bar], index: usize) -> Evaluation {
        let Some(bar) = history.get(index) else {
            return Evaluation::Skipped(SkipReason::InsufficientData);
        };
        let period = self.params.lookback_period;

        let window_end = match self.params.anchor {
            BaselineAnchor::Inclusive => Some(index),
            BaselineAnchor::Preceding => index.checked_sub(1),
        };
        let Some(window) = window_end.and_then(|end| self.selector.select_in(history, end, period))
        else {
            return Evaluation::Skipped(SkipReason::InsufficientData);
        };

        let baseline = match self
            .params
            .baseline
            .compute(&window.values(PriceField::Volume), period)
        {
            Some(b) if b.is_finite() && b != 0.0 => b,
            _ => return Evaluation::Skipped(SkipReason::DegenerateBaseline),
        };

        let ratio = bar.volume as f64 / baseline;
        if ratio > self.params.ratio_threshold {
            Evaluation::Breakout(BreakoutRecord {
                symbol: bar.symbol.clone(),
                timestamp: bar.start_time,
                granularity: bar.granularity,
                volume: bar.volume,
                baseline,
                ratio,
                ohlc: bar.ohlc(),
            })
        } else {
            Evaluation::BelowThreshold { baseline, ratio }
        }
    }

    /// Scan a chronological history of one symbol. Records come out oldest first.
    pub fn scan_bars(&self, symbol: &SymbolId, history: &[Bar]) -> SymbolScan {
        let mut records = Vec::new();
        let mut summary = ScanSummary {
            bars: history.len(),
            ..ScanSummary::default()
        };

        for index in 0..history.len() {
            match self.evaluate(history, index) {
                Evaluation::Breakout(record) => {
                    summary.evaluated += 1;
                    summary.breakouts += 1;
                    records.push(record);
                }
                Evaluation::BelowThreshold { .. } => summary.evaluated += 1,
                Evaluation::Skipped(SkipReason::InsufficientData) => {
                    summary.skipped_insufficient += 1
                }
                Evaluation::Skipped(SkipReason::DegenerateBaseline) => {
                    summary.skipped_degenerate += 1
                }
            }
        }

        debug!(
            symbol = %symbol,
            bars = summary.bars,
            evaluated = summary.evaluated,
            breakouts = summary.breakouts,
            "scanned symbol"
        );

        SymbolScan {
            symbol: symbol.clone(),
            records,
            summary,
        }
    }

    /// Load a symbol's history at the scan granularity and scan it.
    pub fn scan_store<S: BarStore + ?Sized>(
        &self,
        store: &S,
        symbol: &SymbolId,
    ) -> Result<SymbolScan, StoreError> {
        let history = store.history(symbol, self.params.granularity)?;
        Ok(self.scan_bars(symbol, &history))
    }
}

/// Scan every symbol in order and concatenate their records.
///
/// The first store failure aborts the scan; the runner's `run_scan` isolates
/// failures per symbol instead.
pub fn scan<S: BarStore + ?Sized>(
    store: &S,
    symbols: &[SymbolId],
    params: &ScanParams,
) -> Result<Vec<BreakoutRecord>, StoreError> {
    let scanner = BreakoutScanner::new(params.clone());
    let mut records = Vec::new();
    for symbol in symbols {
        records.extend(scanner.scan_store(store, symbol)?.records);
    }
    Ok(records)
}
