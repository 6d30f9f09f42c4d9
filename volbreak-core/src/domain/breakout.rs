//! Breakout records emitted by the scanner.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::{Granularity, Ohlc, SymbolId};

/// One abnormal-volume event: a bar whose volume exceeded the baseline by
/// more than the configured ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutRecord {
    pub symbol: SymbolId,
    pub timestamp: NaiveDateTime,
    pub granularity: Granularity,
    pub volume: u64,
    pub baseline: f64,
    pub ratio: f64,
    pub ohlc: Ohlc,
}

/// Presentation order: newest date first, newest time first, then symbol ascending.
pub fn presentation_order(a: &BreakoutRecord, b: &BreakoutRecord) -> Ordering {
    b.timestamp
        .date()
        .cmp(&a.timestamp.date())
        .then_with(|| b.timestamp.time().cmp(&a.timestamp.time()))
        .then_with(|| a.symbol.cmp(&b.symbol))
}

pub fn sort_for_presentation(records: &mut [BreakoutRecord]) {
    records.sort_by(presentation_order);
}
