//! Lookback window selection.
//!
//! A window is exactly `period` bars of one granularity ending at or before a
//! reference point. Selection is by count by default, so overnight and
//! holiday gaps do not shrink the window. There are no partial windows: the
//! selector yields `None` when fewer than `period` bars qualify or when the
//! reference bar does not exist.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::data::{BarStore, StoreError};
use crate::domain::{Bar, Granularity, PriceField, SymbolId};
use crate::stats::Statistic;

/// How the bars of a window are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPolicy {
    /// The `period` most recent bars at or before the reference, whatever their spacing.
    #[default]
    ByCount,
    /// Legacy selection: only bars starting within `period × granularity` of the
    /// reference and aligned to the granularity. Gaps make the window insufficient.
    ByElapsedTime,
}

/// Point a window ends at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    /// A specific bar, identified by its start time. The bar must exist.
    Bar(NaiveDateTime),
    /// Any timestamp; the window ends at the latest bar starting at or before it.
    AsOf(NaiveDateTime),
}

impl Reference {
    pub fn time(&self) -> NaiveDateTime {
        match self {
            Reference::Bar(t) | Reference::AsOf(t) => *t,
        }
    }
}

/// Exactly `period` bars, stored oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Window<'a> {
    bars: Cow<'a, [Bar]>,
}

impl<'a> Window<'a> {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Most recent bar of the window.
    pub fn anchor(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn recent_first(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter().rev()
    }

    pub fn chronological(&self) -> &[Bar] {
        &self.bars
    }

    /// Field values oldest first, ready for a statistic.
    pub fn values(&self, field: PriceField) -> Vec<f64> {
        self.bars.iter().map(|b| field.extract(b)).collect()
    }

    pub fn into_owned(self) -> Window<'static> {
        Window {
            bars: Cow::Owned(self.bars.into_owned()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowSelector {
    policy: WindowPolicy,
}

impl WindowSelector {
    pub fn new(policy: WindowPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    /// Select a window from a store.
    pub fn select<S: BarStore + ?Sized>(
        &self,
        store: &S,
        symbol: &SymbolId,
        granularity: Granularity,
        reference: Reference,
        period: usize,
    ) -> Result<Option<Window<'static>>, StoreError> {
        if period == 0 {
            return Ok(None);
        }
        let at = reference.time();
        let limit = match self.policy {
            WindowPolicy::ByCount => period,
            // Upper bound on minute-aligned starts inside the elapsed span.
            WindowPolicy::ByElapsedTime => {
                period.saturating_mul(granularity.minutes() as usize).saturating_add(1)
            }
        };
        let recent = store.get_bars(symbol, granularity, at, limit)?;

        if let Reference::Bar(start) = reference {
            if recent.first().map(|b| b.start_time) != Some(start) {
                return Ok(None);
            }
        }

        let mut chosen: Vec<Bar> = match self.policy {
            WindowPolicy::ByCount => recent,
            WindowPolicy::ByElapsedTime => {
                let lower = elapsed_lower_bound(at, granularity, period);
                recent
                    .into_iter()
                    .filter(|b| b.start_time >= lower && granularity.is_aligned(b.start_time))
                    .take(period)
                    .collect()
            }
        };
        if chosen.len() < period {
            return Ok(None);
        }
        chosen.reverse();
        Ok(Some(Window {
            bars: Cow::Owned(chosen),
        }))
    }

    /// Select the window ending at `history[end_index]` from a chronological history.
    pub fn select_in<'a>(
        &self,
        history: &'a [Bar],
        end_index: usize,
        period: usize,
    ) -> Option<Window<'a>> {
        if period == 0 || end_index >= history.len() {
            return None;
        }
        match self.policy {
            WindowPolicy::ByCount => {
                let start = (end_index + 1).checked_sub(period)?;
                Some(Window {
                    bars: Cow::Borrowed(&history[start..=end_index]),
                })
            }
            WindowPolicy::ByElapsedTime => {
                let anchor = &history[end_index];
                let lower = elapsed_lower_bound(anchor.start_time, anchor.granularity, period);
                let mut chosen: Vec<Bar> = history[..=end_index]
                    .iter()
                    .rev()
                    .take_while(|b| b.start_time >= lower)
                    .filter(|b| anchor.granularity.is_aligned(b.start_time))
                    .take(period)
                    .cloned()
                    .collect();
                if chosen.len() < period {
                    return None;
                }
                chosen.reverse();
                Some(Window {
                    bars: Cow::Owned(chosen),
                })
            }
        }
    }
}

fn elapsed_lower_bound(at: NaiveDateTime, granularity: Granularity, period: usize) -> NaiveDateTime {
    // Capped well inside chrono's representable range.
    const MAX_SPAN_MINUTES: i64 = 1_000_000_000;
    let minutes = i64::try_from(period)
        .unwrap_or(i64::MAX)
        .saturating_mul(i64::from(granularity.minutes()))
        .min(MAX_SPAN_MINUTES);
    at.checked_sub_signed(Duration::minutes(minutes))
        .unwrap_or(NaiveDateTime::MIN)
}

// ─── Point statistics ───────────────────────────────────────────────

/// A single statistic of one field over one window.
#[derive(Debug, Clone, PartialEq)]
pub struct StatRequest {
    pub symbol: SymbolId,
    pub granularity: Granularity,
    pub field: PriceField,
    pub statistic: Statistic,
    pub period: usize,
    pub reference: Reference,
    pub policy: WindowPolicy,
}

/// Select the window for `request` and compute its statistic.
///
/// `Ok(None)` covers insufficient data, an unknown reference bar and an
/// undefined statistic alike.
pub fn statistic_at<S: BarStore + ?Sized>(
    store: &S,
    request: &StatRequest,
) -> Result<Option<f64>, StoreError> {
    let selector = WindowSelector::new(request.policy);
    let window = selector.select(
        store,
        &request.symbol,
        request.granularity,
        request.reference,
        request.period,
    )?;
    Ok(window.and_then(|w| {
        request
            .statistic
            .compute(&w.values(request.field), request.period)
    }))
}
