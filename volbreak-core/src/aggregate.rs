//! Bar aggregation: build coarse bars from runs of finer ones.
//!
//! A synthetic bar of granularity `k × native` is emitted only for a run of
//! exactly `k` native bars that starts on a boundary aligned to the coarse
//! granularity and has no gaps. Misaligned or broken runs are skipped, never
//! padded or shifted. A trailing run shorter than `k` produces nothing.

use crate::domain::{Bar, Granularity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarAggregator {
    multiple: usize,
}

impl BarAggregator {
    pub fn new(multiple: usize) -> Self {
        Self { multiple }
    }

    /// Aggregator from `native` to `target`, if `target` is a whole multiple of `native`.
    pub fn between(native: Granularity, target: Granularity) -> Option<Self> {
        target.multiple_of(native).map(Self::new)
    }

    pub fn multiple(&self) -> usize {
        self.multiple
    }

    /// Aggregate chronologically ordered bars of a single symbol and granularity.
    pub fn aggregate(&self, bars: &[Bar]) -> Vec<Bar> {
        let k = self.multiple;
        if k == 0 || bars.len() < k {
            return Vec::new();
        }
        let native = bars[0].granularity;
        let Some(target) = u32::try_from(k)
            .ok()
            .and_then(|k| native.minutes().checked_mul(k))
            .and_then(|m| Granularity::from_minutes(m).ok())
        else {
            return Vec::new();
        };

        let mut out = Vec::with_capacity(bars.len() / k);
        let mut i = 0;
        while i + k <= bars.len() {
            let run = &bars[i..i + k];
            if target.is_aligned(run[0].start_time) && is_contiguous(run, native) {
                out.push(merge(run, target));
                i += k;
            } else {
                i += 1;
            }
        }
        out
    }
}

fn is_contiguous(run: &[Bar], native: Granularity) -> bool {
    run.iter().all(|b| b.granularity == native)
        && run.windows(2).all(|w| w[1].start_time == w[0].end_time)
}

fn merge(run: &[Bar], target: Granularity) -> Bar {
    let first = &run[0];
    let last = &run[run.len() - 1];
    Bar {
        symbol: first.symbol.clone(),
        granularity: target,
        start_time: first.start_time,
        end_time: last.end_time,
        open: first.open,
        high: run.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max),
        low: run.iter().map(|b| b.low).fold(f64::INFINITY, f64::min),
        close: last.close,
        volume: run.iter().map(|b| b.volume).sum(),
    }
}
