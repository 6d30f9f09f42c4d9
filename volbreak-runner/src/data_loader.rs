//! History loading for the runner.
//!
//! Resolves the bars a scan runs on. The policy:
//! 1. If the store holds a series at the scan granularity, use it.
//! 2. Otherwise, if it holds the native series, aggregate it up.
//! 3. Otherwise the history is empty and the symbol yields no records.

use serde::{Deserialize, Serialize};
use tracing::debug;
use volbreak_core::data::{BarStore, StoreError};
use volbreak_core::domain::{Bar, Granularity, SymbolId};
use volbreak_core::BarAggregator;

use crate::config::ScanConfig;

/// Where a symbol's scan history came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeriesSource {
    /// Read directly at the scan granularity.
    Stored,
    /// Aggregated from a finer stored series.
    Aggregated { from: Granularity },
    /// No usable series in the store.
    Missing,
}

/// A symbol's chronological history at the scan granularity.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub bars: Vec<Bar>,
    pub source: SeriesSource,
}

/// Load `symbol`'s history at `config.granularity`, aggregating from
/// `config.native_granularity` when the target series is absent.
pub fn load_history<S: BarStore + ?Sized>(
    store: &S,
    symbol: &SymbolId,
    config: &ScanConfig,
) -> Result<LoadedSeries, StoreError> {
    let bars = store.history(symbol, config.granularity)?;
    if !bars.is_empty() {
        return Ok(LoadedSeries {
            bars,
            source: SeriesSource::Stored,
        });
    }

    if config.native_granularity != config.granularity {
        if let Some(aggregator) = BarAggregator::between(config.native_granularity, config.granularity)
        {
            let native = store.history(symbol, config.native_granularity)?;
            if !native.is_empty() {
                let bars = aggregator.aggregate(&native);
                debug!(
                    symbol = %symbol,
                    native = native.len(),
                    aggregated = bars.len(),
                    from = %config.native_granularity,
                    to = %config.granularity,
                    "aggregated history"
                );
                return Ok(LoadedSeries {
                    bars,
                    source: SeriesSource::Aggregated {
                        from: config.native_granularity,
                    },
                });
            }
        }
    }

    Ok(LoadedSeries {
        bars: Vec::new(),
        source: SeriesSource::Missing,
    })
}
