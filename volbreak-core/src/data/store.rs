//! Bar store abstraction and the in-memory implementation.
//!
//! The core never talks to storage directly: window selection and scanning go
//! through [`BarStore`], which answers "the most recent N bars at or before T".

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::domain::{Bar, Granularity, SymbolId, SymbolInfo};

/// Read access to stored bars.
///
/// Implementations must be shareable across scan worker threads.
pub trait BarStore: Send + Sync {
    /// Up to `limit` bars with `start_time <= up_to`, most recent first.
    fn get_bars(
        &self,
        symbol: &SymbolId,
        granularity: Granularity,
        up_to: NaiveDateTime,
        limit: usize,
    ) -> Result<Vec<Bar>, StoreError>;

    /// All symbols known to the store.
    fn list_symbols(&self) -> Result<BTreeSet<SymbolId>, StoreError>;

    /// Full chronological history of one symbol at one granularity.
    fn history(&self, symbol: &SymbolId, granularity: Granularity) -> Result<Vec<Bar>, StoreError> {
        let mut bars = self.get_bars(symbol, granularity, NaiveDateTime::MAX, usize::MAX)?;
        bars.reverse();
        Ok(bars)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store root does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parquet error: {0}")]
    ParquetError(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Ingest failed: {0}")]
    IngestFailed(String),

    #[error("Metadata error: {0}")]
    Metadata(String),
}

/// Bars held in memory, keyed by symbol and granularity.
///
/// Each series is kept sorted by `start_time` and unique on it; a later insert
/// of an existing start time is ignored.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    series: BTreeMap<(SymbolId, Granularity), Vec<Bar>>,
    symbols: BTreeMap<SymbolId, SymbolInfo>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from an arbitrary collection of bars.
    pub fn from_bars(bars: impl IntoIterator<Item = Bar>) -> Self {
        let mut store = Self::new();
        store.insert(bars);
        store
    }

    pub fn insert(&mut self, bars: impl IntoIterator<Item = Bar>) {
        for bar in bars {
            self.symbols
                .entry(bar.symbol.clone())
                .or_insert_with(|| SymbolInfo::new(bar.symbol.clone()));
            let series = self
                .series
                .entry((bar.symbol.clone(), bar.granularity))
                .or_default();
            match series.binary_search_by_key(&bar.start_time, |b| b.start_time) {
                Ok(_) => {}
                Err(pos) => series.insert(pos, bar),
            }
        }
    }

    /// Register a symbol, with or without bars.
    pub fn add_symbol(&mut self, info: SymbolInfo) {
        self.symbols.insert(info.id.clone(), info);
    }

    pub fn symbol_info(&self, symbol: &SymbolId) -> Option<&SymbolInfo> {
        self.symbols.get(symbol)
    }

    pub fn bar_count(&self, symbol: &SymbolId, granularity: Granularity) -> usize {
        self.series
            .get(&(symbol.clone(), granularity))
            .map_or(0, Vec::len)
    }
}

impl BarStore for InMemoryStore {
    fn get_bars(
        &self,
        symbol: &SymbolId,
        granularity: Granularity,
        up_to: NaiveDateTime,
        limit: usize,
    ) -> Result<Vec<Bar>, StoreError> {
        let Some(series) = self.series.get(&(symbol.clone(), granularity)) else {
            return Ok(Vec::new());
        };
        Ok(most_recent_first(series, up_to, limit))
    }

    fn list_symbols(&self) -> Result<BTreeSet<SymbolId>, StoreError> {
        Ok(self.symbols.keys().cloned().collect())
    }
}

/// Up to `limit` bars of a chronological series at or before `up_to`, newest first.
pub(crate) fn most_recent_first(series: &[Bar], up_to: NaiveDateTime, limit: usize) -> Vec<Bar> {
    let end = series.partition_point(|b| b.start_time <= up_to);
    series[..end].iter().rev().take(limit).cloned().collect()
}
