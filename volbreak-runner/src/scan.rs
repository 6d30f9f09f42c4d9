//! Multi-symbol scan orchestration.
//!
//! Symbols are independent, so they are scanned in parallel with rayon. The
//! per-symbol results are collected back in symbol order: the report is the
//! same whatever the thread count. A store failure on one symbol is logged and
//! recorded in the report; the other symbols still run.

use chrono::{NaiveDateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{info, warn};
use volbreak_core::data::{BarStore, StoreError};
use volbreak_core::domain::{BreakoutRecord, SymbolId};
use volbreak_core::{BreakoutScanner, ScanSummary};

use crate::config::{ConfigError, ScanConfig};
use crate::data_loader::{load_history, SeriesSource};

/// Errors that abort a whole scan. Per-symbol store failures do not.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
}

/// Current report schema version. Bump on breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// How one symbol fared in a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolOutcome {
    pub symbol: SymbolId,
    pub source: SeriesSource,
    pub summary: ScanSummary,
    /// Store failure message, when the symbol could not be loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Complete result of one scan run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub config: ScanConfig,
    pub config_hash: String,
    pub generated_at: NaiveDateTime,
    /// Records in symbol order, oldest first within a symbol.
    pub records: Vec<BreakoutRecord>,
    pub symbols: Vec<SymbolOutcome>,
}

impl ScanReport {
    /// Symbols whose history could not be loaded.
    pub fn failures(&self) -> impl Iterator<Item = &SymbolOutcome> {
        self.symbols.iter().filter(|s| s.error.is_some())
    }

    /// Counters summed over every symbol.
    pub fn totals(&self) -> ScanSummary {
        self.symbols
            .iter()
            .fold(ScanSummary::default(), |mut acc, s| {
                acc.bars += s.summary.bars;
                acc.evaluated += s.summary.evaluated;
                acc.breakouts += s.summary.breakouts;
                acc.skipped_insufficient += s.summary.skipped_insufficient;
                acc.skipped_degenerate += s.summary.skipped_degenerate;
                acc
            })
    }
}

/// Resolve the symbols to scan: the explicit list, else the config filter,
/// else everything in the store. Sorted and deduplicated.
pub fn resolve_symbols<S: BarStore + ?Sized>(
    store: &S,
    config: &ScanConfig,
    symbols: Option<&[SymbolId]>,
) -> Result<Vec<SymbolId>, StoreError> {
    let chosen: BTreeSet<SymbolId> = match (symbols, config.symbol_filter()) {
        (Some(explicit), _) => explicit.iter().cloned().collect(),
        (None, Some(filter)) => filter.into_iter().collect(),
        (None, None) => store.list_symbols()?,
    };
    Ok(chosen.into_iter().collect())
}

/// Scan `symbols` (or the configured/stored set) and build a report.
pub fn run_scan<S: BarStore + ?Sized>(
    store: &S,
    config: &ScanConfig,
    symbols: Option<&[SymbolId]>,
) -> Result<ScanReport, ScanError> {
    config.validate()?;
    let symbols = resolve_symbols(store, config, symbols)?;
    let scanner = BreakoutScanner::new(config.params());

    let scan_one = |symbol: &SymbolId| -> (SymbolOutcome, Vec<BreakoutRecord>) {
        match load_history(store, symbol, config) {
            Ok(loaded) => {
                let scan = scanner.scan_bars(symbol, &loaded.bars);
                let outcome = SymbolOutcome {
                    symbol: symbol.clone(),
                    source: loaded.source,
                    summary: scan.summary,
                    error: None,
                };
                (outcome, scan.records)
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "skipping symbol: store failure");
                let outcome = SymbolOutcome {
                    symbol: symbol.clone(),
                    source: SeriesSource::Missing,
                    summary: ScanSummary::default(),
                    error: Some(e.to_string()),
                };
                (outcome, Vec::new())
            }
        }
    };

    let results: Vec<(SymbolOutcome, Vec<BreakoutRecord>)> = match config.threads {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| ScanError::ThreadPool(e.to_string()))?
            .install(|| symbols.par_iter().map(scan_one).collect()),
        None => symbols.par_iter().map(scan_one).collect(),
    };

    let mut outcomes = Vec::with_capacity(results.len());
    let mut records = Vec::new();
    for (outcome, mut symbol_records) in results {
        outcomes.push(outcome);
        records.append(&mut symbol_records);
    }

    let report = ScanReport {
        schema_version: SCHEMA_VERSION,
        config: config.clone(),
        config_hash: config.config_hash()?,
        generated_at: Utc::now().naive_utc(),
        records,
        symbols: outcomes,
    };

    let totals = report.totals();
    info!(
        symbols = report.symbols.len(),
        failed = report.failures().count(),
        bars = totals.bars,
        breakouts = totals.breakouts,
        "scan complete"
    );
    Ok(report)
}
