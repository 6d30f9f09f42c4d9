//! Parquet bar store with Hive-style partitioning.
//!
//! Layout:
//! - `{root}/symbol={SYMBOL}/symbol.json` (symbol metadata)
//! - `{root}/symbol={SYMBOL}/granularity={G}/{YYYY-MM}.parquet`
//! - `{root}/symbol={SYMBOL}/granularity={G}/meta.json` (count, range, hash)
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Merge on write: new bars are added to existing month partitions,
//!   existing bars win on duplicate start times
//! - Integrity validation on load (schema check, row count > 0)
//! - Quarantine for corrupt files ({filename}.quarantined)
//! - In-session cache of loaded series, dropped with the store handle

use super::canonicalize::Canonicalizer;
use super::schema::BarSchema;
use super::store::{most_recent_first, BarStore, StoreError};
use crate::domain::{Bar, Granularity, SymbolId, SymbolInfo};
use chrono::{DateTime, Datelike, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Metadata sidecar for one symbol+granularity series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMeta {
    pub symbol: SymbolId,
    pub granularity: Granularity,
    pub bar_count: usize,
    pub first_start: NaiveDateTime,
    pub last_start: NaiveDateTime,
    pub data_hash: String,
    pub written_at: NaiveDateTime,
}

/// What a `write_bars` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub received: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub written: usize,
}

/// Stored bars of one series, as reported by [`ParquetStore::inventory`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesInventory {
    pub granularity: Granularity,
    pub bars: usize,
    pub first_start: Option<NaiveDateTime>,
    pub last_start: Option<NaiveDateTime>,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolInventory {
    pub symbol: SymbolId,
    pub info: Option<SymbolInfo>,
    pub series: Vec<SeriesInventory>,
}

impl SymbolInventory {
    pub fn total_bars(&self) -> usize {
        self.series.iter().map(|s| s.bars).sum()
    }

    pub fn has(&self, granularity: Granularity) -> bool {
        self.series
            .iter()
            .any(|s| s.granularity == granularity && s.bars > 0)
    }
}

/// Duplicated start times found in the raw partitions of one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateReport {
    pub symbol: SymbolId,
    pub granularity: Granularity,
    pub duplicate_rows: usize,
}

type SeriesKey = (SymbolId, Granularity);

/// File-backed bar store.
///
/// Open one handle per invocation; the session cache lives as long as the handle.
pub struct ParquetStore {
    root: PathBuf,
    cache: Mutex<HashMap<SeriesKey, Arc<Vec<Bar>>>>,
}

impl ParquetStore {
    /// Open a store, creating the root directory if needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| StoreError::Io(format!("failed to create {}: {e}", root.display())))?;
        Self::open(root)
    }

    /// Open an existing store.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::RootNotFound(root));
        }
        debug!(root = %root.display(), "opened parquet store");
        Ok(Self {
            root,
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a symbol: `{root}/symbol={SYMBOL}/`
    fn symbol_dir(&self, symbol: &SymbolId) -> PathBuf {
        self.root.join(format!("symbol={symbol}"))
    }

    /// Directory for a series: `{root}/symbol={SYMBOL}/granularity={G}/`
    fn series_dir(&self, symbol: &SymbolId, granularity: Granularity) -> PathBuf {
        self.symbol_dir(symbol)
            .join(format!("granularity={granularity}"))
    }

    fn partition_path(
        &self,
        symbol: &SymbolId,
        granularity: Granularity,
        (year, month): (i32, u32),
    ) -> PathBuf {
        self.series_dir(symbol, granularity)
            .join(format!("{year:04}-{month:02}.parquet"))
    }

    fn meta_path(&self, symbol: &SymbolId, granularity: Granularity) -> PathBuf {
        self.series_dir(symbol, granularity).join("meta.json")
    }

    fn info_path(&self, symbol: &SymbolId) -> PathBuf {
        self.symbol_dir(symbol).join("symbol.json")
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Merge bars for `symbol` into the store.
    ///
    /// Bars for another symbol or failing the OHLC sanity check are rejected.
    /// Bars are grouped by granularity and month; each touched partition is
    /// rewritten canonicalized (sorted, unique on start time, stored rows first).
    pub fn write_bars(&self, symbol: &SymbolId, bars: &[Bar]) -> Result<WriteSummary, StoreError> {
        check_symbol(symbol)?;
        let mut summary = WriteSummary {
            received: bars.len(),
            ..WriteSummary::default()
        };

        let mut by_partition: BTreeMap<(Granularity, (i32, u32)), Vec<Bar>> = BTreeMap::new();
        for bar in bars {
            if &bar.symbol != symbol || !bar.is_sane() {
                summary.rejected += 1;
                continue;
            }
            let month = (bar.start_time.year(), bar.start_time.month());
            by_partition
                .entry((bar.granularity, month))
                .or_default()
                .push(bar.clone());
        }
        if summary.rejected > 0 {
            warn!(symbol = %symbol, rejected = summary.rejected, "rejected invalid bars on write");
        }
        if by_partition.is_empty() {
            return Ok(summary);
        }

        let mut touched = BTreeSet::new();
        for ((granularity, month), new_bars) in by_partition {
            let dir = self.series_dir(symbol, granularity);
            fs::create_dir_all(&dir)
                .map_err(|e| StoreError::Io(format!("failed to create dir: {e}")))?;

            let path = self.partition_path(symbol, granularity, month);
            let existing = if path.exists() {
                self.load_or_quarantine(&path, symbol, granularity)
            } else {
                Vec::new()
            };

            let mut combined = existing.clone();
            combined.extend(new_bars);
            let received = combined.len();

            let mut df = Canonicalizer::canonicalize(bars_to_dataframe(&combined)?.lazy())
                .collect()
                .map_err(|e| StoreError::ParquetError(format!("canonicalize: {e}")))?;
            write_parquet_atomic(&mut df, &path)?;

            summary.duplicates += received - df.height();
            summary.written += df.height().saturating_sub(existing.len());
            touched.insert(granularity);
        }

        for granularity in touched {
            self.invalidate(symbol, granularity);
            self.refresh_meta(symbol, granularity)?;
        }
        if !self.info_path(symbol).exists() {
            self.put_symbol(&SymbolInfo::new(symbol.clone()))?;
        }

        debug!(
            symbol = %symbol,
            written = summary.written,
            duplicates = summary.duplicates,
            "wrote bars"
        );
        Ok(summary)
    }

    /// Write (or replace) a symbol's metadata.
    pub fn put_symbol(&self, info: &SymbolInfo) -> Result<(), StoreError> {
        check_symbol(&info.id)?;
        let dir = self.symbol_dir(&info.id);
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Io(format!("failed to create dir: {e}")))?;
        let json = serde_json::to_string_pretty(info)
            .map_err(|e| StoreError::Metadata(format!("symbol serialization: {e}")))?;
        fs::write(self.info_path(&info.id), json)
            .map_err(|e| StoreError::Io(format!("symbol write: {e}")))
    }

    /// Read a symbol's metadata; `Ok(None)` when the symbol was never registered.
    pub fn symbol_info(&self, symbol: &SymbolId) -> Result<Option<SymbolInfo>, StoreError> {
        let path = self.info_path(symbol);
        if !path.exists() {
            return Ok(None);
        }
        let content =
            fs::read_to_string(&path).map_err(|e| StoreError::Io(format!("symbol read: {e}")))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Metadata(format!("{}: {e}", path.display())))
    }

    /// Metadata sidecar of a series, if present and readable.
    pub fn meta(&self, symbol: &SymbolId, granularity: Granularity) -> Option<SeriesMeta> {
        let content = fs::read_to_string(self.meta_path(symbol, granularity)).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn refresh_meta(&self, symbol: &SymbolId, granularity: Granularity) -> Result<(), StoreError> {
        let bars = self.load_series(symbol, granularity)?;
        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            let _ = fs::remove_file(self.meta_path(symbol, granularity));
            return Ok(());
        };

        let meta = SeriesMeta {
            symbol: symbol.clone(),
            granularity,
            bar_count: bars.len(),
            first_start: first.start_time,
            last_start: last.start_time,
            data_hash: blake3::hash(
                &serde_json::to_vec(bars.as_slice())
                    .map_err(|e| StoreError::Metadata(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            written_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| StoreError::Metadata(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(symbol, granularity), meta_json)
            .map_err(|e| StoreError::Io(format!("meta write: {e}")))
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Granularities stored for a symbol.
    pub fn granularities(&self, symbol: &SymbolId) -> Result<BTreeSet<Granularity>, StoreError> {
        Ok(prefixed_entries(&self.symbol_dir(symbol), "granularity=")?
            .into_iter()
            .filter_map(|name| match name.parse::<Granularity>() {
                Ok(g) => Some(g),
                Err(e) => {
                    warn!(symbol = %symbol, dir = %name, "ignoring granularity directory: {e}");
                    None
                }
            })
            .collect())
    }

    /// Chronological, de-duplicated series, served from the session cache when loaded before.
    fn load_series(
        &self,
        symbol: &SymbolId,
        granularity: Granularity,
    ) -> Result<Arc<Vec<Bar>>, StoreError> {
        let key = (symbol.clone(), granularity);
        if let Some(bars) = self.lock_cache().get(&key) {
            return Ok(Arc::clone(bars));
        }

        let mut bars = self.read_series_raw(symbol, granularity)?;
        bars.dedup_by_key(|b| b.start_time);
        let bars = Arc::new(bars);
        debug!(symbol = %symbol, granularity = %granularity, bars = bars.len(), "loaded series");
        self.lock_cache().insert(key, Arc::clone(&bars));
        Ok(bars)
    }

    /// All bars of a series in start order, duplicates included.
    fn read_series_raw(
        &self,
        symbol: &SymbolId,
        granularity: Granularity,
    ) -> Result<Vec<Bar>, StoreError> {
        let mut bars = Vec::new();
        for path in self.partitions(symbol, granularity)? {
            bars.extend(self.load_or_quarantine(&path, symbol, granularity));
        }
        bars.sort_by_key(|b| b.start_time);
        Ok(bars)
    }

    /// Parquet partitions of a series, sorted by file name (and so by month).
    fn partitions(&self, symbol: &SymbolId, granularity: Granularity) -> Result<Vec<PathBuf>, StoreError> {
        let dir = self.series_dir(symbol, granularity);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries =
            fs::read_dir(&dir).map_err(|e| StoreError::Io(format!("read dir: {e}")))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| StoreError::Io(format!("dir entry: {e}")))?
                .path();
            // Skip meta.json, .tmp and .quarantined files
            if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Load a partition; a corrupt file is renamed aside and contributes no bars.
    fn load_or_quarantine(&self, path: &Path, symbol: &SymbolId, granularity: Granularity) -> Vec<Bar> {
        match read_partition(path).and_then(|df| dataframe_to_bars(&df, symbol, granularity)) {
            Ok(bars) => bars,
            Err(e) => {
                quarantine(path, &e);
                Vec::new()
            }
        }
    }

    /// Raw frame of a partition for maintenance; `None` once a corrupt file
    /// has been quarantined.
    fn frame_or_quarantine(&self, path: &Path) -> Option<DataFrame> {
        match read_partition(path) {
            Ok(df) => Some(df),
            Err(e) => {
                quarantine(path, &e);
                None
            }
        }
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<SeriesKey, Arc<Vec<Bar>>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn invalidate(&self, symbol: &SymbolId, granularity: Granularity) {
        self.lock_cache().remove(&(symbol.clone(), granularity));
    }

    // ── Maintenance ─────────────────────────────────────────────────

    /// Per symbol: stored series with bar counts, time range and size on disk.
    pub fn inventory(&self) -> Result<Vec<SymbolInventory>, StoreError> {
        let mut out = Vec::new();
        for symbol in self.list_symbols()? {
            let mut series = Vec::new();
            for granularity in self.granularities(&symbol)? {
                let bars = self.load_series(&symbol, granularity)?;
                let mut bytes = 0;
                for path in self.partitions(&symbol, granularity)? {
                    bytes += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                }
                series.push(SeriesInventory {
                    granularity,
                    bars: bars.len(),
                    first_start: bars.first().map(|b| b.start_time),
                    last_start: bars.last().map(|b| b.start_time),
                    bytes,
                });
            }
            out.push(SymbolInventory {
                info: self.symbol_info(&symbol)?,
                symbol,
                series,
            });
        }
        Ok(out)
    }

    /// Series whose partitions contain repeated start times.
    pub fn duplicate_report(&self) -> Result<Vec<DuplicateReport>, StoreError> {
        let mut out = Vec::new();
        for symbol in self.list_symbols()? {
            for granularity in self.granularities(&symbol)? {
                let mut duplicate_rows = 0;
                for path in self.partitions(&symbol, granularity)? {
                    let Some(df) = self.frame_or_quarantine(&path) else {
                        continue;
                    };
                    duplicate_rows += Canonicalizer::count_duplicates(&df)
                        .map_err(|e| StoreError::ParquetError(format!("duplicate count: {e}")))?;
                }
                if duplicate_rows > 0 {
                    out.push(DuplicateReport {
                        symbol: symbol.clone(),
                        granularity,
                        duplicate_rows,
                    });
                }
            }
        }
        Ok(out)
    }

    /// Rewrite every partition canonicalized. Returns the number of rows removed.
    pub fn dedupe(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        for symbol in self.list_symbols()? {
            for granularity in self.granularities(&symbol)? {
                let mut changed = false;
                for path in self.partitions(&symbol, granularity)? {
                    let Some(df) = self.frame_or_quarantine(&path) else {
                        changed = true;
                        continue;
                    };
                    let mut canonical = Canonicalizer::canonicalize(df.clone().lazy())
                        .collect()
                        .map_err(|e| StoreError::ParquetError(format!("canonicalize: {e}")))?;
                    if canonical.height() < df.height() {
                        removed += df.height() - canonical.height();
                        write_parquet_atomic(&mut canonical, &path)?;
                        changed = true;
                    }
                }
                if changed {
                    self.invalidate(&symbol, granularity);
                    self.refresh_meta(&symbol, granularity)?;
                }
            }
        }
        debug!(removed, "deduplicated store");
        Ok(removed)
    }

    /// Delete symbols that have no stored bars. Returns the removed ids.
    pub fn remove_empty_symbols(&self) -> Result<Vec<SymbolId>, StoreError> {
        let mut removed = Vec::new();
        for entry in self.inventory()? {
            if entry.total_bars() > 0 {
                continue;
            }
            fs::remove_dir_all(self.symbol_dir(&entry.symbol))
                .map_err(|e| StoreError::Io(format!("remove {}: {e}", entry.symbol)))?;
            self.lock_cache().retain(|(symbol, _), _| symbol != &entry.symbol);
            removed.push(entry.symbol);
        }
        Ok(removed)
    }
}

impl BarStore for ParquetStore {
    fn get_bars(
        &self,
        symbol: &SymbolId,
        granularity: Granularity,
        up_to: NaiveDateTime,
        limit: usize,
    ) -> Result<Vec<Bar>, StoreError> {
        let series = self.load_series(symbol, granularity)?;
        Ok(most_recent_first(&series, up_to, limit))
    }

    fn list_symbols(&self) -> Result<BTreeSet<SymbolId>, StoreError> {
        Ok(prefixed_entries(&self.root, "symbol=")?
            .into_iter()
            .map(SymbolId)
            .collect())
    }

    fn history(&self, symbol: &SymbolId, granularity: Granularity) -> Result<Vec<Bar>, StoreError> {
        Ok(self.load_series(symbol, granularity)?.as_ref().clone())
    }
}

impl Drop for ParquetStore {
    fn drop(&mut self) {
        let cached = self.lock_cache().len();
        debug!(root = %self.root.display(), cached, "closing parquet store");
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

/// Names after `prefix` of the subdirectories of `dir` called `{prefix}{name}`.
fn prefixed_entries(dir: &Path, prefix: &str) -> Result<Vec<String>, StoreError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|e| StoreError::Io(format!("read dir: {e}")))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::Io(format!("dir entry: {e}")))?;
        if !entry.path().is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str().and_then(|n| n.strip_prefix(prefix)) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

fn to_ms(t: NaiveDateTime) -> i64 {
    t.and_utc().timestamp_millis()
}

fn from_ms(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

/// Convert bars of one series to a Polars DataFrame.
pub(crate) fn bars_to_dataframe(bars: &[Bar]) -> Result<DataFrame, StoreError> {
    let starts: Vec<i64> = bars.iter().map(|b| to_ms(b.start_time)).collect();
    let ends: Vec<i64> = bars.iter().map(|b| to_ms(b.end_time)).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        Column::new("start_ms".into(), starts),
        Column::new("end_ms".into(), ends),
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| StoreError::ParquetError(format!("dataframe creation: {e}")))
}

/// Write a DataFrame to `path` via a temp file and rename.
pub(crate) fn write_parquet_atomic(df: &mut DataFrame, path: &Path) -> Result<(), StoreError> {
    let tmp_path = path.with_extension("parquet.tmp");
    let file = fs::File::create(&tmp_path)
        .map_err(|e| StoreError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| StoreError::ParquetError(format!("write parquet: {e}")))?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        StoreError::Io(format!("atomic rename failed: {e}"))
    })
}

/// Read a partition and validate its integrity.
fn check_symbol(symbol: &SymbolId) -> Result<(), StoreError> {
    symbol
        .validate()
        .map_err(|e| StoreError::ValidationError(e.to_string()))
}

fn quarantine(path: &Path, e: &StoreError) {
    let target = path.with_extension("parquet.quarantined");
    warn!(path = %path.display(), "quarantining corrupt partition: {e}");
    let _ = fs::rename(path, &target);
}

fn read_partition(path: &Path) -> Result<DataFrame, StoreError> {
    let file = fs::File::open(path).map_err(|e| StoreError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| StoreError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(StoreError::ValidationError("empty parquet file".into()));
    }
    BarSchema::validate_stored(&df).map_err(|e| StoreError::ValidationError(e.to_string()))?;
    Ok(df)
}

/// Convert a stored DataFrame back to bars of one series.
fn dataframe_to_bars(
    df: &DataFrame,
    symbol: &SymbolId,
    granularity: Granularity,
) -> Result<Vec<Bar>, StoreError> {
    let column_err = |name: &str, e: PolarsError| StoreError::ParquetError(format!("{name} column: {e}"));

    let start_ca = df
        .column("start_ms")
        .and_then(|c| c.i64().cloned())
        .map_err(|e| column_err("start_ms", e))?;
    let end_ca = df
        .column("end_ms")
        .and_then(|c| c.i64().cloned())
        .map_err(|e| column_err("end_ms", e))?;
    let open_ca = df
        .column("open")
        .and_then(|c| c.f64().cloned())
        .map_err(|e| column_err("open", e))?;
    let high_ca = df
        .column("high")
        .and_then(|c| c.f64().cloned())
        .map_err(|e| column_err("high", e))?;
    let low_ca = df
        .column("low")
        .and_then(|c| c.f64().cloned())
        .map_err(|e| column_err("low", e))?;
    let close_ca = df
        .column("close")
        .and_then(|c| c.f64().cloned())
        .map_err(|e| column_err("close", e))?;
    let vol_ca = df
        .column("volume")
        .and_then(|c| c.u64().cloned())
        .map_err(|e| column_err("volume", e))?;

    let n = df.height();
    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let start_time = start_ca
            .get(i)
            .and_then(from_ms)
            .ok_or_else(|| StoreError::ParquetError(format!("bad start_ms at row {i}")))?;
        let end_time = end_ca
            .get(i)
            .and_then(from_ms)
            .ok_or_else(|| StoreError::ParquetError(format!("bad end_ms at row {i}")))?;

        bars.push(Bar {
            symbol: symbol.clone(),
            granularity,
            start_time,
            end_time,
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(0),
        });
    }
    Ok(bars)
}
