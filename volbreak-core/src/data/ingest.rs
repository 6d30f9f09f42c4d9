use chrono::NaiveDateTime;
use polars::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::data::canonicalize::Canonicalizer;
use crate::data::schema::BarSchema;
use crate::data::StoreError;
use crate::domain::{Bar, Granularity, Ohlc, SymbolId};

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Bars read from one CSV file.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub bars: Vec<Bar>,
    pub rows: usize,
    pub rejected: usize,
    pub duplicates: usize,
}

/// CSV importer for bars of one symbol at one granularity.
///
/// Expected header: `timestamp,open,high,low,close,volume`.
pub struct DataIngestor {
    schema: Schema,
}

impl DataIngestor {
    pub fn new() -> Self {
        Self {
            schema: BarSchema::csv_schema(),
        }
    }

    /// Read, validate and de-duplicate a CSV file. Each row becomes a bar
    /// spanning one `granularity` from its timestamp. Rows that fail validation
    /// are counted and dropped; repeated timestamps keep the first row.
    pub fn ingest_csv(
        &self,
        path: &Path,
        symbol: &SymbolId,
        granularity: Granularity,
    ) -> Result<IngestReport, StoreError> {
        let raw = LazyCsvReader::new(path)
            .with_schema(Some(Arc::new(self.schema.clone())))
            .with_has_header(true)
            .finish()
            .and_then(|lf| lf.collect())
            .map_err(|e| StoreError::IngestFailed(format!("{}: {e}", path.display())))?;
        let rows = raw.height();

        let df = Canonicalizer::validate(raw.lazy())
            .collect()
            .map_err(|e| StoreError::IngestFailed(format!("validate: {e}")))?;

        let mut bars = frame_to_bars(&df, symbol, granularity)?;
        let parsed = bars.len();
        bars.sort_by_key(|b| b.start_time);
        bars.dedup_by_key(|b| b.start_time);

        let report = IngestReport {
            rows,
            rejected: rows - parsed,
            duplicates: parsed - bars.len(),
            bars,
        };
        if report.rejected > 0 {
            warn!(
                path = %path.display(),
                rejected = report.rejected,
                "dropped invalid rows"
            );
        }
        debug!(
            path = %path.display(),
            symbol = %symbol,
            bars = report.bars.len(),
            duplicates = report.duplicates,
            "ingested csv"
        );
        Ok(report)
    }
}

impl Default for DataIngestor {
    fn default() -> Self {
        Self::new()
    }
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn frame_to_bars(
    df: &DataFrame,
    symbol: &SymbolId,
    granularity: Granularity,
) -> Result<Vec<Bar>, StoreError> {
    let map_err = |e: PolarsError| StoreError::IngestFailed(format!("column read: {e}"));

    let ts = df.column("timestamp").map_err(map_err)?.str().map_err(map_err)?;
    let open = df.column("open").map_err(map_err)?.f64().map_err(map_err)?;
    let high = df.column("high").map_err(map_err)?.f64().map_err(map_err)?;
    let low = df.column("low").map_err(map_err)?.f64().map_err(map_err)?;
    let close = df.column("close").map_err(map_err)?.f64().map_err(map_err)?;
    let volume = df.column("volume").map_err(map_err)?.f64().map_err(map_err)?;

    let mut bars = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(start), Some(o), Some(h), Some(l), Some(c), Some(v)) = (
            ts.get(i).and_then(parse_timestamp),
            open.get(i),
            high.get(i),
            low.get(i),
            close.get(i),
            volume.get(i),
        ) else {
            continue;
        };
        if !v.is_finite() || v < 0.0 {
            continue;
        }
        if let Ok(bar) = Bar::new(
            symbol.clone(),
            granularity,
            start,
            Ohlc::new(o, h, l, c),
            v.round() as u64,
        ) {
            bars.push(bar);
        }
    }
    Ok(bars)
}
