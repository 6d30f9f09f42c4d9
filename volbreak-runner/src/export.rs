//! Report export — console table, CSV, and JSON.
//!
//! Breakout rows are presented newest first: date descending, then time
//! descending, then symbol ascending. Prices, baseline and ratio are rounded
//! to two decimals. JSON carries the whole `ScanReport` with its
//! `schema_version`; unknown (newer) versions are rejected on load.

use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use volbreak_core::domain::{sort_for_presentation, BreakoutRecord};

use crate::scan::{ScanReport, SCHEMA_VERSION};

/// Report column headers, in order.
pub const COLUMNS: [&str; 10] = [
    "Symbol",
    "Date",
    "Time",
    "Volume",
    "Vol SMA",
    "Vol Ratio",
    "Open",
    "High",
    "Low",
    "Close",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Table,
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Table => "txt",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Table => "table",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" | "txt" => Ok(ExportFormat::Table),
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unknown export format: {other} (use table, csv or json)")),
        }
    }
}

// ─── Rows ───────────────────────────────────────────────────────────

/// One presentation row of a breakout record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub symbol: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub volume: u64,
    pub vol_sma: f64,
    pub vol_ratio: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

impl From<&BreakoutRecord> for ReportRow {
    fn from(r: &BreakoutRecord) -> Self {
        Self {
            symbol: r.symbol.to_string(),
            date: r.timestamp.date(),
            time: r.timestamp.time(),
            volume: r.volume,
            vol_sma: round2(r.baseline),
            vol_ratio: round2(r.ratio),
            open: round2(r.ohlc.open),
            high: round2(r.ohlc.high),
            low: round2(r.ohlc.low),
            close: round2(r.ohlc.close),
        }
    }
}

/// Presentation rows, sorted newest first.
pub fn report_rows(records: &[BreakoutRecord]) -> Vec<ReportRow> {
    let mut sorted = records.to_vec();
    sort_for_presentation(&mut sorted);
    sorted.iter().map(ReportRow::from).collect()
}

impl ReportRow {
    fn cells(&self) -> [String; 10] {
        [
            self.symbol.clone(),
            self.date.format("%Y-%m-%d").to_string(),
            self.time.format("%H:%M").to_string(),
            self.volume.to_string(),
            format!("{:.2}", self.vol_sma),
            format!("{:.2}", self.vol_ratio),
            format!("{:.2}", self.open),
            format!("{:.2}", self.high),
            format!("{:.2}", self.low),
            format!("{:.2}", self.close),
        ]
    }
}

// ─── Console table ──────────────────────────────────────────────────

/// Render records as an aligned plain-text table.
pub fn format_table(records: &[BreakoutRecord]) -> String {
    let rows: Vec<[String; 10]> = report_rows(records).iter().map(ReportRow::cells).collect();
    if rows.is_empty() {
        return "No breakouts found.\n".to_string();
    }

    let mut widths = COLUMNS.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = COLUMNS
        .iter()
        .zip(widths)
        .map(|(c, w)| format!("{c:<w$}"))
        .collect();
    let _ = writeln!(out, "{}", header.join("  ").trim_end());
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("  "));
    for row in &rows {
        // Symbol, date and time left-aligned; numbers right-aligned.
        let cells: Vec<String> = row
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(i, (cell, w))| {
                if i < 3 {
                    format!("{cell:<w$}")
                } else {
                    format!("{cell:>w$}")
                }
            })
            .collect();
        let _ = writeln!(out, "{}", cells.join("  ").trim_end());
    }
    out
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export breakout records as CSV with the report columns.
pub fn export_csv(records: &[BreakoutRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(COLUMNS)?;
    for row in report_rows(records) {
        wtr.write_record(row.cells())?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &ScanReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize ScanReport to JSON")
}

/// Deserialize a `ScanReport`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<ScanReport> {
    let report: ScanReport =
        serde_json::from_str(json).context("failed to deserialize ScanReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

/// Render a report in `format`.
pub fn render(report: &ScanReport, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Table => Ok(format_table(&report.records)),
        ExportFormat::Csv => export_csv(&report.records),
        ExportFormat::Json => export_json(report),
    }
}

/// Write a report into `dir` as `breakouts_{timestamp}.{ext}` and return its path.
pub fn save_report(report: &ScanReport, dir: &Path, format: ExportFormat) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create report dir: {}", dir.display()))?;
    let name = format!(
        "breakouts_{}.{}",
        report.generated_at.format("%Y%m%d_%H%M%S"),
        format.extension()
    );
    let path = dir.join(name);
    let body = render(report, format)?;
    std::fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use chrono::NaiveDateTime;
    use volbreak_core::domain::{Granularity, Ohlc, SymbolId};

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn record(symbol: &str, timestamp: NaiveDateTime) -> BreakoutRecord {
        BreakoutRecord {
            symbol: SymbolId::new(symbol),
            timestamp,
            granularity: Granularity::FIVE_MINUTES,
            volume: 48_000,
            baseline: 1_234.5678,
            ratio: 38.88123,
            ohlc: Ohlc::new(10.004, 10.996, 9.5, 10.333),
        }
    }

    fn report(records: Vec<BreakoutRecord>) -> ScanReport {
        ScanReport {
            schema_version: SCHEMA_VERSION,
            config: ScanConfig::default(),
            config_hash: "abc".into(),
            generated_at: at(10, 16, 5),
            records,
            symbols: Vec::new(),
        }
    }

    #[test]
    fn rows_sorted_newest_first_then_symbol() {
        let rows = report_rows(&[
            record("MSFT", at(10, 10, 0)),
            record("AAPL", at(10, 10, 0)),
            record("TSLA", at(11, 9, 35)),
            record("AAPL", at(10, 11, 0)),
        ]);
        let keys: Vec<(&str, String)> = rows
            .iter()
            .map(|r| (r.symbol.as_str(), r.time.format("%H:%M").to_string()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("TSLA", "09:35".to_string()),
                ("AAPL", "11:00".to_string()),
                ("AAPL", "10:00".to_string()),
                ("MSFT", "10:00".to_string()),
            ]
        );
    }

    #[test]
    fn values_rounded_to_two_decimals() {
        let row = ReportRow::from(&record("AAPL", at(10, 10, 0)));
        assert_eq!(row.vol_sma, 1234.57);
        assert_eq!(row.vol_ratio, 38.88);
        assert_eq!(row.open, 10.0);
        assert_eq!(row.high, 11.0);
        assert_eq!(row.close, 10.33);
    }

    #[test]
    fn csv_has_report_columns() {
        let csv = export_csv(&[record("AAPL", at(10, 10, 0))]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Symbol,Date,Time,Volume,Vol SMA,Vol Ratio,Open,High,Low,Close"
        );
        assert_eq!(
            lines.next().unwrap(),
            "AAPL,2025-04-10,10:00,48000,1234.57,38.88,10.00,11.00,9.50,10.33"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn table_lists_every_record() {
        let table = format_table(&[record("AAPL", at(10, 10, 0)), record("IBM", at(10, 10, 5))]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Symbol"));
        assert!(lines[2].starts_with("IBM"));
        assert!(lines[3].contains("1234.57"));
        assert_eq!(format_table(&[]), "No breakouts found.\n");
    }

    #[test]
    fn json_roundtrip_and_version_gate() {
        let original = report(vec![record("AAPL", at(10, 10, 0))]);
        let json = export_json(&original).unwrap();
        let back = import_json(&json).unwrap();
        assert_eq!(back.records.len(), 1);
        assert_eq!(back.records[0].timestamp, original.records[0].timestamp);
        assert!((back.records[0].ratio - original.records[0].ratio).abs() < 1e-9);
        assert_eq!(back.config, original.config);

        let future = json.replacen(
            &format!("\"schema_version\": {SCHEMA_VERSION}"),
            "\"schema_version\": 99",
            1,
        );
        assert!(import_json(&future).is_err());
    }

    #[test]
    fn save_report_names_file_by_generation_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_report(
            &report(vec![record("AAPL", at(10, 10, 0))]),
            dir.path(),
            ExportFormat::Csv,
        )
        .unwrap();
        assert_eq!(path.file_name().unwrap(), "breakouts_20250410_160500.csv");
        assert!(std::fs::read_to_string(path).unwrap().starts_with("Symbol,"));
    }

    #[test]
    fn parse_format() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("table".parse::<ExportFormat>().unwrap(), ExportFormat::Table);
        assert!("xlsx".parse::<ExportFormat>().is_err());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn arb_record() -> impl Strategy<Value = BreakoutRecord> {
            (
                prop::sample::select(vec!["AAPL", "IBM", "MSFT", "TSLA"]),
                10u32..13,
                0i64..78,
                1.0..1e6_f64,
            )
                .prop_map(|(symbol, d, slot, baseline)| BreakoutRecord {
                    ratio: 10.0 + baseline.fract() * 50.0,
                    baseline,
                    ..record(symbol, at(d, 9, 30) + chrono::Duration::minutes(5 * slot))
                })
        }

        proptest! {
            #[test]
            fn rows_always_in_presentation_order(records in prop::collection::vec(arb_record(), 0..40)) {
                let rows = report_rows(&records);
                prop_assert_eq!(rows.len(), records.len());
                for pair in rows.windows(2) {
                    let (a, b) = (&pair[0], &pair[1]);
                    let key_a = (std::cmp::Reverse((a.date, a.time)), a.symbol.clone());
                    let key_b = (std::cmp::Reverse((b.date, b.time)), b.symbol.clone());
                    prop_assert!(key_a <= key_b);
                }
            }

            #[test]
            fn rounding_moves_values_by_at_most_half_a_cent(record in arb_record()) {
                let row = ReportRow::from(&record);
                prop_assert!((row.vol_sma - record.baseline).abs() <= 0.005 + 1e-9 * record.baseline);
                prop_assert!((row.vol_ratio - record.ratio).abs() <= 0.005 + 1e-9);
            }
        }
    }
}
