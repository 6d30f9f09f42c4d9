//! VolBreak Runner — scan orchestration, status, export, synthetic data.
//!
//! This crate builds on `volbreak-core` to provide:
//! - TOML scan configuration with validation
//! - History loading with fallback aggregation from the native granularity
//! - Parallel multi-symbol scans with per-symbol failure isolation
//! - Symbol status as of a point in time
//! - Console, CSV and JSON report export
//! - Synthetic 1-minute sessions for offline runs

pub mod config;
pub mod data_loader;
pub mod export;
pub mod scan;
pub mod status;
pub mod synthetic;

pub use config::{ConfigError, ScanConfig};
pub use data_loader::{load_history, LoadedSeries, SeriesSource};
pub use export::{
    export_csv, export_json, format_table, import_json, render, report_rows, save_report,
    ExportFormat, ReportRow,
};
pub use scan::{resolve_symbols, run_scan, ScanError, ScanReport, SymbolOutcome, SCHEMA_VERSION};
pub use status::{symbol_status, SymbolStatus};
pub use synthetic::generate_session_bars;
