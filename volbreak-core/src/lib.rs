//! VolBreak Core — bar domain types, aggregation, windowing, statistics, breakout scanning.
//!
//! This crate contains the analytic engine:
//! - Domain types (bars, granularities, symbols, price fields, breakout records)
//! - Bar aggregation from fine to coarse granularities
//! - Count-based lookback window selection, with the legacy elapsed-time policy on request
//! - Window statistics (SMA, adjusted SMA, EMA, population standard deviation)
//! - The breakout scanner
//! - The `BarStore` trait with in-memory and Parquet implementations

pub mod aggregate;
pub mod data;
pub mod domain;
pub mod scanner;
pub mod stats;
pub mod window;

pub use aggregate::BarAggregator;
pub use scanner::{scan, BaselineAnchor, BreakoutScanner, ScanParams, ScanSummary, SymbolScan};
pub use stats::Statistic;
pub use window::{statistic_at, Reference, StatRequest, Window, WindowPolicy, WindowSelector};
