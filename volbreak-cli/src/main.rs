//! VolBreak CLI — scan, statistics, status, import, and store maintenance commands.
//!
//! Commands:
//! - `scan`: scan stored symbols for volume breakouts and print or save a report
//! - `stat`: compute one statistic over a lookback window
//! - `status`: latest bar and baseline per symbol as of a point in time
//! - `import`: load a CSV of bars into the store
//! - `synth`: write synthetic 1-minute sessions into the store
//! - `store status|check|clean`: inventory, duplicate check, cleanup

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, Weekday};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use volbreak_core::data::{parse_timestamp, DataIngestor, ParquetStore};
use volbreak_core::domain::{Granularity, PriceField, SymbolId, SymbolInfo};
use volbreak_core::{statistic_at, Reference, StatRequest, Statistic, WindowPolicy};
use volbreak_runner::{
    generate_session_bars, render, run_scan, save_report, symbol_status, ExportFormat, ScanConfig,
};

#[derive(Parser)]
#[command(
    name = "volbreak",
    about = "VolBreak CLI — intraday volume breakout scanner"
)]
struct Cli {
    /// Bar store directory.
    #[arg(long, global = true, default_value = "data")]
    store_dir: PathBuf,

    /// More log output (-v for debug). `RUST_LOG` applies otherwise.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan symbols for volume breakouts.
    Scan {
        /// Path to a TOML scan config. Flags below override it.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Symbols to scan (comma separated). Defaults to the config filter, then the whole store.
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,

        /// Scan granularity (e.g. 5min).
        #[arg(long)]
        granularity: Option<Granularity>,

        /// Lookback window in bars.
        #[arg(long)]
        lookback: Option<usize>,

        /// Volume ratio a bar must exceed.
        #[arg(long)]
        threshold: Option<f64>,

        /// Baseline statistic: sma, adjusted_sma, ema, stddev.
        #[arg(long)]
        baseline: Option<Statistic>,

        /// Use the legacy elapsed-time window instead of the last N bars.
        #[arg(long, default_value_t = false)]
        legacy_window: bool,

        /// Worker threads.
        #[arg(long)]
        threads: Option<usize>,

        /// Output format: table, csv, json.
        #[arg(long, default_value = "table")]
        format: ExportFormat,

        /// Also save the report into this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Compute a statistic over the lookback window ending at a reference time.
    Stat {
        #[arg(long)]
        symbol: String,

        /// Price field: o, h, l, c, v (or open, high, ...).
        #[arg(long, default_value = "c")]
        field: PriceField,

        /// Statistic: sma, adjusted_sma, ema, stddev.
        #[arg(long = "stat", default_value = "sma")]
        statistic: Statistic,

        #[arg(long, default_value_t = 20)]
        period: usize,

        #[arg(long, default_value = "5min")]
        granularity: Granularity,

        /// Window ends at the latest bar at or before this time.
        #[arg(long, conflicts_with = "bar")]
        at: Option<String>,

        /// Window ends at the bar starting exactly at this time.
        #[arg(long)]
        bar: Option<String>,

        #[arg(long, default_value_t = false)]
        legacy_window: bool,
    },
    /// Latest bar and baseline per symbol as of a point in time.
    Status {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,

        /// Reference time (YYYY-MM-DD HH:MM[:SS]). Defaults to now.
        #[arg(long)]
        as_of: Option<String>,

        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Import a CSV of bars (timestamp,open,high,low,close,volume) for one symbol.
    Import {
        #[arg(long)]
        symbol: String,

        #[arg(long)]
        granularity: Granularity,

        #[arg(long)]
        file: PathBuf,

        /// Company name recorded with the symbol.
        #[arg(long)]
        company: Option<String>,
    },
    /// Write synthetic 1-minute sessions (developer mode).
    Synth {
        #[arg(long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,

        /// First session date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// Number of weekday sessions.
        #[arg(long, default_value_t = 1)]
        days: u32,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Minute offsets from the open that get a volume spike.
        #[arg(long, value_delimiter = ',', default_value = "120,300")]
        spikes: Vec<usize>,
    },
    /// Store maintenance commands.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Report symbols, series, bar counts and size on disk.
    Status {
        /// Granularities every symbol is expected to carry.
        #[arg(long, value_delimiter = ',', default_value = "1min,5min,15min")]
        required: Vec<Granularity>,
    },
    /// Report duplicated bars in stored partitions.
    Check,
    /// Remove duplicated bars and symbols without data.
    Clean {
        /// Actually rewrite/delete (without this flag, only previews).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let store_dir = cli.store_dir;

    match cli.command {
        Commands::Scan {
            config,
            symbols,
            granularity,
            lookback,
            threshold,
            baseline,
            legacy_window,
            threads,
            format,
            output_dir,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if !symbols.is_empty() {
                cfg.symbols = symbols;
            }
            if let Some(g) = granularity {
                cfg.granularity = g;
            }
            if let Some(n) = lookback {
                cfg.lookback_period = n;
            }
            if let Some(t) = threshold {
                cfg.ratio_threshold = t;
            }
            if let Some(b) = baseline {
                cfg.baseline = b;
            }
            if legacy_window {
                cfg.window_policy = WindowPolicy::ByElapsedTime;
            }
            if threads.is_some() {
                cfg.threads = threads;
            }
            cfg.validate()?;
            run_scan_cmd(&store_dir, &cfg, format, output_dir.as_deref())
        }
        Commands::Stat {
            symbol,
            field,
            statistic,
            period,
            granularity,
            at,
            bar,
            legacy_window,
        } => {
            let reference = match (at, bar) {
                (Some(at), None) => Reference::AsOf(parse_time(&at)?),
                (None, Some(bar)) => Reference::Bar(parse_time(&bar)?),
                (None, None) => Reference::AsOf(Local::now().naive_local()),
                (Some(_), Some(_)) => bail!("--at and --bar are mutually exclusive"),
            };
            let policy = if legacy_window {
                WindowPolicy::ByElapsedTime
            } else {
                WindowPolicy::ByCount
            };
            let request = StatRequest {
                symbol: symbol.parse::<SymbolId>()?,
                granularity,
                field,
                statistic,
                period,
                reference,
                policy,
            };
            run_stat(&store_dir, &request)
        }
        Commands::Status {
            config,
            symbols,
            as_of,
            json,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if !symbols.is_empty() {
                cfg.symbols = symbols;
            }
            cfg.validate()?;
            let as_of = match as_of {
                Some(s) => parse_time(&s)?,
                None => Local::now().naive_local(),
            };
            run_status(&store_dir, &cfg, as_of, json)
        }
        Commands::Import {
            symbol,
            granularity,
            file,
            company,
        } => run_import(&store_dir, &symbol, granularity, &file, company),
        Commands::Synth {
            symbols,
            start,
            days,
            seed,
            spikes,
        } => run_synth(&store_dir, &symbols, &start, days, seed, &spikes),
        Commands::Store { action } => match action {
            StoreAction::Status { required } => run_store_status(&store_dir, &required),
            StoreAction::Check => run_store_check(&store_dir),
            StoreAction::Clean { confirm } => run_store_clean(&store_dir, confirm),
        },
    }
}

/// Logs go to stderr so reports on stdout stay clean.
fn init_tracing(verbose: u8) {
    let filter = if verbose > 0 {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ScanConfig> {
    match path {
        Some(p) => ScanConfig::from_file(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(ScanConfig::default()),
    }
}

fn parse_time(s: &str) -> Result<NaiveDateTime> {
    parse_timestamp(s).with_context(|| {
        format!("invalid timestamp '{s}' (expected YYYY-MM-DD HH:MM[:SS] or YYYY-MM-DDTHH:MM:SS)")
    })
}

fn open_store(dir: &Path) -> Result<ParquetStore> {
    ParquetStore::open(dir).with_context(|| format!("failed to open store {}", dir.display()))
}

// ─── scan / stat / status ───────────────────────────────────────────

fn run_scan_cmd(
    store_dir: &Path,
    config: &ScanConfig,
    format: ExportFormat,
    output_dir: Option<&Path>,
) -> Result<()> {
    let store = open_store(store_dir)?;
    let report = run_scan(&store, config, None)?;

    for failed in report.failures() {
        warn!(
            symbol = %failed.symbol,
            error = failed.error.as_deref().unwrap_or(""),
            "symbol not scanned"
        );
    }

    print!("{}", render(&report, format)?);

    if let Some(dir) = output_dir {
        let path = save_report(&report, dir, format)?;
        info!(path = %path.display(), "report saved");
    }
    Ok(())
}

fn run_stat(store_dir: &Path, request: &StatRequest) -> Result<()> {
    let store = open_store(store_dir)?;
    match statistic_at(&store, request)? {
        Some(value) => println!(
            "{} {} {}({}) {}: {value:.4}",
            request.symbol, request.granularity, request.statistic, request.period, request.field
        ),
        None => println!(
            "{} {} {}({}) {}: no result",
            request.symbol, request.granularity, request.statistic, request.period, request.field
        ),
    }
    Ok(())
}

fn run_status(store_dir: &Path, config: &ScanConfig, as_of: NaiveDateTime, json: bool) -> Result<()> {
    let store = open_store(store_dir)?;
    let status = symbol_status(&store, config, as_of, None)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Status as of {as_of} ({} {})", config.granularity, config.baseline);
    println!(
        "{:<8} {:<20} {:>6} {:>10} {:>12} {:>8}",
        "Symbol", "Latest Bar", "Bars", "Volume", "Baseline", "Ratio"
    );
    println!("{}", "-".repeat(69));
    for s in &status {
        let latest = s
            .latest_bar
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into());
        let volume = s.latest_volume.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
        let baseline = s
            .baseline
            .map(|b| format!("{b:.2}"))
            .unwrap_or_else(|| "-".into());
        let ratio = s.ratio.map(|r| format!("{r:.2}")).unwrap_or_else(|| "-".into());
        println!(
            "{:<8} {:<20} {:>6} {:>10} {:>12} {:>8}",
            s.symbol.as_str(), latest, s.bar_count, volume, baseline, ratio
        );
        if !s.window_volumes.is_empty() {
            println!("         window volumes: {:?}", s.window_volumes);
        }
    }
    Ok(())
}

// ─── import / synth ─────────────────────────────────────────────────

fn run_import(
    store_dir: &Path,
    symbol: &str,
    granularity: Granularity,
    file: &Path,
    company: Option<String>,
) -> Result<()> {
    let symbol: SymbolId = symbol.parse()?;
    let report = DataIngestor::new()
        .ingest_csv(file, &symbol, granularity)
        .with_context(|| format!("failed to import {}", file.display()))?;
    let store = ParquetStore::create(store_dir)?;
    if let Some(name) = company {
        let mut info = SymbolInfo::new(symbol.clone());
        info.company_name = Some(name);
        store.put_symbol(&info)?;
    }
    let summary = store.write_bars(&symbol, &report.bars)?;

    println!(
        "{symbol} {granularity}: {} rows read, {} rejected, {} duplicate; {} new bars written ({} already stored)",
        report.rows, report.rejected, report.duplicates, summary.written, summary.duplicates
    );
    Ok(())
}

fn run_synth(
    store_dir: &Path,
    symbols: &[String],
    start: &str,
    days: u32,
    seed: u64,
    spikes: &[usize],
) -> Result<()> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{start}' (expected YYYY-MM-DD)"))?;
    let store = ParquetStore::create(store_dir)?;

    let mut sessions = Vec::new();
    let mut day = start;
    while sessions.len() < days as usize {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            sessions.push(day);
        }
        day += Duration::days(1);
    }

    let symbols = symbols
        .iter()
        .map(|s| s.parse::<SymbolId>())
        .collect::<Result<Vec<_>, _>>()?;
    for symbol in symbols {
        let mut written = 0;
        for &session in &sessions {
            let bars = generate_session_bars(&symbol, session, seed, spikes)?;
            written += store.write_bars(&symbol, &bars)?.written;
        }
        println!("{symbol}: {written} synthetic 1min bars over {} session(s)", sessions.len());
    }
    println!("WARNING: synthetic data, not market data");
    Ok(())
}

// ─── store maintenance ──────────────────────────────────────────────

fn run_store_status(store_dir: &Path, required: &[Granularity]) -> Result<()> {
    let store = open_store(store_dir)?;
    let inventory = store.inventory()?;
    if inventory.is_empty() {
        println!("Store is empty: {}", store_dir.display());
        return Ok(());
    }

    let total_bytes: u64 = inventory
        .iter()
        .flat_map(|s| s.series.iter().map(|g| g.bytes))
        .sum();
    println!("Store: {}", store_dir.display());
    println!("Symbols: {}", inventory.len());
    println!("Total size: {}", format_size(total_bytes));
    println!();
    println!(
        "{:<8} {:<6} {:>8} {:<35} {:>10}",
        "Symbol", "Gran", "Bars", "Range", "Size"
    );
    println!("{}", "-".repeat(71));

    let mut incomplete = Vec::new();
    for entry in &inventory {
        for series in &entry.series {
            let range = match (series.first_start, series.last_start) {
                (Some(a), Some(b)) => format!("{} .. {}", a.format("%Y-%m-%d %H:%M"), b.format("%Y-%m-%d %H:%M")),
                _ => "-".into(),
            };
            println!(
                "{:<8} {:<6} {:>8} {:<35} {:>10}",
                entry.symbol.as_str(),
                series.granularity.to_string(),
                series.bars,
                range,
                format_size(series.bytes)
            );
        }
        let missing: Vec<String> = required
            .iter()
            .filter(|g| !entry.has(**g))
            .map(|g| g.to_string())
            .collect();
        if !missing.is_empty() {
            incomplete.push((entry.symbol.clone(), missing));
        }
    }

    if !incomplete.is_empty() {
        println!();
        println!("Symbols missing required granularities:");
        for (symbol, missing) in &incomplete {
            println!("  {symbol}: {}", missing.join(", "));
        }
    }
    Ok(())
}

fn run_store_check(store_dir: &Path) -> Result<()> {
    let store = open_store(store_dir)?;
    let report = store.duplicate_report()?;
    if report.is_empty() {
        println!("No duplicate bars found.");
        return Ok(());
    }
    println!("{:<8} {:<6} {:>10}", "Symbol", "Gran", "Duplicates");
    println!("{}", "-".repeat(26));
    for entry in &report {
        println!(
            "{:<8} {:<6} {:>10}",
            entry.symbol.as_str(),
            entry.granularity.to_string(),
            entry.duplicate_rows
        );
    }
    Ok(())
}

fn run_store_clean(store_dir: &Path, confirm: bool) -> Result<()> {
    let store = open_store(store_dir)?;
    let duplicates: usize = store
        .duplicate_report()?
        .iter()
        .map(|d| d.duplicate_rows)
        .sum();
    let empty: Vec<SymbolId> = store
        .inventory()?
        .into_iter()
        .filter(|s| s.total_bars() == 0)
        .map(|s| s.symbol)
        .collect();

    if duplicates == 0 && empty.is_empty() {
        println!("Nothing to clean.");
        return Ok(());
    }

    println!("Duplicate bars: {duplicates}");
    println!("Symbols without data: {}", empty.len());
    for symbol in &empty {
        println!("  {symbol}");
    }

    if !confirm {
        println!();
        println!("Dry run — pass --confirm to actually clean.");
        return Ok(());
    }

    let removed_rows = store.dedupe()?;
    let removed_symbols = store.remove_empty_symbols()?;
    println!(
        "Done. Removed {removed_rows} duplicate bar(s) and {} empty symbol(s).",
        removed_symbols.len()
    );
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.1} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
