//! Synthetic session data for offline runs.
//!
//! Developer-only: produces a plausible-looking 1-minute regular session
//! (09:30 to 16:00) as a random walk, with volume spikes injected at chosen
//! minutes. Output is deterministic for a given symbol, day and seed.

use chrono::{Duration, NaiveDate, NaiveTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use volbreak_core::domain::{Bar, BarError, Granularity, Ohlc, SymbolId};

/// Minutes in a regular 09:30-16:00 session.
pub const SESSION_MINUTES: usize = 390;

/// Volume multiplier applied at each spike minute.
pub const SPIKE_MULTIPLIER: u64 = 100;

/// One session of 1-minute bars for `symbol` on `day`.
///
/// `spikes` are minute offsets from the open; offsets past the close are
/// ignored.
pub fn generate_session_bars(
    symbol: &SymbolId,
    day: NaiveDate,
    seed: u64,
    spikes: &[usize],
) -> Result<Vec<Bar>, BarError> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(symbol.as_str().as_bytes());
    hasher.update(day.to_string().as_bytes());
    hasher.update(&seed.to_le_bytes());
    let mut rng = StdRng::from_seed(*hasher.finalize().as_bytes());

    let open_time = day.and_time(NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default());
    let mut price = rng.gen_range(20.0..300.0_f64);
    let mut bars = Vec::with_capacity(SESSION_MINUTES);

    for minute in 0..SESSION_MINUTES {
        let ret: f64 = rng.gen_range(-0.002..0.002);
        let open = price;
        let close = price * (1.0 + ret);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.001));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.001));
        let mut volume = rng.gen_range(800..1_500u64);
        if spikes.contains(&minute) {
            volume *= SPIKE_MULTIPLIER;
        }

        bars.push(Bar::new(
            symbol.clone(),
            Granularity::ONE_MINUTE,
            open_time + Duration::minutes(minute as i64),
            Ohlc::new(open, high, low, close),
            volume,
        )?);
        price = close;
    }
    Ok(bars)
}
