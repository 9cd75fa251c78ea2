// =============================================================================
// In-memory provider for tests
// =============================================================================
//
// Serves a fixed, internally consistent market picture around SPX 5987.25.
// Switches simulate the failure modes the engine must absorb: failing calls,
// empty responses and slow upstreams.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;

use super::MarketDataProvider;
use crate::session::session_date;
use crate::signals::MarketInputs;
use crate::types::{Bar, DailyClose, OptionKind, OptionsChainEntry, Quote};

pub const SPOT: f64 = 5987.25;

// =============================================================================
// Sample data
// =============================================================================

/// (strike, call OI, call gamma, put OI, put gamma)
const GAMMA_TABLE: [(f64, u64, f64, u64, f64); 5] = [
    (5900.0, 1000, 0.0010, 5000, 0.0012),
    (5950.0, 2000, 0.0015, 4000, 0.0016),
    (6000.0, 6500, 0.0020, 2000, 0.0018),
    (6050.0, 4000, 0.0014, 1000, 0.0012),
    (6100.0, 2000, 0.0008, 500, 0.0007),
];

/// (call volume, call delta, call IV, put volume, put delta, put IV)
const FLOW_TABLE: [(u64, f64, f64, u64, f64, f64); 5] = [
    (8_000, 0.70, 17.0, 20_000, -0.22, 22.0),
    (15_000, 0.58, 16.5, 22_000, -0.35, 20.0),
    (30_000, 0.45, 16.0, 18_000, -0.52, 18.0),
    (25_000, 0.32, 15.5, 6_000, -0.66, 17.0),
    (12_000, 0.20, 15.0, 3_000, -0.79, 16.0),
];

pub fn sample_chain() -> Vec<OptionsChainEntry> {
    GAMMA_TABLE
        .iter()
        .zip(FLOW_TABLE.iter())
        .flat_map(|(&(strike, c_oi, c_g, p_oi, p_g), &(c_vol, c_d, c_iv, p_vol, p_d, p_iv))| {
            [
                OptionsChainEntry {
                    strike,
                    kind: OptionKind::Call,
                    volume: c_vol,
                    open_interest: c_oi,
                    delta: c_d,
                    gamma: c_g,
                    theta: -1.2,
                    vega: 4.5,
                    implied_volatility: c_iv,
                },
                OptionsChainEntry {
                    strike,
                    kind: OptionKind::Put,
                    volume: p_vol,
                    open_interest: p_oi,
                    delta: p_d,
                    gamma: p_g,
                    theta: -1.1,
                    vega: 4.4,
                    implied_volatility: p_iv,
                },
            ]
        })
        .collect()
}

/// One session of 5-minute bars on 2024-07-10, grinding up into spot.
pub fn sample_bars() -> Vec<Bar> {
    let open = Utc.with_ymd_and_hms(2024, 7, 10, 13, 30, 0).unwrap();
    (0..40)
        .map(|i| {
            let close = 5960.0 + i as f64 * 0.7;
            Bar {
                timestamp: open + ChronoDuration::minutes(5 * i),
                open: close - 0.3,
                high: close + 1.5,
                low: close - 1.5,
                close,
                volume: 1000.0 + 10.0 * i as f64,
            }
        })
        .collect()
}

/// Date `values` on consecutive days, the last one on `last`.
pub fn dated(values: impl IntoIterator<Item = f64>, last: NaiveDate) -> Vec<DailyClose> {
    let values: Vec<f64> = values.into_iter().collect();
    let n = values.len() as i64;
    values
        .into_iter()
        .enumerate()
        .map(|(i, close)| DailyClose {
            date: last - ChronoDuration::days(n - 1 - i as i64),
            close,
        })
        .collect()
}

fn yesterday() -> NaiveDate {
    session_date(Utc::now()) - ChronoDuration::days(1)
}

/// Sixty completed daily closes with a mild uptrend, ending yesterday.
pub fn sample_closes() -> Vec<DailyClose> {
    let values =
        (0..60).map(|i| 5800.0 + 3.0 * i as f64 + if i % 2 == 0 { 4.0 } else { -4.0 });
    dated(values, yesterday())
}

/// A year of volatility index closes oscillating around 14.
pub fn sample_vix_history() -> Vec<DailyClose> {
    dated((0..252).map(|i| 14.0 + 4.0 * (i as f64 / 10.0).sin()), yesterday())
}

pub fn sample_quotes() -> Vec<Quote> {
    [
        ("SPY", 597.10, 0.45),
        ("TLT", 92.30, -0.30),
        ("UUP", 28.10, 0.05),
        ("GLD", 215.00, 0.10),
        ("^VIX", 16.20, -2.1),
        ("^VIX3M", 17.40, -1.2),
    ]
    .into_iter()
    .map(|(symbol, price, change_pct)| Quote {
        symbol: symbol.to_string(),
        price,
        change_pct,
    })
    .collect()
}

/// Fully populated cycle inputs.
pub fn sample_inputs() -> MarketInputs {
    MarketInputs {
        symbol: "SPX".to_string(),
        as_of: Utc::now(),
        spot: SPOT,
        chain: Ok(sample_chain()),
        quotes: Ok(sample_quotes()),
        intraday_bars: Ok(sample_bars()),
        daily_closes: Ok(sample_closes()),
        vol_index_history: Ok(sample_vix_history()),
    }
}

// =============================================================================
// FixtureProvider
// =============================================================================

#[derive(Debug, Default)]
struct Switches {
    fail_spot: bool,
    fail_chain: bool,
    fail_quotes: bool,
    empty_chain: bool,
    delay: Duration,
    chain_delay: Duration,
}

#[derive(Debug, Default)]
pub struct FixtureProvider {
    switches: Mutex<Switches>,
    spot_calls: AtomicUsize,
}

impl FixtureProvider {
    pub fn healthy() -> Self {
        Self::default()
    }

    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.switches.lock().delay = delay;
        self
    }

    /// Chain calls sleep an extra `delay`.
    pub fn with_chain_delay(self, delay: Duration) -> Self {
        self.switches.lock().chain_delay = delay;
        self
    }

    pub fn set_fail_spot(&self, fail: bool) {
        self.switches.lock().fail_spot = fail;
    }

    pub fn set_fail_chain(&self, fail: bool) {
        self.switches.lock().fail_chain = fail;
    }

    pub fn set_fail_quotes(&self, fail: bool) {
        self.switches.lock().fail_quotes = fail;
    }

    pub fn set_empty_chain(&self, empty: bool) {
        self.switches.lock().empty_chain = empty;
    }

    /// Number of spot fetches so far; one per started cycle.
    pub fn spot_calls(&self) -> usize {
        self.spot_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self, extra: Duration) {
        let delay = self.switches.lock().delay + extra;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl MarketDataProvider for FixtureProvider {
    async fn fetch_chain(&self, _symbol: &str) -> Result<Vec<OptionsChainEntry>> {
        let extra = self.switches.lock().chain_delay;
        self.pause(extra).await;
        let (fail, empty) = {
            let s = self.switches.lock();
            (s.fail_chain, s.empty_chain)
        };
        if fail {
            bail!("fixture: chain endpoint returned 502");
        }
        Ok(if empty { Vec::new() } else { sample_chain() })
    }

    async fn fetch_spot(&self, _symbol: &str) -> Result<f64> {
        self.spot_calls.fetch_add(1, Ordering::SeqCst);
        self.pause(Duration::ZERO).await;
        if self.switches.lock().fail_spot {
            bail!("fixture: spot endpoint returned 503");
        }
        Ok(SPOT)
    }

    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>> {
        self.pause(Duration::ZERO).await;
        if self.switches.lock().fail_quotes {
            bail!("fixture: quotes endpoint returned 500");
        }
        Ok(sample_quotes()
            .into_iter()
            .filter(|q| symbols.iter().any(|s| s.eq_ignore_ascii_case(&q.symbol)))
            .collect())
    }

    async fn fetch_intraday_bars(&self, _symbol: &str) -> Result<Vec<Bar>> {
        self.pause(Duration::ZERO).await;
        Ok(sample_bars())
    }

    async fn fetch_daily_closes(&self, symbol: &str, lookback: usize) -> Result<Vec<DailyClose>> {
        self.pause(Duration::ZERO).await;
        let series = if symbol.starts_with('^') {
            sample_vix_history()
        } else {
            sample_closes()
        };
        let start = series.len().saturating_sub(lookback);
        Ok(series[start..].to_vec())
    }
}
