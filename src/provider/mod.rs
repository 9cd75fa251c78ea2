// =============================================================================
// Market Data Provider
// =============================================================================
//
// The engine does not know which vendor supplies its data; it consumes this
// narrow async contract.  Any call may fail or hang, and the assembler wraps
// each one in a timeout and turns failures into unavailable signals.

pub mod http;

#[cfg(test)]
pub mod fixture;

pub use http::HttpProvider;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Bar, DailyClose, OptionsChainEntry, Quote};

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Full options chain for the underlying (nearest expiries).
    async fn fetch_chain(&self, symbol: &str) -> Result<Vec<OptionsChainEntry>>;

    /// Last traded price of the underlying.
    async fn fetch_spot(&self, symbol: &str) -> Result<f64>;

    /// Quotes for cross-asset proxies and volatility indices.
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>>;

    /// Intraday bars, oldest first.
    async fn fetch_intraday_bars(&self, symbol: &str) -> Result<Vec<Bar>>;

    /// Up to `lookback` dated daily closes, oldest first.  The last entry may
    /// be today's session if the vendor publishes a provisional close.
    async fn fetch_daily_closes(&self, symbol: &str, lookback: usize) -> Result<Vec<DailyClose>>;
}
