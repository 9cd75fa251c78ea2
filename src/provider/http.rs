// =============================================================================
// HTTP Provider — JSON REST gateway adapter
// =============================================================================
//
// Endpoints (relative to `base_url`):
//   GET /v1/options/{symbol}/chain        -> { "entries": [OptionsChainEntry] }
//   GET /v1/quotes/{symbol}/spot          -> { "price": f64 }
//   GET /v1/quotes?symbols=A,B            -> { "quotes": [Quote] }
//   GET /v1/bars/{symbol}/intraday        -> { "bars": [Bar] }
//   GET /v1/bars/{symbol}/daily?limit=n   -> { "closes": [DailyClose] }
//
// SECURITY: the API key is sent as a bearer header and never logged.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::MarketDataProvider;
use crate::runtime_config::ProviderConfig;
use crate::types::{Bar, DailyClose, OptionsChainEntry, Quote};

#[derive(Deserialize)]
struct ChainResponse {
    #[serde(default)]
    entries: Vec<OptionsChainEntry>,
}

#[derive(Deserialize)]
struct SpotResponse {
    price: f64,
}

#[derive(Deserialize)]
struct QuotesResponse {
    #[serde(default)]
    quotes: Vec<Quote>,
}

#[derive(Deserialize)]
struct BarsResponse {
    #[serde(default)]
    bars: Vec<Bar>,
}

#[derive(Deserialize)]
struct ClosesResponse {
    #[serde(default)]
    closes: Vec<DailyClose>,
}

/// Market data over a JSON REST gateway.
#[derive(Clone)]
pub struct HttpProvider {
    base_url: String,
    client: reqwest::Client,
}

impl HttpProvider {
    /// Build a provider from config.  The reqwest timeout is a backstop; the
    /// assembler applies the configured per-fetch timeout on top.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = config.api_key.as_deref() {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .context("provider API key is not a valid header value")?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("failed to build reqwest client for HttpProvider")?;

        debug!(base_url = %config.base_url, "HttpProvider initialised");

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {path}"))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("failed to parse response body of {path}"))?;

        if !status.is_success() {
            bail!("provider returned {} for {}: {}", status, path, body);
        }

        serde_json::from_value(body).with_context(|| format!("unexpected response shape for {path}"))
    }
}

#[async_trait]
impl MarketDataProvider for HttpProvider {
    #[instrument(skip(self), name = "provider::fetch_chain")]
    async fn fetch_chain(&self, symbol: &str) -> Result<Vec<OptionsChainEntry>> {
        let resp: ChainResponse = self.get_json(&format!("/v1/options/{symbol}/chain")).await?;
        let total = resp.entries.len();

        let entries: Vec<OptionsChainEntry> = resp
            .entries
            .into_iter()
            .filter(|e| e.strike.is_finite() && e.strike > 0.0)
            .collect();

        if entries.len() < total {
            warn!(
                symbol,
                dropped = total - entries.len(),
                "chain entries with invalid strikes dropped"
            );
        }
        debug!(symbol, entries = entries.len(), "options chain fetched");
        Ok(entries)
    }

    #[instrument(skip(self), name = "provider::fetch_spot")]
    async fn fetch_spot(&self, symbol: &str) -> Result<f64> {
        let resp: SpotResponse = self.get_json(&format!("/v1/quotes/{symbol}/spot")).await?;
        if !resp.price.is_finite() || resp.price <= 0.0 {
            bail!("invalid spot price {} for {symbol}", resp.price);
        }
        Ok(resp.price)
    }

    #[instrument(skip(self), name = "provider::fetch_quotes")]
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let resp: QuotesResponse = self
            .get_json(&format!("/v1/quotes?symbols={}", symbols.join(",")))
            .await?;
        debug!(requested = symbols.len(), received = resp.quotes.len(), "quotes fetched");
        Ok(resp.quotes)
    }

    #[instrument(skip(self), name = "provider::fetch_intraday_bars")]
    async fn fetch_intraday_bars(&self, symbol: &str) -> Result<Vec<Bar>> {
        let resp: BarsResponse = self.get_json(&format!("/v1/bars/{symbol}/intraday")).await?;
        Ok(resp.bars)
    }

    #[instrument(skip(self), name = "provider::fetch_daily_closes")]
    async fn fetch_daily_closes(
        &self,
        symbol: &str,
        lookback: usize,
    ) -> Result<Vec<DailyClose>> {
        let resp: ClosesResponse = self
            .get_json(&format!("/v1/bars/{symbol}/daily?limit={lookback}"))
            .await?;
        Ok(resp.closes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_response_fills_missing_greeks() {
        let json = r#"{ "entries": [
            { "strike": 6000.0, "kind": "call", "volume": 10, "open_interest": 20 }
        ] }"#;
        let resp: ChainResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.entries.len(), 1);
        assert_eq!(resp.entries[0].open_interest, 20);
        assert_eq!(resp.entries[0].gamma, 0.0);
    }

    #[test]
    fn closes_response_carries_session_dates() {
        let json = r#"{ "closes": [
            { "date": "2026-10-14", "close": 5801.5 },
            { "date": "2026-10-15", "close": 5812.0 }
        ] }"#;
        let resp: ClosesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.closes.len(), 2);
        assert_eq!(resp.closes[1].date.to_string(), "2026-10-15");
        assert!((resp.closes[1].close - 5812.0).abs() < f64::EPSILON);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let provider = HttpProvider::new(&ProviderConfig {
            base_url: "http://localhost:9000/".into(),
            api_key: Some("k".into()),
        })
        .unwrap();
        assert_eq!(provider.base_url, "http://localhost:9000");
    }
}
