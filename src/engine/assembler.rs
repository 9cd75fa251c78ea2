// =============================================================================
// Snapshot Assembler — one compute cycle
// =============================================================================
//
// Fetches every input concurrently against a single spot price, runs the
// signal computers in parallel over the shared inputs, fuses the results and
// returns an unpublished snapshot.
//
// Fetch failures never abort the cycle: each one is carried as the
// unavailability reason of the signals that needed it.  Only a missing spot
// price fails the whole cycle, since no signal can be anchored without it.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::provider::MarketDataProvider;
use crate::runtime_config::{EngineConfig, SessionHours};
use crate::session::is_market_open;
use crate::signals::{
    standard_computers, Fetched, MarketInputs, ScoreFusion, SignalComputer, SignalKind,
};
use crate::snapshot::{IntelligenceSnapshot, SignalSet};
use crate::types::SnapshotQuality;

pub struct SnapshotAssembler {
    symbol: String,
    provider: Arc<dyn MarketDataProvider>,
    computers: Vec<Arc<dyn SignalComputer>>,
    fusion: ScoreFusion,
    fetch_timeout: Duration,
    quote_symbols: Vec<String>,
    vol_front: String,
    history_days: usize,
    vol_history_days: usize,
    session: SessionHours,
}

impl SnapshotAssembler {
    pub fn new(config: &EngineConfig, provider: Arc<dyn MarketDataProvider>) -> Self {
        let mut quote_symbols = config.macro_symbols.all();
        quote_symbols.push(config.volatility_symbols.front.clone());
        quote_symbols.push(config.volatility_symbols.term.clone());

        Self {
            symbol: config.symbol.clone(),
            provider,
            computers: standard_computers(config),
            fusion: ScoreFusion::new(config.weights.clone(), config.thresholds.clone()),
            fetch_timeout: config.fetch_timeout(),
            quote_symbols,
            vol_front: config.volatility_symbols.front.clone(),
            history_days: config.thresholds.momentum.history_days,
            vol_history_days: config.thresholds.vix.percentile_window,
            session: config.session.clone(),
        }
    }

    #[cfg(test)]
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Replace the computer set.  Kinds with no computer stay unavailable.
    #[cfg(test)]
    pub fn with_computers(mut self, computers: Vec<Arc<dyn SignalComputer>>) -> Self {
        self.computers = computers;
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    // =========================================================================
    // Fetch
    // =========================================================================

    async fn fetch<T, F>(&self, what: &str, fut: F) -> Fetched<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match timeout(self.fetch_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(symbol = %self.symbol, input = what, error = %e, "provider call failed");
                Err(EngineError::unavailable(format!("{what} fetch failed: {e}")))
            }
            Err(_) => {
                warn!(
                    symbol = %self.symbol,
                    input = what,
                    timeout_ms = self.fetch_timeout.as_millis() as u64,
                    "provider call timed out"
                );
                Err(EngineError::unavailable(format!(
                    "{what} fetch timed out after {}ms",
                    self.fetch_timeout.as_millis()
                )))
            }
        }
    }

    async fn gather_inputs(&self) -> Result<MarketInputs, EngineError> {
        let p = &self.provider;
        let sym = self.symbol.as_str();

        let (spot, chain, quotes, bars, closes, vol_history) = tokio::join!(
            self.fetch("spot", p.fetch_spot(sym)),
            self.fetch("options chain", p.fetch_chain(sym)),
            self.fetch("quotes", p.fetch_quotes(&self.quote_symbols)),
            self.fetch("intraday bars", p.fetch_intraday_bars(sym)),
            self.fetch("daily closes", p.fetch_daily_closes(sym, self.history_days)),
            self.fetch(
                "volatility history",
                p.fetch_daily_closes(&self.vol_front, self.vol_history_days)
            ),
        );

        let spot = spot?;
        if !spot.is_finite() || spot <= 0.0 {
            return Err(EngineError::unavailable(format!(
                "provider returned invalid spot {spot}"
            )));
        }

        Ok(MarketInputs {
            symbol: self.symbol.clone(),
            as_of: Utc::now(),
            spot,
            chain,
            quotes,
            intraday_bars: bars,
            daily_closes: closes,
            vol_index_history: vol_history,
        })
    }

    // =========================================================================
    // Compute
    // =========================================================================

    async fn run_computers(&self, inputs: Arc<MarketInputs>) -> SignalSet {
        let mut signals =
            SignalSet::unavailable(EngineError::degraded("signal computer did not complete"));

        let mut tasks = JoinSet::new();
        for computer in &self.computers {
            let computer = computer.clone();
            let inputs = inputs.clone();
            tasks.spawn(async move {
                let kind = computer.kind();
                (kind, computer.compute(&inputs))
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((kind, outcome)) => signals.place(kind, outcome),
                Err(e) => warn!(symbol = %self.symbol, error = %e, "signal computer panicked"),
            }
        }

        for kind in SignalKind::ALL {
            if let Some(reason) = signals.reason(kind) {
                warn!(
                    symbol = %self.symbol,
                    signal = %kind,
                    code = reason.code(),
                    reason = %reason,
                    "signal unavailable"
                );
            }
        }
        signals
    }

    /// Run one full cycle.  Fails only when the spot price cannot be had.
    pub async fn assemble(&self) -> Result<IntelligenceSnapshot, EngineError> {
        let started = Instant::now();
        let cycle_id = Uuid::new_v4();
        debug!(symbol = %self.symbol, cycle = %cycle_id, "cycle started");

        let inputs = Arc::new(self.gather_inputs().await?);
        let spot = inputs.spot;
        let signals = self.run_computers(inputs).await;
        let unified = self.fusion.fuse(&self.symbol, &signals);

        let available = signals.available_count();
        let quality = if available == SignalKind::ALL.len() {
            SnapshotQuality::Complete
        } else {
            SnapshotQuality::Partial
        };
        let timestamp = Utc::now();
        let compute_ms = started.elapsed().as_millis() as u64;

        info!(
            symbol = %self.symbol,
            cycle = %cycle_id,
            spot,
            available,
            quality = %quality,
            score = format!("{:.1}", unified.score),
            direction = %unified.direction,
            compute_ms,
            "cycle assembled"
        );

        Ok(IntelligenceSnapshot {
            cycle_id,
            symbol: self.symbol.clone(),
            timestamp,
            as_of_spot: spot,
            market_open: is_market_open(timestamp, &self.session),
            quality,
            signals,
            unified,
            compute_ms,
        })
    }
}
