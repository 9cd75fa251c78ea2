// =============================================================================
// Signals Module
// =============================================================================
//
// Nine independent signal computers plus the fusion stage:
//
//   Options positioning : PCR, GEX (dealer gamma), IV skew, expected move
//   Volatility / macro  : VIX regime, cross-asset macro regime
//   Intraday / trend    : VWAP bands, volume delta, momentum regime
//
// Every computer implements the same narrow contract: read the immutable
// inputs captured at cycle start and return `Available(result)` or
// `Unavailable(reason)`.  Nothing here panics or propagates on bad input; a
// single broken feed only removes its own signal from the snapshot.

pub mod chain;
pub mod expected_move;
pub mod fusion;
pub mod gex;
pub mod iv_skew;
pub mod macro_regime;
pub mod momentum;
pub mod pcr;
pub mod thesis;
pub mod vix_regime;
pub mod volume_delta;
pub mod vwap_bands;

pub use expected_move::{ExpectedMoveComputer, ExpectedMoveResult};
pub use fusion::{ScoreFusion, UnifiedScoreResult};
pub use gex::{GexComputer, GexResult};
pub use iv_skew::{IvSkewComputer, IvSkewResult};
pub use macro_regime::{MacroComputer, MacroResult};
pub use momentum::{MomentumComputer, MomentumResult};
pub use pcr::{PcrComputer, PcrResult};
pub use vix_regime::{VixRegimeComputer, VixRegimeResult};
pub use volume_delta::{VolumeDeltaComputer, VolumeDeltaResult};
pub use vwap_bands::{VwapBandComputer, VwapBandResult};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::runtime_config::EngineConfig;
use crate::types::{Bar, DailyClose, OptionsChainEntry, Quote};

// =============================================================================
// Signal identity
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Pcr,
    Gex,
    IvSkew,
    VixRegime,
    MacroRegime,
    VwapBands,
    VolumeDelta,
    ExpectedMove,
    Momentum,
}

impl SignalKind {
    pub const ALL: [SignalKind; 9] = [
        Self::Pcr,
        Self::Gex,
        Self::IvSkew,
        Self::VixRegime,
        Self::MacroRegime,
        Self::VwapBands,
        Self::VolumeDelta,
        Self::ExpectedMove,
        Self::Momentum,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pcr => "pcr",
            Self::Gex => "gex",
            Self::IvSkew => "iv_skew",
            Self::VixRegime => "vix_regime",
            Self::MacroRegime => "macro_regime",
            Self::VwapBands => "vwap_bands",
            Self::VolumeDelta => "volume_delta",
            Self::ExpectedMove => "expected_move",
            Self::Momentum => "momentum",
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Outcome variant
// =============================================================================

/// Result of one signal for one cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum SignalOutcome<T> {
    Available(T),
    Unavailable(EngineError),
}

impl<T> SignalOutcome<T> {
    pub fn available(&self) -> Option<&T> {
        match self {
            Self::Available(v) => Some(v),
            Self::Unavailable(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&EngineError> {
        match self {
            Self::Available(_) => None,
            Self::Unavailable(e) => Some(e),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SignalOutcome<U> {
        match self {
            Self::Available(v) => SignalOutcome::Available(f(v)),
            Self::Unavailable(e) => SignalOutcome::Unavailable(e),
        }
    }
}

impl<T> From<Result<T, EngineError>> for SignalOutcome<T> {
    fn from(res: Result<T, EngineError>) -> Self {
        match res {
            Ok(v) => Self::Available(v),
            Err(e) => Self::Unavailable(e),
        }
    }
}

/// Heterogeneous computer output, tagged by signal.
#[derive(Debug, Clone)]
pub enum SignalPayload {
    Pcr(PcrResult),
    Gex(GexResult),
    IvSkew(IvSkewResult),
    VixRegime(VixRegimeResult),
    MacroRegime(MacroResult),
    VwapBands(VwapBandResult),
    VolumeDelta(VolumeDeltaResult),
    ExpectedMove(ExpectedMoveResult),
    Momentum(MomentumResult),
}

impl SignalPayload {
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::Pcr(_) => SignalKind::Pcr,
            Self::Gex(_) => SignalKind::Gex,
            Self::IvSkew(_) => SignalKind::IvSkew,
            Self::VixRegime(_) => SignalKind::VixRegime,
            Self::MacroRegime(_) => SignalKind::MacroRegime,
            Self::VwapBands(_) => SignalKind::VwapBands,
            Self::VolumeDelta(_) => SignalKind::VolumeDelta,
            Self::ExpectedMove(_) => SignalKind::ExpectedMove,
            Self::Momentum(_) => SignalKind::Momentum,
        }
    }
}

// =============================================================================
// Cycle inputs
// =============================================================================

/// A provider fetch as seen by the computers.
pub type Fetched<T> = Result<T, EngineError>;

/// Everything fetched at the start of one cycle.  Shared read-only (behind an
/// `Arc`) by all computers, so every result shares the same as-of point.
#[derive(Debug, Clone)]
pub struct MarketInputs {
    pub symbol: String,
    pub as_of: DateTime<Utc>,
    pub spot: f64,
    pub chain: Fetched<Vec<OptionsChainEntry>>,
    pub quotes: Fetched<Vec<Quote>>,
    pub intraday_bars: Fetched<Vec<Bar>>,
    pub daily_closes: Fetched<Vec<DailyClose>>,
    pub vol_index_history: Fetched<Vec<DailyClose>>,
}

impl MarketInputs {
    pub fn chain(&self) -> Result<&[OptionsChainEntry], EngineError> {
        match &self.chain {
            Ok(c) if c.is_empty() => Err(EngineError::unavailable("options chain is empty")),
            Ok(c) => Ok(c),
            Err(e) => Err(e.clone()),
        }
    }

    pub fn bars(&self) -> Result<&[Bar], EngineError> {
        self.intraday_bars.as_deref().map_err(Clone::clone)
    }

    pub fn closes(&self) -> Result<&[DailyClose], EngineError> {
        self.daily_closes.as_deref().map_err(Clone::clone)
    }

    /// Quote for `symbol`, if the quote fetch succeeded and included it.
    pub fn quote(&self, symbol: &str) -> Option<&Quote> {
        self.quotes
            .as_ref()
            .ok()?
            .iter()
            .find(|q| q.symbol.eq_ignore_ascii_case(symbol) && q.price.is_finite())
    }
}

// =============================================================================
// Computer contract
// =============================================================================

/// One signal computer.  The assembler depends only on this trait.
pub trait SignalComputer: Send + Sync {
    fn kind(&self) -> SignalKind;

    fn compute(&self, inputs: &MarketInputs) -> SignalOutcome<SignalPayload>;
}

/// The nine standard computers, configured from `config`.
pub fn standard_computers(config: &EngineConfig) -> Vec<Arc<dyn SignalComputer>> {
    let t = &config.thresholds;
    vec![
        Arc::new(PcrComputer::new(t.pcr.clone())),
        Arc::new(GexComputer::new(t.gex.clone())),
        Arc::new(IvSkewComputer::new(t.skew.clone())),
        Arc::new(VixRegimeComputer::new(
            config.volatility_symbols.clone(),
            t.vix.clone(),
        )),
        Arc::new(MacroComputer::new(
            config.macro_symbols.clone(),
            t.macro_rules.clone(),
        )),
        Arc::new(VwapBandComputer::new(t.vwap.clone())),
        Arc::new(VolumeDeltaComputer::new(t.volume_delta.clone())),
        Arc::new(ExpectedMoveComputer::new(t.expected_move.clone())),
        Arc::new(MomentumComputer::new(t.momentum.clone())),
    ]
}
