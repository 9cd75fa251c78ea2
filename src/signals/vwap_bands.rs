// =============================================================================
// Session VWAP with ±1σ / ±2σ bands
// =============================================================================

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::{MarketInputs, SignalComputer, SignalKind, SignalOutcome, SignalPayload};
use crate::error::EngineError;
use crate::indicators::weighted_mean_and_std;
use crate::runtime_config::VwapThresholds;
use crate::session::{current_session, session_date};
use crate::types::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VwapPosition {
    AboveUpper2,
    AboveUpper1,
    BetweenVwapUpper1,
    AtVwap,
    BetweenVwapLower1,
    BelowLower1,
    BelowLower2,
}

impl std::fmt::Display for VwapPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AboveUpper2 => "above the +2σ band",
            Self::AboveUpper1 => "above the +1σ band",
            Self::BetweenVwapUpper1 => "between VWAP and +1σ",
            Self::AtVwap => "at VWAP",
            Self::BetweenVwapLower1 => "between VWAP and −1σ",
            Self::BelowLower1 => "below the −1σ band",
            Self::BelowLower2 => "below the −2σ band",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VwapBandResult {
    pub session_date: NaiveDate,
    pub vwap: f64,
    pub std_dev: f64,
    pub upper_1: f64,
    pub upper_2: f64,
    pub lower_1: f64,
    pub lower_2: f64,
    pub current_price: f64,
    /// (price − VWAP) / VWAP in percent.
    pub distance_pct: f64,
    /// (price − VWAP) / σ; zero when σ is zero and price sits on VWAP.
    pub sigma_distance: f64,
    pub position: VwapPosition,
    pub bars_used: usize,
}

pub fn classify_position(sigma_distance: f64, t: &VwapThresholds) -> VwapPosition {
    let z = sigma_distance;
    if z.abs() <= t.at_vwap_sigma {
        VwapPosition::AtVwap
    } else if z > 2.0 {
        VwapPosition::AboveUpper2
    } else if z > 1.0 {
        VwapPosition::AboveUpper1
    } else if z > 0.0 {
        VwapPosition::BetweenVwapUpper1
    } else if z >= -1.0 {
        VwapPosition::BetweenVwapLower1
    } else if z >= -2.0 {
        VwapPosition::BelowLower1
    } else {
        VwapPosition::BelowLower2
    }
}

pub fn compute_vwap_bands(
    bars: &[Bar],
    price: f64,
    t: &VwapThresholds,
) -> Result<VwapBandResult, EngineError> {
    let session = current_session(bars);
    let usable: Vec<&Bar> = session
        .iter()
        .filter(|b| b.volume.is_finite() && b.volume > 0.0)
        .filter(|b| b.high.is_finite() && b.low.is_finite() && b.close.is_finite())
        .collect();
    let Some(last) = session.last() else {
        return Err(EngineError::unavailable("no intraday bars"));
    };
    if usable.is_empty() {
        return Err(EngineError::unavailable("no traded volume in the session"));
    }

    let typical: Vec<f64> = usable.iter().map(|b| (b.high + b.low + b.close) / 3.0).collect();
    let volume: Vec<f64> = usable.iter().map(|b| b.volume).collect();
    let (vwap, std_dev) = weighted_mean_and_std(&typical, &volume)
        .ok_or_else(|| EngineError::degraded("vwap statistics not finite"))?;

    let diff = price - vwap;
    let sigma_distance = if std_dev > 0.0 {
        diff / std_dev
    } else if diff > 0.0 {
        f64::INFINITY
    } else if diff < 0.0 {
        f64::NEG_INFINITY
    } else {
        0.0
    };

    Ok(VwapBandResult {
        session_date: session_date(last.timestamp),
        vwap,
        std_dev,
        upper_1: vwap + std_dev,
        upper_2: vwap + 2.0 * std_dev,
        lower_1: vwap - std_dev,
        lower_2: vwap - 2.0 * std_dev,
        current_price: price,
        distance_pct: diff / vwap * 100.0,
        position: classify_position(sigma_distance, t),
        sigma_distance,
        bars_used: usable.len(),
    })
}

// =============================================================================
// Computer
// =============================================================================

pub struct VwapBandComputer {
    thresholds: VwapThresholds,
}

impl VwapBandComputer {
    pub fn new(thresholds: VwapThresholds) -> Self {
        Self { thresholds }
    }
}

impl SignalComputer for VwapBandComputer {
    fn kind(&self) -> SignalKind {
        SignalKind::VwapBands
    }

    fn compute(&self, inputs: &MarketInputs) -> SignalOutcome<SignalPayload> {
        let result = inputs
            .bars()
            .and_then(|bars| compute_vwap_bands(bars, inputs.spot, &self.thresholds));
        if let Ok(r) = &result {
            debug!(
                symbol = %inputs.symbol,
                vwap = format!("{:.2}", r.vwap),
                sigma = format!("{:.2}", r.std_dev),
                position = ?r.position,
                "vwap bands computed"
            );
        }
        SignalOutcome::from(result).map(SignalPayload::VwapBands)
    }
}
