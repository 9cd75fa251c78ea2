// =============================================================================
// Volume Delta — tick-rule aggressor estimate
// =============================================================================
//
// For each bar after the first, its volume is attributed to buyers when the
// close is above the prior bar's high/low midpoint, to sellers when below,
// and split evenly on a tie.  Bar delta = buy − sell.  Divergence compares
// the net price change and the net delta over the trailing N bars.

use serde::Serialize;
use tracing::debug;

use super::{MarketInputs, SignalComputer, SignalKind, SignalOutcome, SignalPayload};
use crate::error::EngineError;
use crate::runtime_config::VolumeDeltaThresholds;
use crate::session::current_session;
use crate::types::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowDirection {
    Buying,
    Selling,
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceKind {
    /// Price falling while delta rises.
    BullishDivergence,
    /// Price rising while delta falls.
    BearishDivergence,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolumeDeltaResult {
    pub cumulative_delta: f64,
    pub total_volume: f64,
    /// cumulative delta / total volume, in [−1, 1].
    pub delta_share: f64,
    pub direction: FlowDirection,
    pub divergence: bool,
    pub divergence_kind: Option<DivergenceKind>,
    pub window_price_change: f64,
    pub window_delta: f64,
    pub sample_count: usize,
}

/// Signed delta of `bar` against the bar before it.
pub fn bar_delta(prev: &Bar, bar: &Bar) -> f64 {
    let mid = (prev.high + prev.low) / 2.0;
    if bar.close > mid {
        bar.volume
    } else if bar.close < mid {
        -bar.volume
    } else {
        0.0
    }
}

pub fn compute_volume_delta(
    bars: &[Bar],
    t: &VolumeDeltaThresholds,
) -> Result<VolumeDeltaResult, EngineError> {
    let bars: Vec<&Bar> = current_session(bars)
        .iter()
        .filter(|b| b.volume.is_finite() && b.volume >= 0.0 && b.close.is_finite())
        .collect();
    if bars.len() < 2 {
        return Err(EngineError::unavailable(
            "volume delta needs at least two intraday bars",
        ));
    }

    let deltas: Vec<f64> = bars.windows(2).map(|w| bar_delta(w[0], w[1])).collect();
    let cumulative_delta: f64 = deltas.iter().sum();
    let total_volume: f64 = bars[1..].iter().map(|b| b.volume).sum();
    let delta_share = if total_volume > 0.0 {
        cumulative_delta / total_volume
    } else {
        0.0
    };

    let direction = if delta_share > t.direction_band {
        FlowDirection::Buying
    } else if delta_share < -t.direction_band {
        FlowDirection::Selling
    } else {
        FlowDirection::Balanced
    };

    let n = t.divergence_lookback.clamp(1, deltas.len());
    let window_delta: f64 = deltas[deltas.len() - n..].iter().sum();
    let last_close = bars[bars.len() - 1].close;
    let window_price_change = last_close - bars[bars.len() - 1 - n].close;

    let divergence_kind = if window_price_change > 0.0 && window_delta < 0.0 {
        Some(DivergenceKind::BearishDivergence)
    } else if window_price_change < 0.0 && window_delta > 0.0 {
        Some(DivergenceKind::BullishDivergence)
    } else {
        None
    };

    Ok(VolumeDeltaResult {
        cumulative_delta,
        total_volume,
        delta_share,
        direction,
        divergence: divergence_kind.is_some(),
        divergence_kind,
        window_price_change,
        window_delta,
        sample_count: deltas.len(),
    })
}

// =============================================================================
// Computer
// =============================================================================

pub struct VolumeDeltaComputer {
    thresholds: VolumeDeltaThresholds,
}

impl VolumeDeltaComputer {
    pub fn new(thresholds: VolumeDeltaThresholds) -> Self {
        Self { thresholds }
    }
}

impl SignalComputer for VolumeDeltaComputer {
    fn kind(&self) -> SignalKind {
        SignalKind::VolumeDelta
    }

    fn compute(&self, inputs: &MarketInputs) -> SignalOutcome<SignalPayload> {
        let result = inputs
            .bars()
            .and_then(|bars| compute_volume_delta(bars, &self.thresholds));
        if let Ok(r) = &result {
            debug!(
                symbol = %inputs.symbol,
                cumulative = format!("{:.0}", r.cumulative_delta),
                direction = ?r.direction,
                divergence = r.divergence,
                "volume delta computed"
            );
        }
        SignalOutcome::from(result).map(SignalPayload::VolumeDelta)
    }
}
