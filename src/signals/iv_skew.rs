// =============================================================================
// IV Skew — 25-delta put vs call implied volatility
// =============================================================================
//
// Each side's 25-delta IV is a linear interpolation of IV against |delta|
// between the two contracts bracketing 0.25.  A side that does not bracket
// falls back to the contract with the nearest |delta| and the result is
// flagged degraded with reduced confidence.  A side with no usable delta at
// all makes the whole signal unavailable.

use serde::Serialize;
use tracing::debug;

use super::chain::{atm_iv, nearest_strike};
use super::{MarketInputs, SignalComputer, SignalKind, SignalOutcome, SignalPayload};
use crate::error::EngineError;
use crate::runtime_config::SkewThresholds;
use crate::types::{OptionKind, OptionsChainEntry};

const TARGET_DELTA: f64 = 0.25;

/// Confidence by number of sides that needed the nearest-delta fallback.
const CONFIDENCE_BY_FALLBACKS: [f64; 3] = [1.0, 0.6, 0.3];

#[derive(Debug, Clone, Serialize)]
pub struct IvSkewResult {
    pub atm_strike: f64,
    pub atm_iv: Option<f64>,
    pub put_25d_iv: f64,
    pub call_25d_iv: f64,
    /// put − call, in IV percentage points.
    pub skew: f64,
    pub skew_ratio: Option<f64>,
    pub interpretation: String,
    pub degraded: bool,
    pub confidence: f64,
}

/// IV at `target` |delta| on one side of the chain.
/// Returns `(iv, bracketed)`; `None` when the side has no usable point.
pub fn iv_at_delta(
    chain: &[OptionsChainEntry],
    side: OptionKind,
    target: f64,
) -> Option<(f64, bool)> {
    let mut points: Vec<(f64, f64)> = chain
        .iter()
        .filter(|e| e.kind == side)
        .filter(|e| e.delta.is_finite() && e.delta != 0.0)
        .filter(|e| e.implied_volatility.is_finite() && e.implied_volatility > 0.0)
        .map(|e| (e.delta.abs(), e.implied_volatility))
        .collect();
    if points.is_empty() {
        return None;
    }
    points.sort_by(|a, b| a.0.total_cmp(&b.0));

    for w in points.windows(2) {
        let ((d0, iv0), (d1, iv1)) = (w[0], w[1]);
        if d0 <= target && target <= d1 {
            if d1 == d0 {
                return Some(((iv0 + iv1) / 2.0, true));
            }
            let t = (target - d0) / (d1 - d0);
            return Some((iv0 + (iv1 - iv0) * t, true));
        }
    }

    // Exact single-point hit still counts as bracketed.
    let nearest = points
        .iter()
        .min_by(|a, b| (a.0 - target).abs().total_cmp(&(b.0 - target).abs()))?;
    Some((nearest.1, nearest.0 == target))
}

/// First bucket whose cutoff the skew exceeds, else the fallback label.
pub fn classify_skew(skew: f64, t: &SkewThresholds) -> String {
    t.buckets
        .iter()
        .find(|b| skew > b.above)
        .map(|b| b.label.clone())
        .unwrap_or_else(|| t.fallback_label.clone())
}

pub fn compute_iv_skew(
    chain: &[OptionsChainEntry],
    spot: f64,
    thresholds: &SkewThresholds,
) -> Result<IvSkewResult, EngineError> {
    let atm_strike = nearest_strike(chain, spot)
        .ok_or_else(|| EngineError::unavailable("options chain has no valid strikes"))?;

    let (put_25d_iv, put_ok) = iv_at_delta(chain, OptionKind::Put, TARGET_DELTA)
        .ok_or_else(|| EngineError::degraded("no put contracts with usable delta and IV"))?;
    let (call_25d_iv, call_ok) = iv_at_delta(chain, OptionKind::Call, TARGET_DELTA)
        .ok_or_else(|| EngineError::degraded("no call contracts with usable delta and IV"))?;

    let fallbacks = usize::from(!put_ok) + usize::from(!call_ok);
    let skew = put_25d_iv - call_25d_iv;

    Ok(IvSkewResult {
        atm_strike,
        atm_iv: atm_iv(chain, spot).map(|(_, iv)| iv),
        put_25d_iv,
        call_25d_iv,
        skew,
        skew_ratio: (call_25d_iv > 0.0).then(|| put_25d_iv / call_25d_iv),
        interpretation: classify_skew(skew, thresholds),
        degraded: fallbacks > 0,
        confidence: CONFIDENCE_BY_FALLBACKS[fallbacks],
    })
}

// =============================================================================
// Computer
// =============================================================================

pub struct IvSkewComputer {
    thresholds: SkewThresholds,
}

impl IvSkewComputer {
    pub fn new(thresholds: SkewThresholds) -> Self {
        Self { thresholds }
    }
}

impl SignalComputer for IvSkewComputer {
    fn kind(&self) -> SignalKind {
        SignalKind::IvSkew
    }

    fn compute(&self, inputs: &MarketInputs) -> SignalOutcome<SignalPayload> {
        let result = inputs
            .chain()
            .and_then(|chain| compute_iv_skew(chain, inputs.spot, &self.thresholds));
        if let Ok(r) = &result {
            debug!(
                symbol = %inputs.symbol,
                skew = format!("{:.2}", r.skew),
                label = %r.interpretation,
                degraded = r.degraded,
                "iv skew computed"
            );
        }
        SignalOutcome::from(result).map(SignalPayload::IvSkew)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(strike: f64, kind: OptionKind, delta: f64, iv: f64) -> OptionsChainEntry {
        OptionsChainEntry {
            strike,
            kind,
            volume: 0,
            open_interest: 0,
            delta,
            gamma: 0.0,
            theta: 0.0,
            vega: 0.0,
            implied_volatility: iv,
        }
    }

    fn bracketing_chain() -> Vec<OptionsChainEntry> {
        vec![
            contract(90.0, OptionKind::Put, -0.20, 26.0),
            contract(95.0, OptionKind::Put, -0.30, 24.0),
            contract(100.0, OptionKind::Put, -0.50, 21.0),
            contract(100.0, OptionKind::Call, 0.50, 19.0),
            contract(105.0, OptionKind::Call, 0.30, 17.0),
            contract(110.0, OptionKind::Call, 0.20, 16.0),
        ]
    }

    #[test]
    fn interpolates_both_sides() {
        let r = compute_iv_skew(&bracketing_chain(), 100.5, &SkewThresholds::default()).unwrap();
        assert!((r.put_25d_iv - 25.0).abs() < 1e-9);
        assert!((r.call_25d_iv - 16.5).abs() < 1e-9);
        assert!((r.skew - 8.5).abs() < 1e-9);
        assert_eq!(r.interpretation, "fear skew");
        assert!(!r.degraded);
        assert_eq!(r.confidence, 1.0);
        assert_eq!(r.atm_strike, 100.0);
        assert!((r.atm_iv.unwrap() - 20.0).abs() < 1e-9);
        assert!((r.skew_ratio.unwrap() - 25.0 / 16.5).abs() < 1e-9);
    }

    #[test]
    fn falls_back_to_nearest_delta_with_reduced_confidence() {
        // Puts never reach 0.25: nearest is 0.30.
        let chain = vec![
            contract(95.0, OptionKind::Put, -0.30, 24.0),
            contract(100.0, OptionKind::Put, -0.50, 21.0),
            contract(105.0, OptionKind::Call, 0.30, 17.0),
            contract(110.0, OptionKind::Call, 0.20, 16.0),
        ];
        let r = compute_iv_skew(&chain, 100.0, &SkewThresholds::default()).unwrap();
        assert!(r.degraded);
        assert!((r.confidence - 0.6).abs() < 1e-12);
        assert!((r.put_25d_iv - 24.0).abs() < 1e-12);
    }

    #[test]
    fn both_sides_falling_back_lowers_confidence_further() {
        let chain = vec![
            contract(95.0, OptionKind::Put, -0.40, 24.0),
            contract(105.0, OptionKind::Call, 0.40, 17.0),
        ];
        let r = compute_iv_skew(&chain, 100.0, &SkewThresholds::default()).unwrap();
        assert!(r.degraded);
        assert!((r.confidence - 0.3).abs() < 1e-12);
    }

    #[test]
    fn side_without_delta_is_degraded_unavailable() {
        let chain = vec![
            contract(95.0, OptionKind::Put, 0.0, 24.0),
            contract(105.0, OptionKind::Call, 0.25, 17.0),
        ];
        let err = compute_iv_skew(&chain, 100.0, &SkewThresholds::default()).unwrap_err();
        assert!(matches!(err, EngineError::ComputationDegraded(_)));
    }

    #[test]
    fn bucket_table_is_first_match() {
        let t = SkewThresholds::default();
        assert_eq!(classify_skew(12.0, &t), "extreme fear skew");
        assert_eq!(classify_skew(5.5, &t), "fear skew");
        assert_eq!(classify_skew(5.0, &t), "normal");
        assert_eq!(classify_skew(0.0, &t), "normal");
        assert_eq!(classify_skew(-2.0, &t), "call skew");
        assert_eq!(classify_skew(-4.0, &t), "call skew");
    }
}
