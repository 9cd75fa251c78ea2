// =============================================================================
// Unified Score Fusion — weighted, renormalised signal aggregation
// =============================================================================
//
// 1. Each available signal is mapped to a contribution in [-1, 1] by its
//    adapter (direction × magnitude).  Adapters may decline (`None`).
// 2. Weights of the contributing signals are renormalised to sum to 1, so a
//    partial snapshot is not dragged toward zero by missing inputs.
// 3. score = Σ(applied weight × contribution) × 100, clamped to ±100.
// 4. confidence = 0.7 × agreement + 0.3 × completeness.

use serde::Serialize;
use tracing::debug;

use super::gex::GammaRegime;
use super::macro_regime::{DollarPressure, MacroRegime};
use super::momentum::MomentumRegime;
use super::thesis::compose_thesis;
use super::vix_regime::{TermStructure, VolRegime};
use super::SignalKind;
use crate::runtime_config::{SignalWeights, Thresholds};
use crate::snapshot::SignalSet;
use crate::types::Bias;

/// |contribution| below this counts as pointing nowhere.
const DIRECTION_DEADBAND: f64 = 0.05;
const TOP_SIGNALS: usize = 3;
const AGREEMENT_WEIGHT: f64 = 0.7;
const COMPLETENESS_WEIGHT: f64 = 0.3;

/// The contribution of a single signal to the final score.
#[derive(Debug, Clone, Serialize)]
pub struct SignalContribution {
    pub signal: SignalKind,
    /// Configured weight before renormalisation.
    pub base_weight: f64,
    /// Renormalised weight; sums to 1 across contributions.
    pub applied_weight: f64,
    /// Adapter output in [-1, 1].
    pub contribution: f64,
    /// applied_weight × contribution × 100, in score points.
    pub weighted: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnifiedScoreResult {
    pub score: f64,
    pub direction: Bias,
    pub confidence: f64,
    pub agreement: f64,
    pub completeness: f64,
    pub top_signals: Vec<SignalKind>,
    pub contributions: Vec<SignalContribution>,
    pub thesis: String,
}

pub struct ScoreFusion {
    weights: SignalWeights,
    thresholds: Thresholds,
}

impl ScoreFusion {
    pub fn new(weights: SignalWeights, thresholds: Thresholds) -> Self {
        Self {
            weights,
            thresholds,
        }
    }

    /// Normalised contribution of `kind`, or `None` when the signal is
    /// unavailable or carries no directional information.
    pub fn adapt(&self, kind: SignalKind, signals: &SignalSet) -> Option<f64> {
        let t = &self.thresholds;
        let raw = match kind {
            SignalKind::Pcr => {
                let r = signals.pcr.available()?;
                let pcr = r.headline_ratio()?;
                let (lo, hi) = (t.pcr.bullish_below, t.pcr.bearish_at_or_above);
                1.0 - 2.0 * (pcr - lo) / (hi - lo)
            }
            SignalKind::Gex => {
                let r = signals.gex.available()?;
                match r.spot_to_flip_pct {
                    Some(pct) => pct,
                    None => match r.gamma_regime {
                        GammaRegime::Positive => 0.3,
                        GammaRegime::Negative => -0.3,
                    },
                }
            }
            SignalKind::IvSkew => {
                let r = signals.iv_skew.available()?;
                let (call, fear) = (t.skew.call_cutoff(), t.skew.fear_cutoff());
                if !(fear > call) || !fear.is_finite() {
                    return None;
                }
                let linear = 1.0 - 2.0 * (r.skew - call) / (fear - call);
                linear.clamp(-1.0, 1.0) * r.confidence
            }
            SignalKind::VixRegime => {
                let r = signals.vix_regime.available()?;
                let band = match r.regime {
                    VolRegime::Complacent => 0.5,
                    VolRegime::Normal => 0.25,
                    VolRegime::Elevated => -0.25,
                    VolRegime::Panic => -0.75,
                };
                let term = match r.term_structure {
                    Some(TermStructure::Contango) => 0.25,
                    Some(TermStructure::Backwardation) => -0.5,
                    Some(TermStructure::Flat) | None => 0.0,
                };
                band + term
            }
            SignalKind::MacroRegime => {
                let r = signals.macro_regime.available()?;
                let regime = match r.regime {
                    MacroRegime::RiskOn => 0.6,
                    MacroRegime::RiskOff => -0.6,
                    MacroRegime::Mixed | MacroRegime::Neutral => 0.0,
                };
                let dollar = match r.dollar_pressure {
                    DollarPressure::Tailwind => 0.2,
                    DollarPressure::Headwind => -0.2,
                    DollarPressure::Neutral => 0.0,
                };
                regime + dollar
            }
            SignalKind::VwapBands => signals.vwap_bands.available()?.sigma_distance / 2.0,
            SignalKind::VolumeDelta => {
                let r = signals.volume_delta.available()?;
                let c = (2.0 * r.delta_share).clamp(-1.0, 1.0);
                if r.divergence {
                    c / 2.0
                } else {
                    c
                }
            }
            SignalKind::Momentum => {
                let r = signals.momentum.available()?;
                match r.regime {
                    MomentumRegime::MomentumBullish => r.confidence,
                    MomentumRegime::MomentumBearish => -r.confidence,
                    // Fade the stretch at half strength.
                    MomentumRegime::MeanReversion if r.rsi >= 50.0 => -0.5 * r.confidence,
                    MomentumRegime::MeanReversion => 0.5 * r.confidence,
                    MomentumRegime::Mixed => 0.0,
                }
            }
            SignalKind::ExpectedMove => return None,
        };
        if raw.is_nan() {
            None
        } else {
            Some(raw.clamp(-1.0, 1.0))
        }
    }

    /// Score the snapshot's signals.  Never fails: with nothing to fuse the
    /// result is a neutral zero with zero confidence.
    pub fn fuse(&self, symbol: &str, signals: &SignalSet) -> UnifiedScoreResult {
        let eligible: Vec<SignalKind> = SignalKind::ALL
            .into_iter()
            .filter(|k| self.weights.get(*k) > 0.0)
            .collect();

        let raw: Vec<(SignalKind, f64, f64)> = eligible
            .iter()
            .filter_map(|k| {
                self.adapt(*k, signals)
                    .map(|c| (*k, self.weights.get(*k), c))
            })
            .collect();

        let total_weight: f64 = raw.iter().map(|(_, w, _)| w).sum();
        let contributions: Vec<SignalContribution> = raw
            .into_iter()
            .map(|(signal, base_weight, contribution)| {
                let applied_weight = base_weight / total_weight;
                SignalContribution {
                    signal,
                    base_weight,
                    applied_weight,
                    contribution,
                    weighted: applied_weight * contribution * 100.0,
                }
            })
            .collect();

        let score = contributions
            .iter()
            .map(|c| c.weighted)
            .sum::<f64>()
            .clamp(-100.0, 100.0);

        let st = &self.thresholds.score;
        let direction = if score > st.bullish_above {
            Bias::Bullish
        } else if score < st.bearish_below {
            Bias::Bearish
        } else {
            Bias::Neutral
        };

        let (agreement, completeness) = if contributions.is_empty() {
            (0.0, 0.0)
        } else {
            let n = contributions.len() as f64;
            let bulls = contributions
                .iter()
                .filter(|c| c.contribution > DIRECTION_DEADBAND)
                .count();
            let bears = contributions
                .iter()
                .filter(|c| c.contribution < -DIRECTION_DEADBAND)
                .count();
            let agreeing = match direction {
                Bias::Bullish => bulls,
                Bias::Bearish => bears,
                Bias::Neutral => bulls.max(bears),
            };
            (agreeing as f64 / n, n / eligible.len() as f64)
        };
        let confidence =
            (AGREEMENT_WEIGHT * agreement + COMPLETENESS_WEIGHT * completeness).clamp(0.0, 1.0);

        let mut ranked: Vec<&SignalContribution> = contributions
            .iter()
            .filter(|c| c.weighted != 0.0)
            .collect();
        ranked.sort_by(|a, b| b.weighted.abs().total_cmp(&a.weighted.abs()));
        let top_signals: Vec<SignalKind> =
            ranked.iter().take(TOP_SIGNALS).map(|c| c.signal).collect();

        debug!(
            symbol,
            score = format!("{:.1}", score),
            direction = %direction,
            confidence = format!("{:.2}", confidence),
            contributing = contributions.len(),
            "fusion complete"
        );

        let thesis = compose_thesis(symbol, score, direction, confidence, &top_signals, signals);

        UnifiedScoreResult {
            score,
            direction,
            confidence,
            agreement,
            completeness,
            top_signals,
            contributions,
            thesis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::provider::fixture;
    use crate::runtime_config::EngineConfig;
    use crate::signals::{standard_computers, MarketInputs, SignalOutcome};

    fn fusion() -> ScoreFusion {
        let cfg = EngineConfig::default();
        ScoreFusion::new(cfg.weights, cfg.thresholds)
    }

    fn full_set() -> SignalSet {
        let cfg = EngineConfig::default();
        let inputs: MarketInputs = fixture::sample_inputs();
        let mut set = SignalSet::unavailable(EngineError::unavailable("unset"));
        for c in standard_computers(&cfg) {
            set.place(c.kind(), c.compute(&inputs));
        }
        set
    }

    fn applied_sum(r: &UnifiedScoreResult) -> f64 {
        r.contributions.iter().map(|c| c.applied_weight).sum()
    }

    #[test]
    fn fixture_yields_bounded_score_with_all_signals() {
        let set = full_set();
        assert_eq!(set.available_count(), 9);
        let r = fusion().fuse("SPX", &set);
        assert!(r.score >= -100.0 && r.score <= 100.0);
        assert!((applied_sum(&r) - 1.0).abs() < 1e-9);
        // Expected move carries no weight by default.
        assert!(r.contributions.iter().all(|c| c.signal != SignalKind::ExpectedMove));
        assert_eq!(r.contributions.len(), 8);
        assert!(r.top_signals.len() <= 3);
        assert!((r.completeness - 1.0).abs() < 1e-12);
        assert!(!r.thesis.is_empty());
    }

    #[test]
    fn removing_any_signal_renormalises_and_drops_it_from_top() {
        let f = fusion();
        for kind in SignalKind::ALL {
            let mut set = full_set();
            set.mark_unavailable(kind, EngineError::unavailable("removed"));
            let r = f.fuse("SPX", &set);
            assert!(r.score >= -100.0 && r.score <= 100.0);
            assert!(!r.top_signals.contains(&kind));
            assert!(r.contributions.iter().all(|c| c.signal != kind));
            assert!((applied_sum(&r) - 1.0).abs() < 1e-9, "{kind}");
        }
    }

    #[test]
    fn direction_follows_score_thresholds() {
        let f = fusion();
        let set = full_set();
        let r = f.fuse("SPX", &set);
        match r.direction {
            Bias::Bullish => assert!(r.score > 5.0),
            Bias::Bearish => assert!(r.score < -5.0),
            Bias::Neutral => assert!(r.score >= -5.0 && r.score <= 5.0),
        }
    }

    #[test]
    fn empty_snapshot_is_neutral_with_zero_confidence() {
        let set = SignalSet::unavailable(EngineError::unavailable("provider down"));
        let r = fusion().fuse("SPX", &set);
        assert_eq!(r.score, 0.0);
        assert_eq!(r.direction, Bias::Neutral);
        assert_eq!(r.confidence, 0.0);
        assert!(r.top_signals.is_empty());
        assert!(r.thesis.contains("Insufficient data"));
    }

    #[test]
    fn single_signal_still_fuses() {
        let full = full_set();
        let mut set = SignalSet::unavailable(EngineError::unavailable("down"));
        set.pcr = full.pcr.clone();
        let r = fusion().fuse("SPX", &set);
        assert_eq!(r.contributions.len(), 1);
        assert!((r.contributions[0].applied_weight - 1.0).abs() < 1e-12);
        assert!(r.score.abs() <= 100.0);
        assert!(r.completeness < 0.2);
    }

    #[test]
    fn pcr_adapter_is_linear_between_cutoffs() {
        let f = fusion();
        let mut set = SignalSet::unavailable(EngineError::unavailable("down"));
        let mut pcr = match full_set().pcr {
            SignalOutcome::Available(p) => p,
            SignalOutcome::Unavailable(e) => panic!("fixture pcr unavailable: {e}"),
        };
        for (ratio, want) in [(0.7, 1.0), (1.1, 0.0), (1.5, -1.0), (3.0, -1.0)] {
            pcr.overall_pcr = Some(ratio);
            set.pcr = SignalOutcome::Available(pcr.clone());
            let got = f.adapt(SignalKind::Pcr, &set).unwrap();
            assert!((got - want).abs() < 1e-9, "pcr {ratio}: {got} vs {want}");
        }
    }

    #[test]
    fn confidence_and_agreement_stay_in_unit_range() {
        let f = fusion();
        let mut set = full_set();
        if let SignalOutcome::Available(m) = &mut set.momentum {
            m.regime = MomentumRegime::MomentumBullish;
            m.confidence = 1.0;
        }
        let r = f.fuse("SPX", &set);
        assert!(r.confidence >= 0.0 && r.confidence <= 1.0);
        assert!(r.agreement >= 0.0 && r.agreement <= 1.0);
    }
}
