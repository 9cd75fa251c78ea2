// =============================================================================
// Dealer Gamma Exposure (GEX)
// =============================================================================
//
// Per strike:
//   call_gex = Σ call OI × gamma × spot² × 0.01      (dealers long gamma)
//   put_gex  = Σ put  OI × gamma × spot² × 0.01      (dealers short gamma)
//   net_gex  = call_gex − put_gex
//
// Flip point: walk strikes ascending, accumulate net GEX, and linearly
// interpolate the strike where the cumulative curve changes sign.  When the
// curve crosses more than once the crossing closest to spot wins.  Exact
// zeros on the curve are skipped so interpolation always brackets the last
// non-zero cumulative value.

use serde::Serialize;
use tracing::debug;

use super::chain::group_by_strike;
use super::{MarketInputs, SignalComputer, SignalKind, SignalOutcome, SignalPayload};
use crate::error::EngineError;
use crate::runtime_config::GexThresholds;
use crate::types::OptionsChainEntry;

/// Exposure per 1% move of the underlying.
const ONE_PERCENT: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelKind {
    Support,
    Resistance,
    Magnet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GammaRegime {
    /// Dealers long gamma: hedging dampens moves.
    Positive,
    /// Dealers short gamma: hedging amplifies moves.
    Negative,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrikeGex {
    pub strike: f64,
    pub call_gex: f64,
    pub put_gex: f64,
    pub net_gex: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GexLevel {
    pub strike: f64,
    pub net_gex: f64,
    pub kind: LevelKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct GexResult {
    pub spot: f64,
    pub strikes: Vec<StrikeGex>,
    pub total_net_gex: f64,
    pub flip_point: Option<f64>,
    /// (spot − flip) / flip in percent.
    pub spot_to_flip_pct: Option<f64>,
    pub max_gamma_strike: Option<f64>,
    pub gamma_regime: GammaRegime,
    pub top_levels: Vec<GexLevel>,
}

pub fn compute_gex(
    chain: &[OptionsChainEntry],
    spot: f64,
    thresholds: &GexThresholds,
) -> Result<GexResult, EngineError> {
    if !spot.is_finite() || spot <= 0.0 {
        return Err(EngineError::degraded(format!("invalid spot {spot}")));
    }

    let scale = spot * spot * ONE_PERCENT;
    let exposure = |rows: &[&OptionsChainEntry]| -> f64 {
        rows.iter()
            .filter(|e| e.gamma.is_finite())
            .map(|e| e.open_interest as f64 * e.gamma * scale)
            .sum()
    };

    let strikes: Vec<StrikeGex> = group_by_strike(chain)
        .iter()
        .map(|row| {
            let call_gex = exposure(&row.calls);
            let put_gex = exposure(&row.puts);
            StrikeGex {
                strike: row.strike,
                call_gex,
                put_gex,
                net_gex: call_gex - put_gex,
            }
        })
        .collect();

    if strikes.is_empty() {
        return Err(EngineError::unavailable("options chain has no valid strikes"));
    }

    let total_net_gex: f64 = strikes.iter().map(|s| s.net_gex).sum();
    let flip_point = find_flip_point(&strikes, spot);

    let max_gamma_strike = strikes
        .iter()
        .filter(|s| s.net_gex != 0.0)
        .max_by(|a, b| a.net_gex.abs().total_cmp(&b.net_gex.abs()))
        .map(|s| s.strike);

    let gamma_regime = if total_net_gex >= 0.0 {
        GammaRegime::Positive
    } else {
        GammaRegime::Negative
    };

    Ok(GexResult {
        spot,
        total_net_gex,
        spot_to_flip_pct: flip_point.map(|f| (spot - f) / f * 100.0),
        flip_point,
        max_gamma_strike,
        gamma_regime,
        top_levels: rank_levels(&strikes, spot, thresholds),
        strikes,
    })
}

/// Zero crossing of the cumulative net-GEX curve.  `strikes` must be sorted
/// ascending.  Fewer than two strikes never crosses.
pub fn find_flip_point(strikes: &[StrikeGex], spot: f64) -> Option<f64> {
    let mut cumulative = 0.0;
    let mut anchor: Option<(f64, f64)> = None;
    let mut crossings: Vec<f64> = Vec::new();

    for s in strikes {
        cumulative += s.net_gex;
        if cumulative == 0.0 || !cumulative.is_finite() {
            continue;
        }
        if let Some((k0, c0)) = anchor {
            if c0.signum() != cumulative.signum() {
                let t = c0 / (c0 - cumulative);
                crossings.push(k0 + (s.strike - k0) * t);
            }
        }
        anchor = Some((s.strike, cumulative));
    }

    crossings
        .into_iter()
        .min_by(|a, b| (a - spot).abs().total_cmp(&(b - spot).abs()))
}

/// Largest |net GEX| strikes, tagged relative to spot.
fn rank_levels(strikes: &[StrikeGex], spot: f64, t: &GexThresholds) -> Vec<GexLevel> {
    let max_abs = strikes
        .iter()
        .map(|s| s.net_gex.abs())
        .fold(0.0_f64, f64::max);
    let strong = t.strong_level_fraction * max_abs;

    let mut ranked: Vec<&StrikeGex> = strikes.iter().filter(|s| s.net_gex != 0.0).collect();
    ranked.sort_by(|a, b| b.net_gex.abs().total_cmp(&a.net_gex.abs()));

    ranked
        .into_iter()
        .take(t.top_levels)
        .map(|s| {
            let kind = if s.net_gex > 0.0 && s.net_gex >= strong && s.strike < spot {
                LevelKind::Support
            } else if s.net_gex < 0.0 && -s.net_gex >= strong && s.strike > spot {
                LevelKind::Resistance
            } else {
                LevelKind::Magnet
            };
            GexLevel {
                strike: s.strike,
                net_gex: s.net_gex,
                kind,
            }
        })
        .collect()
}

// =============================================================================
// Computer
// =============================================================================

pub struct GexComputer {
    thresholds: GexThresholds,
}

impl GexComputer {
    pub fn new(thresholds: GexThresholds) -> Self {
        Self { thresholds }
    }
}

impl SignalComputer for GexComputer {
    fn kind(&self) -> SignalKind {
        SignalKind::Gex
    }

    fn compute(&self, inputs: &MarketInputs) -> SignalOutcome<SignalPayload> {
        let result = inputs
            .chain()
            .and_then(|chain| compute_gex(chain, inputs.spot, &self.thresholds));
        if let Ok(r) = &result {
            debug!(
                symbol = %inputs.symbol,
                total_net_gex = format!("{:.0}", r.total_net_gex),
                flip = ?r.flip_point,
                regime = ?r.gamma_regime,
                "gex computed"
            );
        }
        SignalOutcome::from(result).map(SignalPayload::Gex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OptionKind;

    const SPOT: f64 = 5987.25;

    fn contract(strike: f64, kind: OptionKind, oi: u64, gamma: f64) -> OptionsChainEntry {
        OptionsChainEntry {
            strike,
            kind,
            volume: 0,
            open_interest: oi,
            delta: 0.0,
            gamma,
            theta: 0.0,
            vega: 0.0,
            implied_volatility: 0.0,
        }
    }

    /// Five strikes with hand-computable exposure (in units of spot² × 0.01):
    /// net = −5.0, −3.4, +9.4, +4.4, +1.25.
    fn worked_chain() -> Vec<OptionsChainEntry> {
        vec![
            contract(5900.0, OptionKind::Call, 1000, 0.0010),
            contract(5900.0, OptionKind::Put, 5000, 0.0012),
            contract(5950.0, OptionKind::Call, 2000, 0.0015),
            contract(5950.0, OptionKind::Put, 4000, 0.0016),
            contract(6000.0, OptionKind::Call, 6500, 0.0020),
            contract(6000.0, OptionKind::Put, 2000, 0.0018),
            contract(6050.0, OptionKind::Call, 4000, 0.0014),
            contract(6050.0, OptionKind::Put, 1000, 0.0012),
            contract(6100.0, OptionKind::Call, 2000, 0.0008),
            contract(6100.0, OptionKind::Put, 500, 0.0007),
        ]
    }

    fn scale() -> f64 {
        SPOT * SPOT * 0.01
    }

    #[test]
    fn worked_example_per_strike_net_gex() {
        let r = compute_gex(&worked_chain(), SPOT, &GexThresholds::default()).unwrap();
        let expected = [-5.0, -3.4, 9.4, 4.4, 1.25];
        assert_eq!(r.strikes.len(), 5);
        for (s, units) in r.strikes.iter().zip(expected) {
            let want = units * scale();
            assert!(
                (s.net_gex - want).abs() < 1e-6 * scale(),
                "strike {} net {} want {}",
                s.strike,
                s.net_gex,
                want
            );
        }
        assert!((r.total_net_gex - 6.65 * scale()).abs() < 1e-6 * scale());
        assert_eq!(r.gamma_regime, GammaRegime::Positive);
        assert_eq!(r.max_gamma_strike, Some(6000.0));
    }

    #[test]
    fn worked_example_flip_point() {
        let r = compute_gex(&worked_chain(), SPOT, &GexThresholds::default()).unwrap();
        // Cumulative: −5, −8.4, +1.0 → cross between 5950 and 6000.
        let manual = 5950.0 + 50.0 * (8.4 / 9.4);
        let flip = r.flip_point.unwrap();
        assert!((flip - manual).abs() < 1e-6, "flip {flip} manual {manual}");
        assert!(flip > 5950.0 && flip < 6000.0);
        let pct = r.spot_to_flip_pct.unwrap();
        assert!(pct < 0.0);
    }

    #[test]
    fn worked_example_levels_are_ranked_and_tagged() {
        let r = compute_gex(&worked_chain(), SPOT, &GexThresholds::default()).unwrap();
        let strikes: Vec<f64> = r.top_levels.iter().map(|l| l.strike).collect();
        assert_eq!(strikes, vec![6000.0, 5900.0, 6050.0, 5950.0, 6100.0]);
        // Strong positive walls sit above spot and strong negative ones below,
        // so nothing qualifies as support or resistance here.
        assert!(r.top_levels.iter().all(|l| l.kind == LevelKind::Magnet));
    }

    #[test]
    fn support_and_resistance_tags() {
        let chain = vec![
            contract(90.0, OptionKind::Call, 1000, 0.05),
            contract(110.0, OptionKind::Put, 1000, 0.05),
            contract(105.0, OptionKind::Call, 10, 0.01),
        ];
        let r = compute_gex(&chain, 100.0, &GexThresholds::default()).unwrap();
        let kind_at = |k: f64| r.top_levels.iter().find(|l| l.strike == k).map(|l| l.kind);
        assert_eq!(kind_at(90.0), Some(LevelKind::Support));
        assert_eq!(kind_at(110.0), Some(LevelKind::Resistance));
        // Weak level is always a magnet.
        assert_eq!(kind_at(105.0), Some(LevelKind::Magnet));
    }

    #[test]
    fn flip_lies_strictly_between_bracketing_strikes() {
        // (net GEX per strike, lower bracket, upper bracket)
        let cases: [(&[(f64, f64)], f64, f64); 3] = [
            (&[(100.0, -1.0), (110.0, 3.0)], 100.0, 110.0),
            (&[(100.0, 2.0), (105.0, -0.5), (110.0, -4.0)], 105.0, 110.0),
            // Cumulative −1, 0, +0.5: the zero at 101 is not a bracket.
            (&[(100.0, -1.0), (101.0, 1.0), (102.0, 0.5)], 100.0, 102.0),
        ];
        for (curve, lo, hi) in cases {
            let strikes: Vec<StrikeGex> = curve
                .iter()
                .map(|(k, n)| StrikeGex {
                    strike: *k,
                    call_gex: 0.0,
                    put_gex: 0.0,
                    net_gex: *n,
                })
                .collect();
            let flip = find_flip_point(&strikes, lo).unwrap();
            assert!(flip > lo && flip < hi, "flip {flip} not in ({lo}, {hi})");
        }
    }

    #[test]
    fn skips_exact_zero_on_the_curve() {
        let strikes: Vec<StrikeGex> = [(100.0, -2.0), (105.0, 2.0), (110.0, 2.0)]
            .iter()
            .map(|(k, n)| StrikeGex {
                strike: *k,
                call_gex: 0.0,
                put_gex: 0.0,
                net_gex: *n,
            })
            .collect();
        // Cumulative −2, 0, +2: interpolate between 100 and 110.
        let flip = find_flip_point(&strikes, 105.0).unwrap();
        assert!((flip - 105.0).abs() < 1e-12);
    }

    #[test]
    fn multiple_crossings_pick_nearest_spot() {
        let strikes: Vec<StrikeGex> = [(100.0, -1.0), (110.0, 2.0), (120.0, -2.0), (130.0, 2.0)]
            .iter()
            .map(|(k, n)| StrikeGex {
                strike: *k,
                call_gex: 0.0,
                put_gex: 0.0,
                net_gex: *n,
            })
            .collect();
        // Cumulative −1, +1, −1, +1 → crossings at 105, 115, 125.
        let near_low = find_flip_point(&strikes, 104.0).unwrap();
        let near_high = find_flip_point(&strikes, 128.0).unwrap();
        assert!((near_low - 105.0).abs() < 1e-9);
        assert!((near_high - 125.0).abs() < 1e-9);
    }

    #[test]
    fn single_strike_or_no_crossing_has_no_flip() {
        let one = vec![contract(100.0, OptionKind::Call, 10, 0.1)];
        let r = compute_gex(&one, 100.0, &GexThresholds::default()).unwrap();
        assert!(r.flip_point.is_none());

        let all_calls = vec![
            contract(100.0, OptionKind::Call, 10, 0.1),
            contract(110.0, OptionKind::Call, 10, 0.1),
        ];
        let r = compute_gex(&all_calls, 100.0, &GexThresholds::default()).unwrap();
        assert!(r.flip_point.is_none());
        assert!(r.spot_to_flip_pct.is_none());
    }

    #[test]
    fn invalid_spot_is_degraded() {
        let err = compute_gex(&worked_chain(), 0.0, &GexThresholds::default()).unwrap_err();
        assert!(matches!(err, EngineError::ComputationDegraded(_)));
    }
}
