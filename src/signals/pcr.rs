// =============================================================================
// Put/Call Ratio — crowd positioning from chain volume and open interest
// =============================================================================
//
// overall PCR      = Σ put volume / Σ call volume
// OI-weighted PCR  = Σ put OI / Σ call OI
//
// A ratio with a zero denominator is reported as `None` (never 0 or NaN) and
// the reason is carried in `degraded_reason`.  Max pain is the strike that
// minimises the intrinsic value option holders would collect at expiry.

use serde::Serialize;
use tracing::debug;

use super::chain::group_by_strike;
use super::{MarketInputs, SignalComputer, SignalKind, SignalOutcome, SignalPayload};
use crate::error::EngineError;
use crate::runtime_config::PcrThresholds;
use crate::types::{Bias, OptionsChainEntry};

#[derive(Debug, Clone, Serialize)]
pub struct StrikeActivity {
    pub strike: f64,
    pub call_volume: u64,
    pub put_volume: u64,
    pub call_oi: u64,
    pub put_oi: u64,
    /// put / call volume at this strike; `None` without call volume.
    pub volume_ratio: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PcrResult {
    pub strikes: Vec<StrikeActivity>,
    pub total_call_volume: u64,
    pub total_put_volume: u64,
    pub total_call_oi: u64,
    pub total_put_oi: u64,
    pub overall_pcr: Option<f64>,
    pub oi_weighted_pcr: Option<f64>,
    pub interpretation: Bias,
    pub max_pain: Option<f64>,
    pub degraded_reason: Option<String>,
}

impl PcrResult {
    /// Ratio the interpretation was based on: volume first, then OI.
    pub fn headline_ratio(&self) -> Option<f64> {
        self.overall_pcr.or(self.oi_weighted_pcr)
    }
}

fn ratio(puts: u64, calls: u64) -> Option<f64> {
    if calls == 0 {
        None
    } else {
        Some(puts as f64 / calls as f64)
    }
}

/// Map a ratio onto the configured bands.
pub fn interpret_pcr(pcr: f64, t: &PcrThresholds) -> Bias {
    if pcr < t.bullish_below {
        Bias::Bullish
    } else if pcr >= t.bearish_at_or_above {
        Bias::Bearish
    } else {
        Bias::Neutral
    }
}

pub fn compute_pcr(
    chain: &[OptionsChainEntry],
    thresholds: &PcrThresholds,
) -> Result<PcrResult, EngineError> {
    let rows = group_by_strike(chain);
    if rows.is_empty() {
        return Err(EngineError::unavailable("options chain has no valid strikes"));
    }

    let strikes: Vec<StrikeActivity> = rows
        .iter()
        .map(|row| {
            let call_volume = row.calls.iter().map(|e| e.volume).sum();
            let put_volume = row.puts.iter().map(|e| e.volume).sum();
            StrikeActivity {
                strike: row.strike,
                call_volume,
                put_volume,
                call_oi: row.calls.iter().map(|e| e.open_interest).sum(),
                put_oi: row.puts.iter().map(|e| e.open_interest).sum(),
                volume_ratio: ratio(put_volume, call_volume),
            }
        })
        .collect();

    let total_call_volume: u64 = strikes.iter().map(|s| s.call_volume).sum();
    let total_put_volume: u64 = strikes.iter().map(|s| s.put_volume).sum();
    let total_call_oi: u64 = strikes.iter().map(|s| s.call_oi).sum();
    let total_put_oi: u64 = strikes.iter().map(|s| s.put_oi).sum();

    let overall_pcr = ratio(total_put_volume, total_call_volume);
    let oi_weighted_pcr = ratio(total_put_oi, total_call_oi);

    let degraded_reason = match (overall_pcr, oi_weighted_pcr) {
        (Some(_), Some(_)) => None,
        (None, Some(_)) => Some("zero call volume: volume PCR undefined".to_string()),
        (Some(_), None) => Some("zero call open interest: OI PCR undefined".to_string()),
        (None, None) => Some("zero call volume and open interest".to_string()),
    };

    let interpretation = overall_pcr
        .or(oi_weighted_pcr)
        .map(|pcr| interpret_pcr(pcr, thresholds))
        .unwrap_or(Bias::Neutral);

    Ok(PcrResult {
        max_pain: max_pain(&strikes),
        strikes,
        total_call_volume,
        total_put_volume,
        total_call_oi,
        total_put_oi,
        overall_pcr,
        oi_weighted_pcr,
        interpretation,
        degraded_reason,
    })
}

/// Strike minimising total intrinsic payout across all open interest.
/// `None` when there is no open interest at all.  Ties go to the lower strike.
fn max_pain(strikes: &[StrikeActivity]) -> Option<f64> {
    if strikes.iter().all(|s| s.call_oi == 0 && s.put_oi == 0) {
        return None;
    }
    let mut best: Option<(f64, f64)> = None;
    for candidate in strikes {
        let settle = candidate.strike;
        let pain: f64 = strikes
            .iter()
            .map(|s| {
                s.call_oi as f64 * (settle - s.strike).max(0.0)
                    + s.put_oi as f64 * (s.strike - settle).max(0.0)
            })
            .sum();
        if best.map_or(true, |(_, p)| pain < p) {
            best = Some((settle, pain));
        }
    }
    best.map(|(strike, _)| strike)
}

// =============================================================================
// Computer
// =============================================================================

pub struct PcrComputer {
    thresholds: PcrThresholds,
}

impl PcrComputer {
    pub fn new(thresholds: PcrThresholds) -> Self {
        Self { thresholds }
    }
}

impl SignalComputer for PcrComputer {
    fn kind(&self) -> SignalKind {
        SignalKind::Pcr
    }

    fn compute(&self, inputs: &MarketInputs) -> SignalOutcome<SignalPayload> {
        let result = inputs
            .chain()
            .and_then(|chain| compute_pcr(chain, &self.thresholds));
        if let Ok(r) = &result {
            debug!(
                symbol = %inputs.symbol,
                pcr = ?r.overall_pcr,
                oi_pcr = ?r.oi_weighted_pcr,
                bias = %r.interpretation,
                "pcr computed"
            );
        }
        SignalOutcome::from(result).map(SignalPayload::Pcr)
    }
}
