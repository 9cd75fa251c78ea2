// =============================================================================
// Expected Move — ATM IV scaled to 1 and 5 trading days
// =============================================================================
//
//   move(d) = spot × (ATM IV / 100) × √(d / annualisation_days)

use serde::Serialize;
use tracing::debug;

use super::chain::atm_iv;
use super::{MarketInputs, SignalComputer, SignalKind, SignalOutcome, SignalPayload};
use crate::error::EngineError;
use crate::runtime_config::ExpectedMoveParams;
use crate::types::OptionsChainEntry;

#[derive(Debug, Clone, Serialize)]
pub struct ExpectedMoveResult {
    pub spot: f64,
    pub atm_strike: f64,
    pub atm_iv: f64,
    pub daily_move: f64,
    pub daily_move_pct: f64,
    pub daily_upper: f64,
    pub daily_lower: f64,
    pub weekly_move: f64,
    pub weekly_move_pct: f64,
    pub weekly_upper: f64,
    pub weekly_lower: f64,
}

/// One-sigma move over `days` trading days.
pub fn scaled_move(spot: f64, iv_pct: f64, days: f64, annualization_days: f64) -> f64 {
    spot * (iv_pct / 100.0) * (days / annualization_days).sqrt()
}

pub fn compute_expected_move(
    chain: &[OptionsChainEntry],
    spot: f64,
    p: &ExpectedMoveParams,
) -> Result<ExpectedMoveResult, EngineError> {
    if !spot.is_finite() || spot <= 0.0 {
        return Err(EngineError::degraded(format!("invalid spot {spot}")));
    }
    let (atm_strike, atm_iv) = atm_iv(chain, spot)
        .ok_or_else(|| EngineError::degraded("no usable ATM implied volatility"))?;

    let daily_move = scaled_move(spot, atm_iv, 1.0, p.annualization_days);
    let weekly_move = scaled_move(spot, atm_iv, p.weekly_days, p.annualization_days);

    Ok(ExpectedMoveResult {
        spot,
        atm_strike,
        atm_iv,
        daily_move,
        daily_move_pct: daily_move / spot * 100.0,
        daily_upper: spot + daily_move,
        daily_lower: spot - daily_move,
        weekly_move,
        weekly_move_pct: weekly_move / spot * 100.0,
        weekly_upper: spot + weekly_move,
        weekly_lower: spot - weekly_move,
    })
}

// =============================================================================
// Computer
// =============================================================================

pub struct ExpectedMoveComputer {
    params: ExpectedMoveParams,
}

impl ExpectedMoveComputer {
    pub fn new(params: ExpectedMoveParams) -> Self {
        Self { params }
    }
}

impl SignalComputer for ExpectedMoveComputer {
    fn kind(&self) -> SignalKind {
        SignalKind::ExpectedMove
    }

    fn compute(&self, inputs: &MarketInputs) -> SignalOutcome<SignalPayload> {
        let result = inputs
            .chain()
            .and_then(|chain| compute_expected_move(chain, inputs.spot, &self.params));
        if let Ok(r) = &result {
            debug!(
                symbol = %inputs.symbol,
                daily = format!("{:.2}", r.daily_move),
                weekly = format!("{:.2}", r.weekly_move),
                "expected move computed"
            );
        }
        SignalOutcome::from(result).map(SignalPayload::ExpectedMove)
    }
}
