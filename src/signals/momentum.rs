// =============================================================================
// Momentum Regime — RSI, EMA alignment and short regression slope
// =============================================================================
//
// Stretched RSI (>= overbought or <= oversold) is read as mean reversion.
// Otherwise three indicators vote:
//   RSI above/below the vote cutoffs
//   EMA fast/slow alignment with the last close
//   slope of the last few closes (percent of their mean, per bar)
// Two or more agreeing votes with none opposing give a directional regime.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::{MarketInputs, SignalComputer, SignalKind, SignalOutcome, SignalPayload};
use crate::error::EngineError;
use crate::indicators::{last_ema, regression_slope, wilder_rsi};
use crate::runtime_config::MomentumThresholds;
use crate::session::session_date;
use crate::types::DailyClose;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumRegime {
    MomentumBullish,
    MomentumBearish,
    MeanReversion,
    Mixed,
}

impl std::fmt::Display for MomentumRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MomentumBullish => write!(f, "bullish momentum"),
            Self::MomentumBearish => write!(f, "bearish momentum"),
            Self::MeanReversion => write!(f, "mean reversion"),
            Self::Mixed => write!(f, "mixed momentum"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmaAlignment {
    Bullish,
    Bearish,
    Mixed,
}

#[derive(Debug, Clone, Serialize)]
pub struct MomentumResult {
    pub regime: MomentumRegime,
    pub rsi: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub ema_alignment: EmaAlignment,
    /// Regression slope of the trailing window, percent of mean per bar.
    pub slope_pct: f64,
    pub last_close: f64,
    pub bullish_votes: u8,
    pub bearish_votes: u8,
    pub confidence: f64,
}

pub fn ema_alignment(close: f64, fast: f64, slow: f64) -> EmaAlignment {
    if fast > slow && close > fast {
        EmaAlignment::Bullish
    } else if fast < slow && close < fast {
        EmaAlignment::Bearish
    } else {
        EmaAlignment::Mixed
    }
}

/// `closes` oldest first; the last value is the live price.
pub fn compute_momentum(
    closes: &[f64],
    t: &MomentumThresholds,
) -> Result<MomentumResult, EngineError> {
    let closes: Vec<f64> = closes.iter().copied().filter(|c| c.is_finite()).collect();
    let needed = t.ema_slow.max(t.rsi_period + 1).max(t.slope_window).max(2);
    if closes.len() < needed {
        return Err(EngineError::unavailable(format!(
            "momentum needs {needed} closes, have {}",
            closes.len()
        )));
    }

    let insufficient = || EngineError::degraded("momentum indicators not computable");
    let rsi = wilder_rsi(&closes, t.rsi_period).ok_or_else(insufficient)?;
    let ema_fast = last_ema(&closes, t.ema_fast).ok_or_else(insufficient)?;
    let ema_slow = last_ema(&closes, t.ema_slow).ok_or_else(insufficient)?;

    let window = &closes[closes.len() - t.slope_window..];
    let mean = window.iter().sum::<f64>() / window.len() as f64;
    let slope = regression_slope(window).ok_or_else(insufficient)?;
    let slope_pct = if mean != 0.0 { slope / mean * 100.0 } else { 0.0 };

    let last_close = closes[closes.len() - 1];
    let alignment = ema_alignment(last_close, ema_fast, ema_slow);

    let votes = [
        vote(rsi > t.rsi_bull_vote, rsi < t.rsi_bear_vote),
        vote(
            alignment == EmaAlignment::Bullish,
            alignment == EmaAlignment::Bearish,
        ),
        vote(slope_pct > t.slope_vote_pct, slope_pct < -t.slope_vote_pct),
    ];
    let bullish_votes = votes.iter().filter(|v| **v > 0).count() as u8;
    let bearish_votes = votes.iter().filter(|v| **v < 0).count() as u8;

    let (regime, confidence) = if rsi >= t.rsi_overbought || rsi <= t.rsi_oversold {
        let (excess, room) = if rsi >= t.rsi_overbought {
            (rsi - t.rsi_overbought, 100.0 - t.rsi_overbought)
        } else {
            (t.rsi_oversold - rsi, t.rsi_oversold)
        };
        let stretch = if room > 0.0 { excess / room } else { 1.0 };
        (MomentumRegime::MeanReversion, (0.5 + 0.5 * stretch).clamp(0.0, 1.0))
    } else if bullish_votes >= 2 && bearish_votes == 0 {
        (MomentumRegime::MomentumBullish, bullish_votes as f64 / 3.0)
    } else if bearish_votes >= 2 && bullish_votes == 0 {
        (MomentumRegime::MomentumBearish, bearish_votes as f64 / 3.0)
    } else {
        (
            MomentumRegime::Mixed,
            bullish_votes.max(bearish_votes) as f64 / 3.0,
        )
    };

    Ok(MomentumResult {
        regime,
        rsi,
        ema_fast,
        ema_slow,
        ema_alignment: alignment,
        slope_pct,
        last_close,
        bullish_votes,
        bearish_votes,
        confidence,
    })
}

/// Daily closes with `spot` as the live bar.  A close already dated `today`
/// is provisional and gets replaced rather than followed.
pub fn live_series(closes: &[DailyClose], today: NaiveDate, spot: f64) -> Vec<f64> {
    let completed = match closes.last() {
        Some(last) if last.date >= today => &closes[..closes.len() - 1],
        _ => closes,
    };
    let mut series = Vec::with_capacity(completed.len() + 1);
    series.extend(completed.iter().map(|d| d.close));
    series.push(spot);
    series
}

fn vote(bull: bool, bear: bool) -> i8 {
    match (bull, bear) {
        (true, false) => 1,
        (false, true) => -1,
        _ => 0,
    }
}

// =============================================================================
// Computer
// =============================================================================

pub struct MomentumComputer {
    thresholds: MomentumThresholds,
}

impl MomentumComputer {
    pub fn new(thresholds: MomentumThresholds) -> Self {
        Self { thresholds }
    }
}

impl SignalComputer for MomentumComputer {
    fn kind(&self) -> SignalKind {
        SignalKind::Momentum
    }

    fn compute(&self, inputs: &MarketInputs) -> SignalOutcome<SignalPayload> {
        let today = session_date(inputs.as_of);
        let result = inputs.closes().and_then(|closes| {
            let series = live_series(closes, today, inputs.spot);
            compute_momentum(&series, &self.thresholds)
        });
        if let Ok(r) = &result {
            debug!(
                symbol = %inputs.symbol,
                regime = %r.regime,
                rsi = format!("{:.1}", r.rsi),
                slope_pct = format!("{:.3}", r.slope_pct),
                "momentum computed"
            );
        }
        SignalOutcome::from(result).map(SignalPayload::Momentum)
    }
}
