// =============================================================================
// VIX Regime — level bands, trailing percentile and term structure
// =============================================================================

use serde::Serialize;
use tracing::debug;

use super::{MarketInputs, SignalComputer, SignalKind, SignalOutcome, SignalPayload};
use crate::error::EngineError;
use crate::indicators::percentile_rank;
use crate::runtime_config::{VixThresholds, VolatilitySymbols};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VolRegime {
    Complacent,
    Normal,
    Elevated,
    Panic,
}

impl std::fmt::Display for VolRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complacent => write!(f, "complacent"),
            Self::Normal => write!(f, "normal"),
            Self::Elevated => write!(f, "elevated"),
            Self::Panic => write!(f, "panic"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TermStructure {
    Contango,
    Flat,
    Backwardation,
}

#[derive(Debug, Clone, Serialize)]
pub struct VixRegimeResult {
    pub level: f64,
    pub average_20d: Option<f64>,
    pub regime: VolRegime,
    /// Percent of the trailing window at or below the current level.
    pub percentile: Option<f64>,
    pub term_level: Option<f64>,
    /// term − front.
    pub term_spread: Option<f64>,
    pub term_structure: Option<TermStructure>,
}

pub fn classify_level(level: f64, t: &VixThresholds) -> VolRegime {
    if level < t.complacent_below {
        VolRegime::Complacent
    } else if level < t.normal_below {
        VolRegime::Normal
    } else if level < t.elevated_below {
        VolRegime::Elevated
    } else {
        VolRegime::Panic
    }
}

pub fn classify_term(spread: f64, t: &VixThresholds) -> TermStructure {
    if spread > t.term_flat_band {
        TermStructure::Contango
    } else if spread < -t.term_flat_band {
        TermStructure::Backwardation
    } else {
        TermStructure::Flat
    }
}

/// `history` holds completed daily closes, oldest first.
pub fn compute_vix_regime(
    front: Option<f64>,
    term: Option<f64>,
    history: &[f64],
    t: &VixThresholds,
) -> Result<VixRegimeResult, EngineError> {
    let history: Vec<f64> = history.iter().copied().filter(|v| v.is_finite()).collect();
    let level = front
        .filter(|v| v.is_finite() && *v > 0.0)
        .or_else(|| history.last().copied())
        .ok_or_else(|| EngineError::unavailable("no volatility index level"))?;

    let tail = |n: usize| &history[history.len().saturating_sub(n)..];

    let avg_window = tail(t.average_window);
    let average_20d =
        (!avg_window.is_empty()).then(|| avg_window.iter().sum::<f64>() / avg_window.len() as f64);

    let percentile = percentile_rank(tail(t.percentile_window), level);

    let term_level = term.filter(|v| v.is_finite() && *v > 0.0);
    let term_spread = term_level.map(|tl| tl - level);

    Ok(VixRegimeResult {
        level,
        average_20d,
        regime: classify_level(level, t),
        percentile,
        term_level,
        term_spread,
        term_structure: term_spread.map(|s| classify_term(s, t)),
    })
}

// =============================================================================
// Computer
// =============================================================================

pub struct VixRegimeComputer {
    symbols: VolatilitySymbols,
    thresholds: VixThresholds,
}

impl VixRegimeComputer {
    pub fn new(symbols: VolatilitySymbols, thresholds: VixThresholds) -> Self {
        Self {
            symbols,
            thresholds,
        }
    }
}

impl SignalComputer for VixRegimeComputer {
    fn kind(&self) -> SignalKind {
        SignalKind::VixRegime
    }

    fn compute(&self, inputs: &MarketInputs) -> SignalOutcome<SignalPayload> {
        let front = inputs.quote(&self.symbols.front).map(|q| q.price);
        let term = inputs.quote(&self.symbols.term).map(|q| q.price);
        let history: Vec<f64> = inputs
            .vol_index_history
            .as_deref()
            .map(|h| h.iter().map(|d| d.close).collect())
            .unwrap_or_default();

        let result = compute_vix_regime(front, term, &history, &self.thresholds).map_err(|e| {
            match (&inputs.quotes, &inputs.vol_index_history) {
                (Err(q), Err(h)) => EngineError::unavailable(format!("quotes: {q}; history: {h}")),
                _ => e,
            }
        });
        if let Ok(r) = &result {
            debug!(
                level = format!("{:.2}", r.level),
                regime = %r.regime,
                percentile = ?r.percentile,
                term = ?r.term_structure,
                "vix regime computed"
            );
        }
        SignalOutcome::from(result).map(SignalPayload::VixRegime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_bands() {
        let t = VixThresholds::default();
        assert_eq!(classify_level(12.0, &t), VolRegime::Complacent);
        assert_eq!(classify_level(15.0, &t), VolRegime::Normal);
        assert_eq!(classify_level(19.99, &t), VolRegime::Normal);
        assert_eq!(classify_level(20.0, &t), VolRegime::Elevated);
        assert_eq!(classify_level(30.0, &t), VolRegime::Panic);
    }

    #[test]
    fn term_structure_tags() {
        let t = VixThresholds::default();
        assert_eq!(classify_term(1.2, &t), TermStructure::Contango);
        assert_eq!(classify_term(0.5, &t), TermStructure::Flat);
        assert_eq!(classify_term(-0.3, &t), TermStructure::Flat);
        assert_eq!(classify_term(-2.0, &t), TermStructure::Backwardation);
    }

    #[test]
    fn full_read_with_history() {
        let history: Vec<f64> = (1..=30).map(|i| 10.0 + i as f64 * 0.5).collect();
        // Last 20 closes: 15.5 ..= 25.0 → mean 20.25.
        let r = compute_vix_regime(Some(22.0), Some(23.5), &history, &VixThresholds::default())
            .unwrap();
        assert_eq!(r.regime, VolRegime::Elevated);
        assert!((r.average_20d.unwrap() - 20.25).abs() < 1e-9);
        // 10.5 ..= 22.0 → 24 of 30 at or below.
        assert!((r.percentile.unwrap() - 80.0).abs() < 1e-9);
        assert!((r.term_spread.unwrap() - 1.5).abs() < 1e-9);
        assert_eq!(r.term_structure, Some(TermStructure::Contango));
    }

    #[test]
    fn falls_back_to_last_close_without_quote() {
        let r = compute_vix_regime(None, None, &[14.0, 16.0], &VixThresholds::default()).unwrap();
        assert_eq!(r.level, 16.0);
        assert!(r.term_structure.is_none());
        assert!(r.term_spread.is_none());
    }

    #[test]
    fn nothing_to_read_is_unavailable() {
        let err = compute_vix_regime(None, None, &[], &VixThresholds::default()).unwrap_err();
        assert!(matches!(err, EngineError::DataUnavailable(_)));
    }
}
