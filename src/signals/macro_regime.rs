// =============================================================================
// Macro Regime — cross-asset rule table
// =============================================================================
//
// Each proxy's day change is bucketed up / down / flat, then a declarative
// rule table is evaluated top to bottom; the first matching rule sets the
// overall regime.  No fitted parameters.

use serde::Serialize;
use tracing::debug;

use super::{MarketInputs, SignalComputer, SignalKind, SignalOutcome, SignalPayload};
use crate::error::EngineError;
use crate::runtime_config::{MacroSymbols, MacroThresholds};
use crate::types::Quote;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BondEquityRelation {
    FlightToSafety,
    RiskOn,
    Mixed,
    CorrelatedSelloff,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DollarPressure {
    Headwind,
    Tailwind,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroRegime {
    RiskOn,
    RiskOff,
    Mixed,
    Neutral,
}

impl std::fmt::Display for MacroRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RiskOn => write!(f, "risk-on"),
            Self::RiskOff => write!(f, "risk-off"),
            Self::Mixed => write!(f, "mixed"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyReading {
    pub symbol: String,
    pub price: f64,
    pub change_pct: f64,
    pub direction: Move,
}

#[derive(Debug, Clone, Serialize)]
pub struct MacroResult {
    pub equity: ProxyReading,
    pub long_bond: Option<ProxyReading>,
    pub dollar: Option<ProxyReading>,
    pub gold: Option<ProxyReading>,
    pub bond_equity: BondEquityRelation,
    pub dollar_pressure: DollarPressure,
    /// Gold bid while equities sell off.
    pub defensive_bid: bool,
    pub regime: MacroRegime,
    /// Name of the rule that set `regime`.
    pub matched_rule: &'static str,
    /// Configured proxies absent from the quote set, treated as flat.
    pub missing: Vec<String>,
}

/// Directions the rule table is evaluated over.
#[derive(Debug, Clone, Copy)]
pub struct MacroReading {
    pub equity: Move,
    pub bond: Move,
    pub dollar: Move,
    pub gold: Move,
}

impl MacroReading {
    pub fn bond_equity(&self) -> BondEquityRelation {
        match (self.equity, self.bond) {
            (Move::Down, Move::Up) => BondEquityRelation::FlightToSafety,
            (Move::Up, Move::Down) => BondEquityRelation::RiskOn,
            (Move::Up, Move::Up) => BondEquityRelation::Mixed,
            (Move::Down, Move::Down) => BondEquityRelation::CorrelatedSelloff,
            _ => BondEquityRelation::Neutral,
        }
    }

    pub fn dollar_pressure(&self) -> DollarPressure {
        match self.dollar {
            Move::Up => DollarPressure::Headwind,
            Move::Down => DollarPressure::Tailwind,
            Move::Flat => DollarPressure::Neutral,
        }
    }

    pub fn defensive_bid(&self) -> bool {
        self.gold == Move::Up && self.equity == Move::Down
    }
}

struct MacroRule {
    name: &'static str,
    when: fn(&MacroReading) -> bool,
    regime: MacroRegime,
}

const RULES: &[MacroRule] = &[
    MacroRule {
        name: "flight_to_safety",
        when: |r| r.bond_equity() == BondEquityRelation::FlightToSafety,
        regime: MacroRegime::RiskOff,
    },
    MacroRule {
        name: "correlated_selloff",
        when: |r| r.bond_equity() == BondEquityRelation::CorrelatedSelloff,
        regime: MacroRegime::RiskOff,
    },
    MacroRule {
        name: "dollar_headwind",
        when: |r| r.dollar == Move::Up && r.equity == Move::Down,
        regime: MacroRegime::RiskOff,
    },
    MacroRule {
        name: "defensive_bid",
        when: |r| r.defensive_bid(),
        regime: MacroRegime::RiskOff,
    },
    MacroRule {
        name: "risk_on_rotation",
        when: |r| r.bond_equity() == BondEquityRelation::RiskOn && r.dollar != Move::Up,
        regime: MacroRegime::RiskOn,
    },
    MacroRule {
        name: "everything_bid",
        when: |r| r.bond_equity() == BondEquityRelation::Mixed,
        regime: MacroRegime::Mixed,
    },
    MacroRule {
        name: "strong_dollar_rally",
        when: |r| r.equity == Move::Up && r.dollar == Move::Up,
        regime: MacroRegime::Mixed,
    },
    MacroRule {
        name: "equity_led_rally",
        when: |r| r.equity == Move::Up,
        regime: MacroRegime::RiskOn,
    },
    MacroRule {
        name: "equity_led_decline",
        when: |r| r.equity == Move::Down,
        regime: MacroRegime::RiskOff,
    },
];

/// First matching rule, or `("quiet_tape", Neutral)`.
pub fn classify_regime(reading: &MacroReading) -> (&'static str, MacroRegime) {
    RULES
        .iter()
        .find(|rule| (rule.when)(reading))
        .map(|rule| (rule.name, rule.regime))
        .unwrap_or(("quiet_tape", MacroRegime::Neutral))
}

pub fn classify_move(change_pct: f64, t: &MacroThresholds) -> Move {
    if change_pct > t.move_pct {
        Move::Up
    } else if change_pct < -t.move_pct {
        Move::Down
    } else {
        Move::Flat
    }
}

pub fn compute_macro(
    symbols: &MacroSymbols,
    quotes: &[Quote],
    t: &MacroThresholds,
) -> Result<MacroResult, EngineError> {
    let find = |sym: &str| -> Option<ProxyReading> {
        quotes
            .iter()
            .find(|q| q.symbol.eq_ignore_ascii_case(sym))
            .filter(|q| q.price.is_finite() && q.change_pct.is_finite())
            .map(|q| ProxyReading {
                symbol: q.symbol.clone(),
                price: q.price,
                change_pct: q.change_pct,
                direction: classify_move(q.change_pct, t),
            })
    };

    let equity = find(&symbols.equity).ok_or_else(|| {
        EngineError::unavailable(format!("no quote for equity proxy {}", symbols.equity))
    })?;
    let long_bond = find(&symbols.long_bond);
    let dollar = find(&symbols.dollar);
    let gold = find(&symbols.gold);

    let missing: Vec<String> = [
        (&symbols.long_bond, long_bond.is_none()),
        (&symbols.dollar, dollar.is_none()),
        (&symbols.gold, gold.is_none()),
    ]
    .into_iter()
    .filter(|(_, absent)| *absent)
    .map(|(sym, _)| sym.clone())
    .collect();

    let dir = |p: &Option<ProxyReading>| p.as_ref().map_or(Move::Flat, |r| r.direction);
    let reading = MacroReading {
        equity: equity.direction,
        bond: dir(&long_bond),
        dollar: dir(&dollar),
        gold: dir(&gold),
    };
    let (matched_rule, regime) = classify_regime(&reading);

    Ok(MacroResult {
        bond_equity: reading.bond_equity(),
        dollar_pressure: reading.dollar_pressure(),
        defensive_bid: reading.defensive_bid(),
        regime,
        matched_rule,
        equity,
        long_bond,
        dollar,
        gold,
        missing,
    })
}

// =============================================================================
// Computer
// =============================================================================

pub struct MacroComputer {
    symbols: MacroSymbols,
    thresholds: MacroThresholds,
}

impl MacroComputer {
    pub fn new(symbols: MacroSymbols, thresholds: MacroThresholds) -> Self {
        Self {
            symbols,
            thresholds,
        }
    }
}

impl SignalComputer for MacroComputer {
    fn kind(&self) -> SignalKind {
        SignalKind::MacroRegime
    }

    fn compute(&self, inputs: &MarketInputs) -> SignalOutcome<SignalPayload> {
        let result = match &inputs.quotes {
            Ok(quotes) => compute_macro(&self.symbols, quotes, &self.thresholds),
            Err(e) => Err(e.clone()),
        };
        if let Ok(r) = &result {
            debug!(
                regime = %r.regime,
                rule = r.matched_rule,
                missing = r.missing.len(),
                "macro regime computed"
            );
        }
        SignalOutcome::from(result).map(SignalPayload::MacroRegime)
    }
}
