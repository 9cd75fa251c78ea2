// =============================================================================
// Thesis — templated rationale for the unified score
// =============================================================================

use super::gex::GammaRegime;
use super::volume_delta::FlowDirection;
use super::SignalKind;
use crate::snapshot::SignalSet;
use crate::types::Bias;

/// Short phrase describing one signal's current reading.
pub fn describe(kind: SignalKind, signals: &SignalSet) -> Option<String> {
    let phrase = match kind {
        SignalKind::Pcr => {
            let r = signals.pcr.available()?;
            match r.headline_ratio() {
                Some(pcr) => format!("a {} put/call ratio of {:.2}", r.interpretation, pcr),
                None => "an undefined put/call ratio".to_string(),
            }
        }
        SignalKind::Gex => {
            let r = signals.gex.available()?;
            let regime = match r.gamma_regime {
                GammaRegime::Positive => "positive",
                GammaRegime::Negative => "negative",
            };
            match r.flip_point {
                Some(flip) if r.spot >= flip => {
                    format!("{regime} dealer gamma with spot above the {flip:.0} flip")
                }
                Some(flip) => format!("{regime} dealer gamma with spot below the {flip:.0} flip"),
                None => format!("{regime} dealer gamma"),
            }
        }
        SignalKind::IvSkew => {
            let r = signals.iv_skew.available()?;
            format!("{} ({:+.1} vol pts put over call)", r.interpretation, r.skew)
        }
        SignalKind::VixRegime => {
            let r = signals.vix_regime.available()?;
            format!("a {} VIX at {:.1}", r.regime, r.level)
        }
        SignalKind::MacroRegime => {
            let r = signals.macro_regime.available()?;
            format!("a {} macro backdrop", r.regime)
        }
        SignalKind::VwapBands => {
            let r = signals.vwap_bands.available()?;
            format!("price {}", r.position)
        }
        SignalKind::VolumeDelta => {
            let r = signals.volume_delta.available()?;
            let flow = match r.direction {
                FlowDirection::Buying => "net buying flow",
                FlowDirection::Selling => "net selling flow",
                FlowDirection::Balanced => "balanced flow",
            };
            if r.divergence {
                format!("{flow} diverging from price")
            } else {
                flow.to_string()
            }
        }
        SignalKind::ExpectedMove => {
            let r = signals.expected_move.available()?;
            format!("a ±{:.1} expected daily move", r.daily_move)
        }
        SignalKind::Momentum => {
            let r = signals.momentum.available()?;
            format!("{} (RSI {:.0})", r.regime, r.rsi)
        }
    };
    Some(phrase)
}

fn join_phrases(parts: &[String]) -> String {
    match parts {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn compose_thesis(
    symbol: &str,
    score: f64,
    direction: Bias,
    confidence: f64,
    top: &[SignalKind],
    signals: &SignalSet,
) -> String {
    if top.is_empty() && signals.available_count() == 0 {
        return format!("Insufficient data for {symbol}: no signals were available this cycle.");
    }

    let lean = match direction {
        Bias::Bullish => "leans bullish",
        Bias::Bearish => "leans bearish",
        Bias::Neutral => "is balanced",
    };
    let mut thesis = format!(
        "{symbol} {lean} (score {score:+.0}, confidence {:.0}%).",
        confidence * 100.0
    );

    let drivers: Vec<String> = top.iter().filter_map(|k| describe(*k, signals)).collect();
    if !drivers.is_empty() {
        let verb = if drivers.len() == 1 { "drives" } else { "drive" };
        thesis.push_str(&format!(
            " {} {verb} the read.",
            capitalise(&join_phrases(&drivers))
        ));
    }

    if let Some(move_phrase) = describe(SignalKind::ExpectedMove, signals) {
        thesis.push_str(&format!(" Options price {move_phrase}."));
    }

    let missing = SignalKind::ALL.len() - signals.available_count();
    if missing > 0 {
        thesis.push_str(&format!(
            " {missing} of {} signals unavailable.",
            SignalKind::ALL.len()
        ));
    }
    thesis
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn joins_phrases_naturally() {
        let p = |s: &[&str]| join_phrases(&s.iter().map(|x| x.to_string()).collect::<Vec<_>>());
        assert_eq!(p(&[]), "");
        assert_eq!(p(&["a"]), "a");
        assert_eq!(p(&["a", "b"]), "a and b");
        assert_eq!(p(&["a", "b", "c"]), "a, b and c");
    }

    #[test]
    fn empty_set_reports_insufficient_data() {
        let set = SignalSet::unavailable(EngineError::unavailable("down"));
        let t = compose_thesis("SPX", 0.0, Bias::Neutral, 0.0, &[], &set);
        assert!(t.starts_with("Insufficient data for SPX"));
    }

    #[test]
    fn describe_skips_unavailable_signals() {
        let set = SignalSet::unavailable(EngineError::unavailable("down"));
        for kind in SignalKind::ALL {
            assert!(describe(kind, &set).is_none());
        }
    }

    #[test]
    fn capitalises_first_letter() {
        assert_eq!(capitalise("a bullish read"), "A bullish read");
        assert_eq!(capitalise(""), "");
    }
}
