// =============================================================================
// Options chain helpers shared by the chain-driven signals
// =============================================================================

use std::collections::BTreeMap;

use crate::types::{OptionKind, OptionsChainEntry};

/// Integer key for a strike so that floats can be grouped and ordered.
/// Four decimal places covers every listed increment.
pub fn strike_key(strike: f64) -> i64 {
    (strike * 10_000.0).round() as i64
}

/// Call and put rows at one strike.
#[derive(Debug, Default)]
pub struct StrikeRow<'a> {
    pub strike: f64,
    pub calls: Vec<&'a OptionsChainEntry>,
    pub puts: Vec<&'a OptionsChainEntry>,
}

/// Group a chain by strike, ascending.  Rows with a non-finite or
/// non-positive strike are dropped.
pub fn group_by_strike(chain: &[OptionsChainEntry]) -> Vec<StrikeRow<'_>> {
    let mut rows: BTreeMap<i64, StrikeRow<'_>> = BTreeMap::new();
    for entry in chain {
        if !entry.strike.is_finite() || entry.strike <= 0.0 {
            continue;
        }
        let row = rows.entry(strike_key(entry.strike)).or_default();
        row.strike = entry.strike;
        match entry.kind {
            OptionKind::Call => row.calls.push(entry),
            OptionKind::Put => row.puts.push(entry),
        }
    }
    rows.into_values().collect()
}

/// Listed strike closest to `spot`.  Ties go to the lower strike.
pub fn nearest_strike(chain: &[OptionsChainEntry], spot: f64) -> Option<f64> {
    let mut best: Option<f64> = None;
    for entry in chain {
        if !entry.strike.is_finite() || entry.strike <= 0.0 {
            continue;
        }
        best = match best {
            None => Some(entry.strike),
            Some(b) => {
                let (d_new, d_best) = ((entry.strike - spot).abs(), (b - spot).abs());
                if d_new < d_best || (d_new == d_best && entry.strike < b) {
                    Some(entry.strike)
                } else {
                    Some(b)
                }
            }
        };
    }
    best
}

/// At-the-money implied volatility: mean IV of the usable contracts at the
/// strike nearest spot.  Returns `(strike, iv_percent)`.
pub fn atm_iv(chain: &[OptionsChainEntry], spot: f64) -> Option<(f64, f64)> {
    let strike = nearest_strike(chain, spot)?;
    let key = strike_key(strike);
    let ivs: Vec<f64> = chain
        .iter()
        .filter(|e| strike_key(e.strike) == key)
        .map(|e| e.implied_volatility)
        .filter(|iv| iv.is_finite() && *iv > 0.0)
        .collect();
    if ivs.is_empty() {
        return None;
    }
    Some((strike, ivs.iter().sum::<f64>() / ivs.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(strike: f64, kind: OptionKind, iv: f64) -> OptionsChainEntry {
        OptionsChainEntry {
            strike,
            kind,
            volume: 0,
            open_interest: 0,
            delta: 0.0,
            gamma: 0.0,
            theta: 0.0,
            vega: 0.0,
            implied_volatility: iv,
        }
    }

    #[test]
    fn groups_calls_and_puts_by_strike_ascending() {
        let chain = vec![
            entry(105.0, OptionKind::Call, 20.0),
            entry(100.0, OptionKind::Put, 22.0),
            entry(100.0, OptionKind::Call, 18.0),
            entry(f64::NAN, OptionKind::Call, 18.0),
        ];
        let rows = group_by_strike(&chain);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].strike, 100.0);
        assert_eq!(rows[0].calls.len(), 1);
        assert_eq!(rows[0].puts.len(), 1);
        assert_eq!(rows[1].strike, 105.0);
    }

    #[test]
    fn nearest_strike_breaks_ties_low() {
        let chain = vec![
            entry(95.0, OptionKind::Call, 20.0),
            entry(105.0, OptionKind::Call, 20.0),
        ];
        assert_eq!(nearest_strike(&chain, 100.0), Some(95.0));
        assert_eq!(nearest_strike(&[], 100.0), None);
    }

    #[test]
    fn atm_iv_averages_call_and_put() {
        let chain = vec![
            entry(100.0, OptionKind::Call, 18.0),
            entry(100.0, OptionKind::Put, 22.0),
            entry(110.0, OptionKind::Call, 30.0),
        ];
        let (strike, iv) = atm_iv(&chain, 101.0).unwrap();
        assert_eq!(strike, 100.0);
        assert!((iv - 20.0).abs() < 1e-12);
    }

    #[test]
    fn atm_iv_ignores_zero_iv() {
        let chain = vec![
            entry(100.0, OptionKind::Call, 0.0),
            entry(100.0, OptionKind::Put, 24.0),
        ];
        let (_, iv) = atm_iv(&chain, 100.0).unwrap();
        assert!((iv - 24.0).abs() < 1e-12);

        let dead = vec![entry(100.0, OptionKind::Call, 0.0)];
        assert!(atm_iv(&dead, 100.0).is_none());
    }
}
