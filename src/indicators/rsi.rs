// =============================================================================
// Relative Strength Index — Wilder's smoothing
// =============================================================================
//
// avg_gain / avg_loss are seeded with the plain mean of the first `period`
// deltas, then smoothed:  avg = (avg * (period - 1) + x) / period.
// RSI = 100 - 100 / (1 + avg_gain / avg_loss).

/// Final RSI value of `closes`, or `None` with fewer than `period + 1` closes.
///
/// A flat series yields 50, pure gains 100, pure losses 0.
pub fn wilder_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let n = period as f64;
    let mut deltas = closes.windows(2).map(|w| w[1] - w[0]);

    let (mut gain, mut loss) = (0.0_f64, 0.0_f64);
    for d in deltas.by_ref().take(period) {
        if d > 0.0 {
            gain += d;
        } else {
            loss -= d;
        }
    }
    gain /= n;
    loss /= n;

    for d in deltas {
        gain = (gain * (n - 1.0) + d.max(0.0)) / n;
        loss = (loss * (n - 1.0) + (-d).max(0.0)) / n;
    }

    let rsi = match (gain == 0.0, loss == 0.0) {
        (true, true) => 50.0,
        (_, true) => 100.0,
        _ => 100.0 - 100.0 / (1.0 + gain / loss),
    };
    rsi.is_finite().then_some(rsi)
}
