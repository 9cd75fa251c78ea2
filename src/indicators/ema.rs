// =============================================================================
// Exponential Moving Average
// =============================================================================
//
//   k     = 2 / (period + 1)
//   EMA_t = x_t * k + EMA_{t-1} * (1 - k)
//
// Seeded with the simple average of the first `period` values.

/// EMA series of `values`; element `i` corresponds to `values[period - 1 + i]`.
///
/// Empty when `period == 0` or there are fewer than `period` values.  The
/// series is truncated at the first non-finite value.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);

    let mut prev = seed;
    for &x in &values[period..] {
        let next = x * k + prev * (1.0 - k);
        if !next.is_finite() {
            break;
        }
        out.push(next);
        prev = next;
    }
    out
}

/// Most recent EMA value, if the series could be seeded.
pub fn last_ema(values: &[f64], period: usize) -> Option<f64> {
    ema_series(values, period).last().copied()
}
