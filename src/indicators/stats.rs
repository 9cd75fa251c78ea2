// =============================================================================
// Descriptive statistics
// =============================================================================

/// Ordinary-least-squares slope of `values` against their index (0, 1, 2, ...).
///
/// `None` with fewer than two points or a non-finite result.
pub fn regression_slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let nf = n as f64;
    let mean_x = (nf - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / nf;

    let (mut cov, mut var) = (0.0, 0.0);
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        cov += dx * (y - mean_y);
        var += dx * dx;
    }

    let slope = cov / var;
    slope.is_finite().then_some(slope)
}

/// Percent of `window` values that are `<= value`, in [0, 100].
pub fn percentile_rank(window: &[f64], value: f64) -> Option<f64> {
    let finite: Vec<f64> = window.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || !value.is_finite() {
        return None;
    }
    let at_or_below = finite.iter().filter(|v| **v <= value).count();
    Some(at_or_below as f64 / finite.len() as f64 * 100.0)
}

/// Weighted mean and population standard deviation.
///
/// `None` when lengths differ, the slices are empty, or total weight is not
/// positive.
pub fn weighted_mean_and_std(values: &[f64], weights: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() || values.len() != weights.len() {
        return None;
    }

    let total: f64 = weights.iter().sum();
    if !(total > 0.0) {
        return None;
    }

    let mean = values.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / total;
    let var = values
        .iter()
        .zip(weights)
        .map(|(v, w)| w * (v - mean).powi(2))
        .sum::<f64>()
        / total;

    let std = var.max(0.0).sqrt();
    (mean.is_finite() && std.is_finite()).then_some((mean, std))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slope_of_a_line() {
        let slope = regression_slope(&[1.0, 3.0, 5.0, 7.0]).unwrap();
        assert!((slope - 2.0).abs() < 1e-12);
        assert!(regression_slope(&[5.0]).is_none());
        assert!(regression_slope(&[4.0, 4.0, 4.0]).unwrap().abs() < 1e-12);
    }

    #[test]
    fn percentile_counts_ties_as_below() {
        let window = [10.0, 20.0, 30.0, 40.0];
        assert!((percentile_rank(&window, 30.0).unwrap() - 75.0).abs() < 1e-12);
        assert!((percentile_rank(&window, 5.0).unwrap()).abs() < 1e-12);
        assert!((percentile_rank(&window, 99.0).unwrap() - 100.0).abs() < 1e-12);
        assert!(percentile_rank(&[], 1.0).is_none());
    }

    #[test]
    fn weighted_stats_known_values() {
        // values 1 and 3 with equal weight: mean 2, population std 1
        let (mean, std) = weighted_mean_and_std(&[1.0, 3.0], &[5.0, 5.0]).unwrap();
        assert!((mean - 2.0).abs() < 1e-12);
        assert!((std - 1.0).abs() < 1e-12);

        // weight pulls the mean toward the heavier value
        let (mean, _) = weighted_mean_and_std(&[1.0, 3.0], &[1.0, 3.0]).unwrap();
        assert!((mean - 2.5).abs() < 1e-12);
    }

    #[test]
    fn weighted_stats_rejects_bad_input() {
        assert!(weighted_mean_and_std(&[], &[]).is_none());
        assert!(weighted_mean_and_std(&[1.0], &[0.0]).is_none());
        assert!(weighted_mean_and_std(&[1.0, 2.0], &[1.0]).is_none());
    }
}
