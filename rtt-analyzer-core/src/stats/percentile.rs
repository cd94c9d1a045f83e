/// Percentile ranks reported for every sample: P50, P90, P99, P99.9, P99.99.
pub const PERCENTILES: [f64; 5] = [0.50, 0.90, 0.99, 0.999, 0.9999];

/// Percentile of an ascending-sorted slice.
///
/// Uses linear interpolation between the order statistics surrounding rank
/// `q * (n - 1)`. `q` is a fraction (0.99 for P99) and is clamped into
/// `[0, 1]`. A single-element slice yields that element for every `q`.
///
/// Returns `None` if `sorted` is empty.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    let (&first, &last) = (sorted.first()?, sorted.last()?);

    if q <= 0.0 {
        return Some(first);
    }
    if q >= 1.0 {
        return Some(last);
    }

    let rank = q * (sorted.len() - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = rank.ceil() as usize;

    let lower = sorted[lower_idx];
    let upper = sorted[upper_idx];
    if lower_idx == upper_idx {
        return Some(lower);
    }

    let fraction = rank - lower_idx as f64;
    let interpolated = lower + (upper - lower) * fraction;

    // Rounding must never carry the result past the next order statistic.
    Some(interpolated.min(upper))
}
