/// Median of `values`, averaging the two middle elements for even lengths.
/// Returns 0.0 for empty input.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// `numerator / denominator`, or 0.0 when the denominator is zero.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Replaces NaN and infinities with 0.0.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Rounds to `places` decimals for presentation. Non-finite input becomes 0.0.
pub fn presentable(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    finite_or_zero((finite_or_zero(value) * factor).round() / factor)
}
