//! Small numerically careful helpers shared by the detectors.

/// Absolute standardized distance `|x - mean| / std_dev`.
///
/// Returns NaN when `std_dev` is not strictly positive or any input is NaN;
/// callers are expected to pass a floored deviation.
pub fn abs_z_score(x: f64, mean: f64, std_dev: f64) -> f64 {
    if x.is_nan() || mean.is_nan() || std_dev.is_nan() || std_dev <= 0.0 {
        return f64::NAN;
    }
    (x - mean).abs() / std_dev
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// `numerator / denominator`, or `None` when the denominator is zero or the
/// result is not finite.
pub fn checked_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    let r = numerator / denominator;
    r.is_finite().then_some(r)
}
