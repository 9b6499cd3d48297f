//! Rounding and clamping for persisted percentages.

/// Round `value` to `decimals` places, half away from zero.
///
/// Non-finite inputs are returned unchanged.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = 10f64.powi(decimals as i32);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / scale
}

/// Clamp `value` into `[lo, hi]`, mapping NaN to `lo`.
pub fn clamp_or(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        return lo;
    }
    value.clamp(lo, hi)
}

/// Clamp a percentage into `[0, 100]`, mapping NaN to 0.
pub fn clamp_percent(value: f64) -> f64 {
    clamp_or(value, 0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_places() {
        assert_eq!(round_to(12.345_67, 2), 12.35);
        assert_eq!(round_to(12.344_9, 2), 12.34);
        assert_eq!(round_to(33.333_333_3, 4), 33.3333);
        assert_eq!(round_to(-1.005_01, 2), -1.01);
        assert_eq!(round_to(7.0, 0), 7.0);
    }

    #[test]
    fn round_to_passes_non_finite_through() {
        assert!(round_to(f64::NAN, 2).is_nan());
        assert_eq!(round_to(f64::INFINITY, 2), f64::INFINITY);
        assert_eq!(round_to(f64::MAX, 4), f64::MAX);
    }

    #[test]
    fn clamp_percent_bounds() {
        assert_eq!(clamp_percent(-3.0), 0.0);
        assert_eq!(clamp_percent(150.0), 100.0);
        assert_eq!(clamp_percent(f64::NAN), 0.0);
        assert_eq!(clamp_percent(f64::INFINITY), 100.0);
        assert_eq!(clamp_percent(42.5), 42.5);
    }

    #[test]
    fn clamp_or_custom_range() {
        assert_eq!(clamp_or(10.0, 20.0, 95.0), 20.0);
        assert_eq!(clamp_or(99.0, 20.0, 95.0), 95.0);
        assert_eq!(clamp_or(f64::NAN, 20.0, 95.0), 20.0);
    }
}
