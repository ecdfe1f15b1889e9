//! Scalar normalisation. Never fails; out-of-range input is pulled to the nearest bound.

pub const MIN_VOLUME: f64 = 0.0;
pub const MAX_VOLUME: f64 = 1.0;
pub const MIN_PAN: f64 = -1.0;
pub const MAX_PAN: f64 = 1.0;

/// Clamp to [0, 1]. NaN becomes silence.
pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        return MIN_VOLUME;
    }
    volume.clamp(MIN_VOLUME, MAX_VOLUME)
}

/// Clamp to [-1, 1]. NaN becomes centre.
pub fn clamp_pan(pan: f64) -> f64 {
    if pan.is_nan() {
        return 0.0;
    }
    pan.clamp(MIN_PAN, MAX_PAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_bounds() {
        assert_eq!(clamp_volume(-0.5), 0.0);
        assert_eq!(clamp_volume(1.5), 1.0);
        assert_eq!(clamp_volume(0.3), 0.3);
        assert_eq!(clamp_volume(f64::INFINITY), 1.0);
        assert_eq!(clamp_volume(f64::NEG_INFINITY), 0.0);
        assert_eq!(clamp_volume(f64::NAN), 0.0);
    }

    #[test]
    fn pan_bounds() {
        assert_eq!(clamp_pan(-2.0), -1.0);
        assert_eq!(clamp_pan(2.0), 1.0);
        assert_eq!(clamp_pan(-0.75), -0.75);
        assert_eq!(clamp_pan(f64::NAN), 0.0);
    }

    #[test]
    fn in_range_values_are_untouched() {
        for i in 0..=100 {
            let v = i as f64 / 100.0;
            assert_eq!(clamp_volume(v), v);
            let p = v * 2.0 - 1.0;
            assert_eq!(clamp_pan(p), p);
        }
    }
}
