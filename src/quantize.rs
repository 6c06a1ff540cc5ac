//! Mapping between continuous intensities in `[0, 1]` and `Q` discrete levels.

use crate::model::ModelError;

pub(crate) fn validate_levels(levels: usize) -> Result<(), ModelError> {
    if levels < 2 {
        return Err(ModelError::InvalidLevels(levels));
    }
    Ok(())
}

/// Bucket `value` into one of `levels` equal-width bins `[k/Q, (k+1)/Q)`.
/// Values at or above `(Q-1)/Q`, including `1.0`, land in the top level.
pub fn quantize(value: f32, levels: usize) -> u32 {
    let top = levels.saturating_sub(1) as u32;
    let scaled = (value.clamp(0.0, 1.0) * levels as f32).floor();
    (scaled as u32).min(top)
}

/// Level back to the model input range: `level / (Q - 1)`.
pub fn dequantize(level: u32, levels: usize) -> f32 {
    let top = levels.saturating_sub(1).max(1) as f32;
    level as f32 / top
}

pub fn quantize_all(values: &[f32], levels: usize) -> Vec<u32> {
    values.iter().map(|&value| quantize(value, levels)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bins_follow_equal_width_edges() {
        assert_eq!(quantize(0.0, 4), 0);
        assert_eq!(quantize(0.24, 4), 0);
        assert_eq!(quantize(0.25, 4), 1);
        assert_eq!(quantize(0.74, 4), 2);
        assert_eq!(quantize(0.75, 4), 3);
        assert_eq!(quantize(1.0, 4), 3);
        assert_eq!(quantize(1.0, 256), 255);
        assert_eq!(quantize(128.0 / 256.0, 256), 128);
    }

    #[test]
    fn out_of_range_values_clamp() {
        assert_eq!(quantize(-0.5, 4), 0);
        assert_eq!(quantize(3.0, 4), 3);
    }

    #[test]
    fn requantizing_is_idempotent() {
        for levels in [2, 3, 4, 7, 16, 255, 256] {
            for level in 0..levels as u32 {
                let rescaled = dequantize(level, levels);
                assert_eq!(quantize(rescaled, levels), level, "levels={levels}");
            }
        }
    }

    #[test]
    fn idempotent_on_raw_intensities() {
        for levels in [4, 256] {
            for step in 0..=255u32 {
                let raw = step as f32 / 255.0;
                let once = quantize(raw, levels);
                let twice = quantize(dequantize(once, levels), levels);
                assert_eq!(once, twice);
            }
        }
    }

    #[test]
    fn fewer_than_two_levels_is_invalid() {
        assert_eq!(validate_levels(1), Err(ModelError::InvalidLevels(1)));
        assert!(validate_levels(2).is_ok());
    }
}
