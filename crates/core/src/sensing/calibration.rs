use crate::types::{CalibrationBounds, SaturationPercent};

/// Error raised when a raw reading cannot be mapped to a percentage.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("calibration bounds are degenerate: dry and wet are both {bound}")]
    DegenerateBounds { bound: i64 },
    #[error("raw reading is not a finite number")]
    NonFiniteReading,
}

/// Integer linear map with truncation toward zero.
///
/// `(x - in_low) * (out_high - out_low) / (in_high - in_low) + out_low`.
/// Products are computed in i128, so no realistic setting overflows; the
/// final value saturates at the i64 range.
pub fn linear_map(
    x: i64,
    in_low: i64,
    in_high: i64,
    out_low: i64,
    out_high: i64,
) -> Result<i64, CalibrationError> {
    let span = i128::from(in_high) - i128::from(in_low);
    if span == 0 {
        return Err(CalibrationError::DegenerateBounds { bound: in_low });
    }
    let scaled = (i128::from(x) - i128::from(in_low))
        * (i128::from(out_high) - i128::from(out_low))
        / span
        + i128::from(out_low);
    Ok(scaled.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64)
}

/// Map a raw analog sample onto the calibrated saturation scale.
///
/// `dry_raw` maps to 0 and `wet_raw` to 100. The fractional part of `raw`
/// is dropped before mapping. No clamping: samples outside the calibration
/// points extrapolate below 0 or above 100.
pub fn map_to_percent(
    raw: f32,
    bounds: CalibrationBounds,
) -> Result<SaturationPercent, CalibrationError> {
    if !raw.is_finite() {
        return Err(CalibrationError::NonFiniteReading);
    }
    if bounds.is_degenerate() {
        return Err(CalibrationError::DegenerateBounds {
            bound: bounds.dry_raw,
        });
    }
    // `as` truncates toward zero, matching the analog reading's conversion to an integer.
    let raw = raw as i64;
    let inverted = linear_map(raw, bounds.dry_raw, bounds.wet_raw, 100, 0)?;
    Ok(100_i64.saturating_sub(inverted))
}
