//! Turning a raw analog sample into a calibrated, classified soil reading.

pub mod calibration;
pub mod classifier;

pub use calibration::{CalibrationError, linear_map, map_to_percent};
pub use classifier::classify;

use serde::{Deserialize, Serialize};

use crate::types::{
    CalibrationBounds, IndicatorColor, Reading, SaturationPercent, SoilCondition, ThresholdBand,
};

/// Result of running one reading through the mapper and the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub reading: Reading,
    pub percent: SaturationPercent,
    pub condition: SoilCondition,
    pub color: IndicatorColor,
}

/// Mapper then classifier, in that order.
pub fn assess(
    reading: Reading,
    bounds: CalibrationBounds,
    band: ThresholdBand,
) -> Result<Assessment, CalibrationError> {
    let percent = map_to_percent(reading.raw_value, bounds)?;
    let (condition, color) = classify(percent, band);
    Ok(Assessment {
        reading,
        percent,
        condition,
        color,
    })
}
