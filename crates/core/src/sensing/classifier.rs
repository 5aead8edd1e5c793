use crate::types::{IndicatorColor, SaturationPercent, SoilCondition, ThresholdBand};

/// Classify a saturation percentage against the OK band.
///
/// First match wins: inside the band is OK/Green, below it DRY/Red,
/// above it WET/Blue. Total over every integer, so `Unknown` never comes
/// out. An inverted band has no OK region and splits readings into DRY or WET.
pub fn classify(
    percent: SaturationPercent,
    band: ThresholdBand,
) -> (SoilCondition, IndicatorColor) {
    if percent >= band.low_percent && percent <= band.high_percent {
        (SoilCondition::Ok, IndicatorColor::Green)
    } else if percent < band.low_percent {
        (SoilCondition::Dry, IndicatorColor::Red)
    } else {
        (SoilCondition::Wet, IndicatorColor::Blue)
    }
}
