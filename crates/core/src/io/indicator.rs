use crate::ports::{Indicator, IndicatorError};
use crate::types::{Brightness, IndicatorColor, IndicatorCommand, SoilCondition};

/// Translate a soil condition into an LED command.
///
/// Disabled feedback always yields Off. DRY is shown bright, OK and WET dim;
/// drivers without dimming just use the color.
pub fn to_indicator_command(condition: SoilCondition, led_enabled: bool) -> IndicatorCommand {
    if !led_enabled {
        return IndicatorCommand::OFF;
    }
    let (color, brightness) = match condition {
        SoilCondition::Ok => (IndicatorColor::Green, Brightness::Dim),
        SoilCondition::Dry => (IndicatorColor::Red, Brightness::Bright),
        SoilCondition::Wet => (IndicatorColor::Blue, Brightness::Dim),
        SoilCondition::Unknown => return IndicatorCommand::OFF,
    };
    IndicatorCommand {
        color,
        brightness: Some(brightness),
    }
}

/// Push a command to the LED. Off writes zeros to every channel.
pub fn apply(indicator: &mut dyn Indicator, cmd: IndicatorCommand) -> Result<(), IndicatorError> {
    indicator.show(cmd.rgb(), cmd.level())
}
