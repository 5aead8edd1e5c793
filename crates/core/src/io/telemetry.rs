use serde::{Deserialize, Serialize};

use crate::ports::{Transport, TransportError};
use crate::sensing::Assessment;
use crate::types::{IndicatorColor, SaturationPercent, SoilCondition};

/// Node every property is published under.
pub const NODE_ID: &str = "sensor";

pub const PROP_UOM: &str = "uom";
pub const PROP_SATURATION: &str = "saturation";
pub const PROP_SOIL_CONDITION: &str = "soil-condition";
pub const PROP_LED_COLOR: &str = "led-color";

/// Properties advertised at startup.
pub const ADVERTISED_PROPERTIES: [&str; 4] =
    [PROP_UOM, PROP_SATURATION, PROP_LED_COLOR, PROP_SOIL_CONDITION];

/// Unit of measure, sent once per boot when the transport first comes up.
pub const UNIT_OF_MEASURE: &str = "%";

/// Values published for one due sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub saturation: SaturationPercent,
    pub condition: SoilCondition,
    /// Color of the classification, reported even when the LED itself is off.
    pub color: IndicatorColor,
}

impl TelemetryFrame {
    /// Property name → value text, in publish order.
    pub fn properties(&self) -> [(&'static str, String); 3] {
        [
            (PROP_SATURATION, self.saturation.to_string()),
            (PROP_SOIL_CONDITION, self.condition.as_str().to_owned()),
            (PROP_LED_COLOR, self.color.as_str().to_owned()),
        ]
    }
}

impl From<&Assessment> for TelemetryFrame {
    fn from(a: &Assessment) -> Self {
        Self {
            saturation: a.percent,
            condition: a.condition,
            color: a.color,
        }
    }
}

/// Publish every property of `frame`. Each send is independent: one failure
/// does not stop the rest. Returns the failed properties.
pub fn publish_frame(
    transport: &mut dyn Transport,
    frame: &TelemetryFrame,
) -> Vec<(&'static str, TransportError)> {
    let mut failed = Vec::new();
    for (property, value) in frame.properties() {
        if let Err(e) = transport.publish(NODE_ID, property, &value) {
            failed.push((property, e));
        }
    }
    failed
}

/// Send the unit of measure.
pub fn publish_uom(transport: &mut dyn Transport) -> Result<(), TransportError> {
    transport.publish(NODE_ID, PROP_UOM, UNIT_OF_MEASURE)
}
