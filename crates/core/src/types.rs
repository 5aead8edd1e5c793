use serde::{Deserialize, Serialize};
use std::fmt;

/// Calibrated moisture level. 0 = dry per calibration, 100 = saturated.
/// Not clamped: readings beyond the calibration points extrapolate past 0..=100.
pub type SaturationPercent = i64;

// ── Sensing ─────────────────────────────────────────────────────

/// Raw analog values the probe reports when fully dry and fully saturated.
/// Usually `dry_raw > wet_raw`, but either ordering maps correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationBounds {
    pub dry_raw: i64,
    pub wet_raw: i64,
}

impl CalibrationBounds {
    pub fn new(dry_raw: i64, wet_raw: i64) -> Self {
        Self { dry_raw, wet_raw }
    }

    /// True when both points are equal and no mapping exists.
    pub fn is_degenerate(&self) -> bool {
        self.dry_raw == self.wet_raw
    }
}

/// The "OK" band of saturation percentages, inclusive on both ends.
/// `low_percent > high_percent` is tolerated and yields an empty band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdBand {
    pub low_percent: i64,
    pub high_percent: i64,
}

impl ThresholdBand {
    pub fn new(low_percent: i64, high_percent: i64) -> Self {
        Self {
            low_percent,
            high_percent,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.low_percent > self.high_percent
    }
}

/// One analog sample. Transient, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub raw_value: f32,
    pub timestamp_ms: u32,
}

/// Tri-state soil classification. `Unknown` only exists before classification runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SoilCondition {
    #[default]
    Unknown,
    Ok,
    Dry,
    Wet,
}

impl SoilCondition {
    /// Label published as the `soil-condition` property.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Ok => "OK",
            Self::Dry => "DRY",
            Self::Wet => "WET",
        }
    }
}

impl fmt::Display for SoilCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Indicator ───────────────────────────────────────────────────

/// RGB triple handed to the LED driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const OFF: Rgb = Rgb(0, 0, 0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndicatorColor {
    Green,
    Red,
    Blue,
    Off,
}

impl IndicatorColor {
    /// Label published as the `led-color` property.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Green => "Green",
            Self::Red => "Red",
            Self::Blue => "Blue",
            Self::Off => "Off",
        }
    }

    pub fn rgb(self) -> Rgb {
        match self {
            Self::Green => Rgb(0, 255, 0),
            Self::Red => Rgb(255, 0, 0),
            Self::Blue => Rgb(0, 0, 255),
            Self::Off => Rgb::OFF,
        }
    }
}

impl fmt::Display for IndicatorColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Brightness tier for LEDs that support dimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Brightness {
    Dim,
    Bright,
}

impl Brightness {
    pub fn level(self) -> u8 {
        match self {
            Self::Dim => 48,
            Self::Bright => 255,
        }
    }
}

/// Concrete command for the status LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorCommand {
    pub color: IndicatorColor,
    pub brightness: Option<Brightness>,
}

impl IndicatorCommand {
    pub const OFF: IndicatorCommand = IndicatorCommand {
        color: IndicatorColor::Off,
        brightness: None,
    };

    pub fn is_off(&self) -> bool {
        self.color == IndicatorColor::Off
    }

    pub fn rgb(&self) -> Rgb {
        self.color.rgb()
    }

    /// Brightness level for the driver. Off is always 0; untiered colors run at full level.
    pub fn level(&self) -> u8 {
        if self.is_off() {
            return 0;
        }
        self.brightness.map_or(u8::MAX, Brightness::level)
    }
}

// ── Power ───────────────────────────────────────────────────────

/// Awake / deep-sleep lifecycle of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PowerState {
    #[default]
    Awake,
    AwaitingTransportReady,
    PreparingSleep,
    /// Terminal until a hardware reset brings the device back to `Awake`.
    Sleeping,
}

impl PowerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Awake => "awake",
            Self::AwaitingTransportReady => "awaiting_transport_ready",
            Self::PreparingSleep => "preparing_sleep",
            Self::Sleeping => "sleeping",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deep-sleep parameters, derived from settings each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepConfig {
    pub enabled: bool,
    pub sleep_duration_secs: u64,
    /// Window after boot before the sleep pipeline may advance. `None` disables the window.
    pub awake_grace_secs: Option<u64>,
}

impl SleepConfig {
    pub const MICROS_PER_SEC: u64 = 1_000_000;

    /// Duration handed to the hardware sleep call.
    pub fn sleep_duration_micros(&self) -> u64 {
        self.sleep_duration_secs.saturating_mul(Self::MICROS_PER_SEC)
    }

    /// True once `now_ms` is strictly past the grace window.
    pub fn grace_elapsed(&self, now_ms: u32) -> bool {
        match self.awake_grace_secs {
            None => true,
            Some(secs) => u64::from(now_ms) > secs.saturating_mul(1000),
        }
    }
}
