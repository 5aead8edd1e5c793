use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::types::{CalibrationBounds, SleepConfig, ThresholdBand};

pub const DEFAULT_SLEEP_SECONDS: i64 = 30;
pub const DEFAULT_DEEP_SLEEP: bool = false;
pub const DEFAULT_AWAKE_SECONDS: i64 = 20;
pub const DEFAULT_SENSOR_DRY: i64 = 830;
pub const DEFAULT_SENSOR_WET: i64 = 380;
pub const DEFAULT_HIGH_MOISTURE: i64 = 85;
pub const DEFAULT_LOW_MOISTURE: i64 = 20;
pub const DEFAULT_LED_FEEDBACK: bool = true;

/// Smallest accepted `awakeSeconds`. Shorter windows risk a device that
/// sleeps again before a config push can reach it.
pub const MIN_AWAKE_SECONDS: i64 = DEFAULT_AWAKE_SECONDS;

/// Error raised when a setting or a config file is rejected.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown setting `{0}`")]
    UnknownSetting(String),
    #[error("setting `{name}` expects {expected}")]
    TypeMismatch { name: String, expected: &'static str },
    #[error("setting `{name}` rejected value {value}")]
    OutOfRange { name: String, value: String },
    #[error("settings must be a JSON object")]
    NotAnObject,
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
}

// ── Schema ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Long(i64),
}

impl SettingValue {
    pub fn as_long(self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(v),
            Self::Bool(_) => None,
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(v),
            Self::Long(_) => None,
        }
    }

    fn type_name(self) -> &'static str {
        match self {
            Self::Bool(_) => "a boolean",
            Self::Long(_) => "an integer",
        }
    }

    fn to_json(self) -> Value {
        match self {
            Self::Bool(v) => Value::Bool(v),
            Self::Long(v) => Value::from(v),
        }
    }
}

/// One entry of the settings schema. The value type is the type of `default`.
#[derive(Debug, Clone, Copy)]
pub struct SettingSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub default: SettingValue,
    pub validate: fn(SettingValue) -> bool,
}

impl SettingSpec {
    /// Convert a JSON candidate to this setting's type.
    /// Booleans also accept `0`/`1` and `"true"`/`"false"`.
    pub fn coerce(&self, candidate: &Value) -> Result<SettingValue, ConfigError> {
        let coerced = match (self.default, candidate) {
            (SettingValue::Long(_), Value::Number(n)) => n.as_i64().map(SettingValue::Long),
            (SettingValue::Bool(_), Value::Bool(b)) => Some(SettingValue::Bool(*b)),
            (SettingValue::Bool(_), Value::Number(n)) => match n.as_i64() {
                Some(0) => Some(SettingValue::Bool(false)),
                Some(1) => Some(SettingValue::Bool(true)),
                _ => None,
            },
            (SettingValue::Bool(_), Value::String(s)) => match s.as_str() {
                "true" => Some(SettingValue::Bool(true)),
                "false" => Some(SettingValue::Bool(false)),
                _ => None,
            },
            _ => None,
        };
        coerced.ok_or_else(|| ConfigError::TypeMismatch {
            name: self.name.to_owned(),
            expected: self.default.type_name(),
        })
    }

    /// Type-check and validate a candidate.
    pub fn check(&self, candidate: SettingValue) -> Result<SettingValue, ConfigError> {
        if std::mem::discriminant(&candidate) != std::mem::discriminant(&self.default) {
            return Err(ConfigError::TypeMismatch {
                name: self.name.to_owned(),
                expected: self.default.type_name(),
            });
        }
        if !(self.validate)(candidate) {
            return Err(ConfigError::OutOfRange {
                name: self.name.to_owned(),
                value: candidate.to_json().to_string(),
            });
        }
        Ok(candidate)
    }
}

fn positive(v: SettingValue) -> bool {
    matches!(v, SettingValue::Long(n) if n > 0)
}

fn long_enough_awake(v: SettingValue) -> bool {
    matches!(v, SettingValue::Long(n) if n >= MIN_AWAKE_SECONDS)
}

fn boolean(v: SettingValue) -> bool {
    matches!(v, SettingValue::Bool(_))
}

/// Every externally configurable setting.
pub const SCHEMA: &[SettingSpec] = &[
    SettingSpec {
        name: "sleepSeconds",
        description: "Seconds between moisture readings",
        default: SettingValue::Long(DEFAULT_SLEEP_SECONDS),
        validate: positive,
    },
    SettingSpec {
        name: "deepSleep",
        description: "Deep sleep between readings",
        default: SettingValue::Bool(DEFAULT_DEEP_SLEEP),
        validate: boolean,
    },
    SettingSpec {
        name: "awakeSeconds",
        description: "Seconds to stay awake after boot before sleeping again",
        default: SettingValue::Long(DEFAULT_AWAKE_SECONDS),
        validate: long_enough_awake,
    },
    SettingSpec {
        name: "sensorDry",
        description: "Raw value the sensor reports when dry (in the air)",
        default: SettingValue::Long(DEFAULT_SENSOR_DRY),
        validate: positive,
    },
    SettingSpec {
        name: "sensorWet",
        description: "Raw value the sensor reports when wet (totally saturated)",
        default: SettingValue::Long(DEFAULT_SENSOR_WET),
        validate: positive,
    },
    SettingSpec {
        name: "highMoistureThreshold",
        description: "Percentage above which the soil is 'wet'",
        default: SettingValue::Long(DEFAULT_HIGH_MOISTURE),
        validate: positive,
    },
    SettingSpec {
        name: "lowMoistureThreshold",
        description: "Percentage below which the soil is 'dry'",
        default: SettingValue::Long(DEFAULT_LOW_MOISTURE),
        validate: positive,
    },
    SettingSpec {
        name: "ledFeedback",
        description: "Show the soil condition on the status LED",
        default: SettingValue::Bool(DEFAULT_LED_FEEDBACK),
        validate: boolean,
    },
];

pub fn spec(name: &str) -> Option<&'static SettingSpec> {
    SCHEMA.iter().find(|s| s.name == name)
}

// ── Store ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    settings: serde_json::Map<String, Value>,
}

/// Validated key/value settings. Starts at the schema defaults; a rejected
/// candidate keeps the last-known-good value.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsStore {
    values: BTreeMap<&'static str, SettingValue>,
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore {
    pub fn new() -> Self {
        Self {
            values: SCHEMA.iter().map(|s| (s.name, s.default)).collect(),
        }
    }

    /// Load a JSON config file with a `"settings"` object. Missing keys keep
    /// their defaults; rejected keys are logged and skipped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let store = Self::from_json_str(&text)?;
        tracing::info!(path = %path.as_ref().display(), "settings loaded");
        Ok(store)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(text)?;
        let mut store = Self::new();
        for err in store.apply_json(&Value::Object(file.settings)) {
            tracing::warn!(error = %err, "config file setting rejected, keeping default");
        }
        Ok(store)
    }

    pub fn get(&self, name: &str) -> Option<SettingValue> {
        self.values.get(name).copied()
    }

    pub fn get_long(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(SettingValue::as_long)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(SettingValue::as_bool)
    }

    pub fn set(&mut self, name: &str, candidate: SettingValue) -> Result<(), ConfigError> {
        let spec = spec(name).ok_or_else(|| ConfigError::UnknownSetting(name.to_owned()))?;
        let value = spec.check(candidate)?;
        self.values.insert(spec.name, value);
        Ok(())
    }

    pub fn set_json(&mut self, name: &str, candidate: &Value) -> Result<(), ConfigError> {
        let spec = spec(name).ok_or_else(|| ConfigError::UnknownSetting(name.to_owned()))?;
        let value = spec.check(spec.coerce(candidate)?)?;
        let previous = self.values.insert(spec.name, value);
        if previous != Some(value) {
            tracing::debug!(setting = spec.name, ?value, "setting updated");
        }
        Ok(())
    }

    /// Apply an object of name → value. Each key stands alone, so one bad key
    /// never blocks the others. Returns the rejections.
    pub fn apply_json(&mut self, settings: &Value) -> Vec<ConfigError> {
        let Some(object) = settings.as_object() else {
            return vec![ConfigError::NotAnObject];
        };
        object
            .iter()
            .filter_map(|(name, candidate)| self.set_json(name, candidate).err())
            .collect()
    }

    /// Current values as a JSON object, keyed by setting name.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(name, value)| ((*name).to_owned(), value.to_json()))
                .collect(),
        )
    }

    /// Typed view of the current values.
    pub fn snapshot(&self) -> SoilCfg {
        SoilCfg::from_store(self)
    }
}

// ── Typed snapshot ──────────────────────────────────────────────

/// Typed settings for one tick. Taken fresh from the store every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoilCfg {
    /// Sampling interval and deep-sleep duration.
    pub sleep_seconds: i64,
    pub deep_sleep: bool,
    pub awake_seconds: i64,
    pub sensor_dry: i64,
    pub sensor_wet: i64,
    pub high_moisture_threshold: i64,
    pub low_moisture_threshold: i64,
    pub led_feedback: bool,
}

impl Default for SoilCfg {
    fn default() -> Self {
        Self {
            sleep_seconds: DEFAULT_SLEEP_SECONDS,
            deep_sleep: DEFAULT_DEEP_SLEEP,
            awake_seconds: DEFAULT_AWAKE_SECONDS,
            sensor_dry: DEFAULT_SENSOR_DRY,
            sensor_wet: DEFAULT_SENSOR_WET,
            high_moisture_threshold: DEFAULT_HIGH_MOISTURE,
            low_moisture_threshold: DEFAULT_LOW_MOISTURE,
            led_feedback: DEFAULT_LED_FEEDBACK,
        }
    }
}

impl SoilCfg {
    fn from_store(store: &SettingsStore) -> Self {
        let d = Self::default();
        Self {
            sleep_seconds: long_or(store, "sleepSeconds", d.sleep_seconds),
            deep_sleep: bool_or(store, "deepSleep", d.deep_sleep),
            awake_seconds: long_or(store, "awakeSeconds", d.awake_seconds),
            sensor_dry: long_or(store, "sensorDry", d.sensor_dry),
            sensor_wet: long_or(store, "sensorWet", d.sensor_wet),
            high_moisture_threshold: long_or(store, "highMoistureThreshold", d.high_moisture_threshold),
            low_moisture_threshold: long_or(store, "lowMoistureThreshold", d.low_moisture_threshold),
            led_feedback: bool_or(store, "ledFeedback", d.led_feedback),
        }
    }

    pub fn calibration(&self) -> CalibrationBounds {
        CalibrationBounds::new(self.sensor_dry, self.sensor_wet)
    }

    pub fn thresholds(&self) -> ThresholdBand {
        ThresholdBand::new(self.low_moisture_threshold, self.high_moisture_threshold)
    }

    pub fn sample_interval_secs(&self) -> u64 {
        to_secs(self.sleep_seconds, DEFAULT_SLEEP_SECONDS)
    }

    pub fn sleep(&self) -> SleepConfig {
        SleepConfig {
            enabled: self.deep_sleep,
            sleep_duration_secs: to_secs(self.sleep_seconds, DEFAULT_SLEEP_SECONDS),
            awake_grace_secs: Some(to_secs(self.awake_seconds, DEFAULT_AWAKE_SECONDS)),
        }
    }
}

fn long_or(store: &SettingsStore, name: &str, default: i64) -> i64 {
    store.get_long(name).unwrap_or(default)
}

fn bool_or(store: &SettingsStore, name: &str, default: bool) -> bool {
    store.get_bool(name).unwrap_or(default)
}

fn to_secs(value: i64, default: i64) -> u64 {
    u64::try_from(value)
        .or_else(|_| u64::try_from(default))
        .unwrap_or(1)
}
