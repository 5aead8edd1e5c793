use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_TICK_MS: u64 = 50;
pub const DEFAULT_DEVICE_ID: &str = "soil-sensor";

/// Simulator options, read from `SOILSENSE_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// JSON file with a `"settings"` object.
    pub config: Option<PathBuf>,
    pub tick: Duration,
    pub device_id: String,
    /// Stop after this many wake cycles; unlimited when unset.
    pub max_boots: Option<u32>,
    pub log_json: bool,
}

impl Options {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let tick_ms = match var("SOILSENSE_TICK_MS") {
            Some(v) => v
                .parse::<u64>()
                .with_context(|| format!("SOILSENSE_TICK_MS is not a number: {v:?}"))?,
            None => DEFAULT_TICK_MS,
        };
        anyhow::ensure!(tick_ms > 0, "SOILSENSE_TICK_MS must be positive");

        let max_boots = var("SOILSENSE_MAX_BOOTS")
            .map(|v| {
                v.parse::<u32>()
                    .with_context(|| format!("SOILSENSE_MAX_BOOTS is not a number: {v:?}"))
            })
            .transpose()?;

        Ok(Self {
            config: var("SOILSENSE_CONFIG").map(PathBuf::from),
            tick: Duration::from_millis(tick_ms),
            device_id: var("SOILSENSE_DEVICE_ID")
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DEVICE_ID.to_owned()),
            max_boots,
            log_json: var("SOILSENSE_LOG_JSON").is_some_and(|v| v == "1" || v == "true"),
        })
    }
}
