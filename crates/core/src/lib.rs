//! Soil moisture sensor core.
//!
//! A raw analog sample is mapped onto a calibrated saturation percentage,
//! classified as OK / DRY / WET, shown on a status LED and published as
//! telemetry. A power controller decides when the device may deep-sleep.
//!
//! ```text
//! transport events ──► settings store ──► SoilCfg (fresh every tick)
//!                                            │
//!   SamplingScheduler ── due? ──► sensor ► mapper ► classifier ► indicator ► telemetry
//!   PowerCycle ◄── Tick / TransportReady / ReadyToSleep ──► prepare / deep sleep
//! ```
//!
//! Hardware and the network live behind the traits in [`ports`].

pub mod config;
pub mod io;
pub mod ports;
pub mod runtime;
pub mod sensing;
pub mod types;

pub use config::{ConfigError, SettingsStore, SoilCfg};
pub use runtime::{Device, DevicePorts, RunOutcome};
pub use sensing::CalibrationError;
