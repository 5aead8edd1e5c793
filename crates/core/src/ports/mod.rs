//! Boundaries to the hardware and the telemetry transport.
//!
//! The device logic only talks to these traits. Real firmware plugs in ADC,
//! LED and network drivers; the simulator and the tests plug in the adapters
//! from [`mock`] or their own.

pub mod mock;

use crate::types::Rgb;

/// Failure reading the analog moisture pin.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    #[error("sensor read failed: {0}")]
    ReadFailed(String),
    #[error("sensor not ready")]
    NotReady,
}

/// Failure driving the status LED.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndicatorError {
    #[error("indicator write failed: {0}")]
    WriteFailed(String),
}

/// Failure on the telemetry transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport not connected")]
    NotConnected,
    #[error("publish failed: {0}")]
    PublishFailed(String),
    #[error("sleep handshake failed: {0}")]
    HandshakeFailed(String),
}

/// Lifecycle and configuration events raised by the transport between ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Connection established; telemetry can flow.
    Ready,
    /// Connection lost.
    Disconnected,
    /// Pending messages flushed after `prepare_to_sleep`; safe to power down.
    ReadyToSleep,
    /// Updated settings pushed by a remote controller. A JSON object of setting name to value.
    SettingsPushed(serde_json::Value),
}

/// Analog moisture probe.
pub trait MoistureSensor {
    fn read_raw(&mut self) -> Result<f32, SensorError>;
}

/// RGB status LED.
pub trait Indicator {
    /// Show `rgb` at `brightness`. `Rgb::OFF` at brightness 0 must dark every channel.
    fn show(&mut self, rgb: Rgb, brightness: u8) -> Result<(), IndicatorError>;
}

/// Pub/sub telemetry transport (connection handling lives behind this trait).
pub trait Transport {
    /// Declare the properties a node will publish.
    fn advertise(&mut self, node: &str, properties: &[&str]);

    /// Next pending event, if any. Never blocks.
    fn poll(&mut self) -> Option<TransportEvent>;

    fn publish(&mut self, node: &str, property: &str, value: &str) -> Result<(), TransportError>;

    /// Flush pending messages and detach. Completion arrives later as
    /// [`TransportEvent::ReadyToSleep`].
    fn prepare_to_sleep(&mut self) -> Result<(), TransportError>;
}

/// Hardware deep-sleep request. Real hardware never returns from this call.
pub trait DeepSleep {
    fn deep_sleep(&mut self, duration_micros: u64);
}

/// Wrapping millisecond counter since boot.
pub trait Clock {
    fn millis(&self) -> u32;
}
