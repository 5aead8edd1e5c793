//! In-memory adapters with shared handles.
//!
//! Each adapter is `Clone`; clones share state, so a test keeps one handle
//! and hands the other to the [`Device`](crate::runtime::Device).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    Clock, DeepSleep, Indicator, IndicatorError, MoistureSensor, SensorError, Transport,
    TransportError, TransportEvent,
};
use crate::types::Rgb;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── Sensor ──────────────────────────────────────────────────────

/// Sensor that returns whatever value was last set.
#[derive(Debug, Clone)]
pub struct FixedSensor {
    value: Arc<Mutex<Result<f32, SensorError>>>,
    reads: Arc<AtomicU32>,
}

impl FixedSensor {
    pub fn new(raw: f32) -> Self {
        Self {
            value: Arc::new(Mutex::new(Ok(raw))),
            reads: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn set(&self, raw: f32) {
        *lock(&self.value) = Ok(raw);
    }

    pub fn fail(&self, err: SensorError) {
        *lock(&self.value) = Err(err);
    }

    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl MoistureSensor for FixedSensor {
    fn read_raw(&mut self) -> Result<f32, SensorError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        lock(&self.value).clone()
    }
}

// ── Indicator ───────────────────────────────────────────────────

/// Indicator that records every command it was asked to show.
#[derive(Debug, Clone, Default)]
pub struct RecordingIndicator {
    shown: Arc<Mutex<Vec<(Rgb, u8)>>>,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<(Rgb, u8)> {
        lock(&self.shown).clone()
    }

    pub fn last(&self) -> Option<(Rgb, u8)> {
        lock(&self.shown).last().copied()
    }
}

impl Indicator for RecordingIndicator {
    fn show(&mut self, rgb: Rgb, brightness: u8) -> Result<(), IndicatorError> {
        lock(&self.shown).push((rgb, brightness));
        Ok(())
    }
}

// ── Transport ───────────────────────────────────────────────────

/// One message handed to [`Transport::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub node: String,
    pub property: String,
    pub value: String,
}

#[derive(Debug, Default)]
struct TransportLog {
    inbox: VecDeque<TransportEvent>,
    published: Vec<Published>,
    advertised: Vec<(String, Vec<String>)>,
    prepare_calls: u32,
    connected: bool,
    ack_sleep: bool,
}

/// Transport driven by the test: events are queued by hand, publishes are recorded.
///
/// Publishing fails with `NotConnected` until [`connect`](Self::connect) is called.
/// With [`ack_sleep`](Self::ack_sleep) set, `prepare_to_sleep` queues `ReadyToSleep`.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    log: Arc<Mutex<TransportLog>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the link up and queue a `Ready` event.
    pub fn connect(&self) {
        let mut log = lock(&self.log);
        log.connected = true;
        log.inbox.push_back(TransportEvent::Ready);
    }

    /// Mark the link down and queue a `Disconnected` event.
    pub fn disconnect(&self) {
        let mut log = lock(&self.log);
        log.connected = false;
        log.inbox.push_back(TransportEvent::Disconnected);
    }

    pub fn push_event(&self, event: TransportEvent) {
        lock(&self.log).inbox.push_back(event);
    }

    pub fn push_settings(&self, settings: serde_json::Value) {
        self.push_event(TransportEvent::SettingsPushed(settings));
    }

    pub fn ack_sleep(&self, ack: bool) {
        lock(&self.log).ack_sleep = ack;
    }

    pub fn published(&self) -> Vec<Published> {
        lock(&self.log).published.clone()
    }

    /// Values published for `property`, oldest first.
    pub fn values_of(&self, property: &str) -> Vec<String> {
        lock(&self.log)
            .published
            .iter()
            .filter(|p| p.property == property)
            .map(|p| p.value.clone())
            .collect()
    }

    pub fn advertised(&self) -> Vec<(String, Vec<String>)> {
        lock(&self.log).advertised.clone()
    }

    pub fn prepare_calls(&self) -> u32 {
        lock(&self.log).prepare_calls
    }

    pub fn clear_published(&self) {
        lock(&self.log).published.clear();
    }
}

impl Transport for RecordingTransport {
    fn advertise(&mut self, node: &str, properties: &[&str]) {
        lock(&self.log).advertised.push((
            node.to_owned(),
            properties.iter().map(|p| (*p).to_owned()).collect(),
        ));
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        lock(&self.log).inbox.pop_front()
    }

    fn publish(&mut self, node: &str, property: &str, value: &str) -> Result<(), TransportError> {
        let mut log = lock(&self.log);
        if !log.connected {
            return Err(TransportError::NotConnected);
        }
        log.published.push(Published {
            node: node.to_owned(),
            property: property.to_owned(),
            value: value.to_owned(),
        });
        Ok(())
    }

    fn prepare_to_sleep(&mut self) -> Result<(), TransportError> {
        let mut log = lock(&self.log);
        log.prepare_calls += 1;
        if !log.connected {
            return Err(TransportError::NotConnected);
        }
        if log.ack_sleep {
            log.inbox.push_back(TransportEvent::ReadyToSleep);
        }
        Ok(())
    }
}

// ── Power & time ────────────────────────────────────────────────

/// Records deep-sleep requests instead of halting.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleep {
    requests: Arc<Mutex<Vec<u64>>>,
}

impl RecordingSleep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<u64> {
        lock(&self.requests).clone()
    }
}

impl DeepSleep for RecordingSleep {
    fn deep_sleep(&mut self, duration_micros: u64) {
        lock(&self.requests).push(duration_micros);
    }
}

/// Clock advanced by hand.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU32>,
}

impl ManualClock {
    pub fn new(start_ms: u32) -> Self {
        Self {
            now: Arc::new(AtomicU32::new(start_ms)),
        }
    }

    pub fn set(&self, ms: u32) {
        self.now.store(ms, Ordering::Relaxed);
    }

    /// Advance with wraparound, like the hardware counter.
    pub fn advance(&self, ms: u32) {
        let now = self.now.load(Ordering::Relaxed);
        self.now.store(now.wrapping_add(ms), Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn millis(&self) -> u32 {
        self.now.load(Ordering::Relaxed)
    }
}
