//! Host-side stand-ins for the board: a sweeping sensor, a logging LED,
//! a loopback transport on stdin/stdout, and a wall-clock.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use soilsense_core::DevicePorts;
use soilsense_core::ports::{
    Clock, DeepSleep, Indicator, IndicatorError, MoistureSensor, SensorError, Transport,
    TransportError, TransportEvent,
};
use soilsense_core::types::Rgb;
use tokio::sync::mpsc;

// ── Sensor ──────────────────────────────────────────────────────

/// Triangle wave between `low` and `high`, moving `step` per read.
#[derive(Debug, Clone)]
pub struct SweepSensor {
    value: f32,
    step: f32,
    low: f32,
    high: f32,
}

impl SweepSensor {
    pub fn new(low: f32, high: f32, step: f32) -> Self {
        Self {
            value: (low + high) / 2.0,
            step,
            low,
            high,
        }
    }
}

impl MoistureSensor for SweepSensor {
    fn read_raw(&mut self) -> Result<f32, SensorError> {
        let raw = self.value;
        let next = self.value + self.step;
        if next > self.high || next < self.low {
            self.step = -self.step;
        }
        self.value += self.step;
        Ok(raw)
    }
}

// ── Indicator ───────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn show(&mut self, rgb: Rgb, brightness: u8) -> Result<(), IndicatorError> {
        let Rgb(r, g, b) = rgb;
        tracing::debug!(r, g, b, brightness, "led");
        Ok(())
    }
}

// ── Transport ───────────────────────────────────────────────────

/// A line typed on stdin.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A settings object, either bare or wrapped as `{"settings": {...}}`.
    Settings(serde_json::Value),
    Connect,
    Disconnect,
}

impl Inbound {
    pub fn parse(line: &str) -> Result<Self, String> {
        match line.trim() {
            "connect" => Ok(Self::Connect),
            "disconnect" => Ok(Self::Disconnect),
            text => {
                let mut value: serde_json::Value =
                    serde_json::from_str(text).map_err(|e| e.to_string())?;
                if !value.is_object() {
                    return Err("expected a JSON object".to_owned());
                }
                if let Some(inner) = value.get_mut("settings").map(serde_json::Value::take) {
                    value = inner;
                }
                Ok(Self::Settings(value))
            }
        }
    }
}

pub type InboundReceiver = Arc<Mutex<mpsc::UnboundedReceiver<Inbound>>>;

/// Read stdin on a dedicated thread; tokio stdin would hold the runtime open.
pub fn spawn_stdin_thread() -> InboundReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin closed");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match Inbound::parse(&line) {
                Ok(msg) => {
                    if tx.send(msg).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, line, "ignoring stdin line"),
            }
        }
    });
    Arc::new(Mutex::new(rx))
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    topic: String,
    payload: &'a str,
}

/// Transport that prints publishes as JSON lines and takes pushes from stdin.
///
/// The link comes up on the first poll after boot. Sleep handshakes are
/// acknowledged straight away.
pub struct LoopbackTransport<W> {
    device_id: String,
    inbox: InboundReceiver,
    pending: VecDeque<TransportEvent>,
    connected: bool,
    booted: bool,
    out: W,
}

impl<W: Write> LoopbackTransport<W> {
    pub fn new(device_id: impl Into<String>, inbox: InboundReceiver, out: W) -> Self {
        Self {
            device_id: device_id.into(),
            inbox,
            pending: VecDeque::new(),
            connected: false,
            booted: false,
            out,
        }
    }

    fn topic(&self, node: &str, property: &str) -> String {
        format!("homie/{}/{node}/{property}", self.device_id)
    }

    fn next_inbound(&mut self) -> Option<Inbound> {
        let mut rx = self
            .inbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        rx.try_recv().ok()
    }
}

impl<W: Write> Transport for LoopbackTransport<W> {
    fn advertise(&mut self, node: &str, properties: &[&str]) {
        tracing::info!(device = %self.device_id, node, ?properties, "advertised");
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        if !self.booted {
            self.booted = true;
            self.connected = true;
            return Some(TransportEvent::Ready);
        }
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        match self.next_inbound()? {
            Inbound::Settings(value) => Some(TransportEvent::SettingsPushed(value)),
            Inbound::Connect => {
                self.connected = true;
                Some(TransportEvent::Ready)
            }
            Inbound::Disconnect => {
                self.connected = false;
                Some(TransportEvent::Disconnected)
            }
        }
    }

    fn publish(&mut self, node: &str, property: &str, value: &str) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        let msg = Message {
            topic: self.topic(node, property),
            payload: value,
        };
        let line =
            serde_json::to_string(&msg).map_err(|e| TransportError::PublishFailed(e.to_string()))?;
        writeln!(self.out, "{line}").map_err(|e| TransportError::PublishFailed(e.to_string()))
    }

    fn prepare_to_sleep(&mut self) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.out
            .flush()
            .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?;
        self.connected = false;
        self.pending.push_back(TransportEvent::ReadyToSleep);
        Ok(())
    }
}

// ── Power & time ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct LogSleep;

impl DeepSleep for LogSleep {
    fn deep_sleep(&mut self, duration_micros: u64) {
        tracing::info!(duration_micros, "entering deep sleep");
    }
}

/// Milliseconds since this boot, truncated to the 32-bit counter.
#[derive(Debug)]
pub struct BootClock {
    boot: Instant,
}

impl BootClock {
    pub fn new() -> Self {
        Self {
            boot: Instant::now(),
        }
    }
}

impl Clock for BootClock {
    fn millis(&self) -> u32 {
        self.boot.elapsed().as_millis() as u32
    }
}

/// Fresh adapters for one boot. The stdin inbox outlives boots.
pub fn ports(device_id: &str, inbox: InboundReceiver) -> DevicePorts {
    DevicePorts {
        sensor: Box::new(SweepSensor::new(300.0, 900.0, 37.0)),
        indicator: Box::new(LogIndicator),
        transport: Box::new(LoopbackTransport::new(device_id, inbox, io::stdout())),
        sleeper: Box::new(LogSleep),
        clock: Box::new(BootClock::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport() -> (
        LoopbackTransport<Vec<u8>>,
        mpsc::UnboundedSender<Inbound>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let t = LoopbackTransport::new("bed-3", Arc::new(Mutex::new(rx)), Vec::new());
        (t, tx)
    }

    #[test]
    fn sweep_stays_in_range() {
        let mut s = SweepSensor::new(300.0, 900.0, 37.0);
        for _ in 0..500 {
            let raw = s.read_raw().unwrap();
            assert!((300.0..=900.0).contains(&raw), "raw {raw}");
        }
    }

    #[test]
    fn parses_stdin_lines() {
        assert_eq!(Inbound::parse("connect"), Ok(Inbound::Connect));
        assert_eq!(Inbound::parse(" disconnect "), Ok(Inbound::Disconnect));
        assert_eq!(
            Inbound::parse(r#"{"settings":{"deepSleep":true}}"#),
            Ok(Inbound::Settings(json!({ "deepSleep": true })))
        );
        assert_eq!(
            Inbound::parse(r#"{"sleepSeconds":60}"#),
            Ok(Inbound::Settings(json!({ "sleepSeconds": 60 })))
        );
        assert!(Inbound::parse("[1,2]").is_err());
        assert!(Inbound::parse("nonsense").is_err());
    }

    #[test]
    fn first_poll_brings_link_up() {
        let (mut t, _tx) = transport();
        assert!(t.publish("sensor", "saturation", "50").is_err());
        assert_eq!(t.poll(), Some(TransportEvent::Ready));
        assert_eq!(t.poll(), None);
        t.publish("sensor", "saturation", "50").unwrap();

        let out = String::from_utf8(t.out.clone()).unwrap();
        let line: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(line["topic"], "homie/bed-3/sensor/saturation");
        assert_eq!(line["payload"], "50");
    }

    #[test]
    fn forwards_pushes_and_link_changes() {
        let (mut t, tx) = transport();
        t.poll();
        tx.send(Inbound::Settings(json!({ "ledFeedback": false })))
            .unwrap();
        tx.send(Inbound::Disconnect).unwrap();
        assert_eq!(
            t.poll(),
            Some(TransportEvent::SettingsPushed(json!({ "ledFeedback": false })))
        );
        assert_eq!(t.poll(), Some(TransportEvent::Disconnected));
        assert_eq!(
            t.publish("sensor", "saturation", "1"),
            Err(TransportError::NotConnected)
        );
    }

    #[test]
    fn acknowledges_sleep_handshake() {
        let (mut t, _tx) = transport();
        t.poll();
        t.prepare_to_sleep().unwrap();
        assert_eq!(t.poll(), Some(TransportEvent::ReadyToSleep));
        assert!(t.publish("sensor", "saturation", "1").is_err());
    }
}
