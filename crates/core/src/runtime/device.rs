use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::power_cycle::{PowerCommand, PowerCycle, PowerEvent};
use super::sampling::SamplingScheduler;
use crate::config::{SettingsStore, SoilCfg};
use crate::io::indicator::{self, to_indicator_command};
use crate::io::telemetry::{self, ADVERTISED_PROPERTIES, NODE_ID, TelemetryFrame};
use crate::ports::{
    Clock, DeepSleep, Indicator, MoistureSensor, Transport, TransportError, TransportEvent,
};
use crate::sensing::{self, Assessment, CalibrationError};
use crate::types::{IndicatorCommand, PowerState, Reading};

/// Upper bound on transport events handled in a single tick.
pub const MAX_EVENTS_PER_TICK: usize = 16;

/// Hardware and transport collaborators the device drives.
pub struct DevicePorts {
    pub sensor: Box<dyn MoistureSensor>,
    pub indicator: Box<dyn Indicator>,
    pub transport: Box<dyn Transport>,
    pub sleeper: Box<dyn DeepSleep>,
    pub clock: Box<dyn Clock>,
}

/// What happened to a due sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// Classified and published.
    Assessed(Assessment),
    /// Calibration could not map the reading; nothing published.
    Rejected(CalibrationError),
    /// The sensor returned no reading.
    SensorFailed,
}

/// Summary of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub now_ms: u32,
    pub sample: Option<SampleOutcome>,
    pub power: PowerState,
}

/// Why [`Device::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Deep sleep was issued; the device resumes only through a reset.
    Slept { micros: u64 },
    Cancelled,
}

/// The soil sensor: one cooperative loop owning all mutable state.
pub struct Device {
    /// Externally owned settings; read fresh every tick.
    settings: SettingsStore,
    ports: DevicePorts,
    sampler: SamplingScheduler,
    power: PowerCycle,
    tick_count: u64,
    /// Unit of measure goes out once per boot, on the first transport-ready.
    uom_sent: bool,
    slept_micros: Option<u64>,
}

impl Device {
    /// Boot the device: advertise properties and start in `Awake`.
    pub fn new(settings: SettingsStore, mut ports: DevicePorts) -> Self {
        ports.transport.advertise(NODE_ID, &ADVERTISED_PROPERTIES);
        tracing::info!(settings = %settings.to_json(), "device booted");
        Self {
            settings,
            ports,
            sampler: SamplingScheduler::new(),
            power: PowerCycle::new(),
            tick_count: 0,
            uom_sent: false,
            slept_micros: None,
        }
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SettingsStore {
        &mut self.settings
    }

    /// Hand the settings back, e.g. to carry them across a simulated reset.
    pub fn into_settings(self) -> SettingsStore {
        self.settings
    }

    pub fn power_state(&self) -> PowerState {
        self.power.state()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Sleep duration issued to the hardware, once asleep.
    pub fn slept_micros(&self) -> Option<u64> {
        self.slept_micros
    }

    /// Drive `tick` on a fixed period until deep sleep is issued or `token` is cancelled.
    pub async fn run(&mut self, period: Duration, token: CancellationToken) -> RunOutcome {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(period_ms = period.as_millis() as u64, "device loop started");

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!(tick_count = self.tick_count, "shutdown signal received, exiting tick loop");
                    return RunOutcome::Cancelled;
                }
                _ = interval.tick() => {
                    self.tick();
                    if let Some(micros) = self.slept_micros {
                        tracing::info!(tick_count = self.tick_count, micros, "deep sleep issued, halting");
                        return RunOutcome::Slept { micros };
                    }
                }
            }
        }
    }

    /// One pass: transport events, then a sample if due, then the power controller.
    pub fn tick(&mut self) -> TickReport {
        self.tick_count += 1;
        let _span = tracing::debug_span!("tick", n = self.tick_count).entered();
        let now = self.ports.clock.millis();

        if self.power.state() == PowerState::Sleeping {
            return TickReport {
                now_ms: now,
                sample: None,
                power: PowerState::Sleeping,
            };
        }

        self.drain_transport(now);

        let cfg = self.settings.snapshot();
        let mut sample = None;
        if self.power.state() != PowerState::Sleeping
            && self.sampler.is_due(now, cfg.sample_interval_secs())
        {
            sample = Some(self.sample(now, &cfg));
            self.sampler.mark(now);
        }

        self.advance_power(PowerEvent::Tick, now);

        TickReport {
            now_ms: now,
            sample,
            power: self.power.state(),
        }
    }

    /// Handle pending transport events, at most [`MAX_EVENTS_PER_TICK`].
    /// Returns how many were handled.
    fn drain_transport(&mut self, now: u32) -> usize {
        for handled in 0..MAX_EVENTS_PER_TICK {
            if self.power.state() == PowerState::Sleeping {
                return handled;
            }
            let Some(event) = self.ports.transport.poll() else {
                return handled;
            };
            match event {
                TransportEvent::SettingsPushed(settings) => self.apply_settings(&settings),
                TransportEvent::Ready => {
                    tracing::info!("transport ready");
                    if !self.uom_sent {
                        match telemetry::publish_uom(self.ports.transport.as_mut()) {
                            Ok(()) => self.uom_sent = true,
                            Err(e) => tracing::warn!(error = %e, "failed to send unit of measure"),
                        }
                    }
                    self.advance_power(PowerEvent::TransportReady, now);
                }
                TransportEvent::Disconnected => {
                    tracing::warn!("transport disconnected");
                    self.advance_power(PowerEvent::TransportLost, now);
                }
                TransportEvent::ReadyToSleep => {
                    self.advance_power(PowerEvent::ReadyToSleep, now);
                }
            }
        }
        // the transport cannot be peeked, so whether more are queued is unknown here
        tracing::debug!(
            max = MAX_EVENTS_PER_TICK,
            "transport event budget reached, any further events wait for the next tick"
        );
        MAX_EVENTS_PER_TICK
    }

    fn apply_settings(&mut self, pushed: &serde_json::Value) {
        let rejected = self.settings.apply_json(pushed);
        for err in &rejected {
            tracing::warn!(error = %err, "pushed setting rejected, keeping last-known-good");
        }
        let received = pushed.as_object().map_or(0, |o| o.len());
        tracing::info!(
            received,
            rejected = rejected.len(),
            "settings pushed"
        );
    }

    /// Sensor → mapper → classifier → indicator → telemetry, in strict order.
    fn sample(&mut self, now: u32, cfg: &SoilCfg) -> SampleOutcome {
        let raw = match self.ports.sensor.read_raw() {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "moisture sensor read failed");
                return SampleOutcome::SensorFailed;
            }
        };
        let reading = Reading {
            raw_value: raw,
            timestamp_ms: now,
        };

        let assessment = match sensing::assess(reading, cfg.calibration(), cfg.thresholds()) {
            Ok(a) => a,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    raw,
                    sensor_dry = cfg.sensor_dry,
                    sensor_wet = cfg.sensor_wet,
                    "calibration error, sample rejected"
                );
                self.show(IndicatorCommand::OFF);
                return SampleOutcome::Rejected(e);
            }
        };
        tracing::info!(raw, percent = assessment.percent, "moisture reading");

        let cmd = to_indicator_command(assessment.condition, cfg.led_feedback);
        self.show(cmd);
        tracing::info!(
            condition = %assessment.condition,
            color = %assessment.color,
            led = !cmd.is_off(),
            "soil condition"
        );

        let frame = TelemetryFrame::from(&assessment);
        for (property, err) in telemetry::publish_frame(self.ports.transport.as_mut(), &frame) {
            match err {
                TransportError::NotConnected => {
                    tracing::debug!(property, "transport not connected, telemetry dropped")
                }
                other => tracing::warn!(property, error = %other, "telemetry publish failed"),
            }
        }

        SampleOutcome::Assessed(assessment)
    }

    fn show(&mut self, cmd: IndicatorCommand) {
        if let Err(e) = indicator::apply(self.ports.indicator.as_mut(), cmd) {
            tracing::warn!(error = %e, color = %cmd.color, "indicator update failed");
        }
    }

    fn advance_power(&mut self, event: PowerEvent, now: u32) {
        let sleep = self.settings.snapshot().sleep();
        match self.power.handle(event, now, &sleep) {
            Some(PowerCommand::PrepareTransport) => {
                if let Err(e) = self.ports.transport.prepare_to_sleep() {
                    tracing::warn!(error = %e, "sleep handshake failed, staying awake");
                    self.power.handle(PowerEvent::TransportLost, now, &sleep);
                }
            }
            Some(PowerCommand::DeepSleep { micros }) => {
                self.slept_micros = Some(micros);
                self.ports.sleeper.deep_sleep(micros);
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::{
        FixedSensor, ManualClock, RecordingIndicator, RecordingSleep, RecordingTransport,
    };
    use crate::types::{Rgb, SoilCondition};
    use serde_json::json;

    struct Rig {
        sensor: FixedSensor,
        led: RecordingIndicator,
        transport: RecordingTransport,
        sleeper: RecordingSleep,
        clock: ManualClock,
    }

    impl Rig {
        fn new(raw: f32) -> Self {
            Self {
                sensor: FixedSensor::new(raw),
                led: RecordingIndicator::new(),
                transport: RecordingTransport::new(),
                sleeper: RecordingSleep::new(),
                clock: ManualClock::new(1),
            }
        }

        fn device(&self, settings: SettingsStore) -> Device {
            Device::new(
                settings,
                DevicePorts {
                    sensor: Box::new(self.sensor.clone()),
                    indicator: Box::new(self.led.clone()),
                    transport: Box::new(self.transport.clone()),
                    sleeper: Box::new(self.sleeper.clone()),
                    clock: Box::new(self.clock.clone()),
                },
            )
        }
    }

    #[test]
    fn advertises_properties_on_boot() {
        let rig = Rig::new(605.0);
        let _dev = rig.device(SettingsStore::new());
        let advertised = rig.transport.advertised();
        assert_eq!(advertised.len(), 1);
        assert_eq!(advertised[0].0, "sensor");
        assert_eq!(advertised[0].1.len(), 4);
    }

    #[test]
    fn first_tick_samples() {
        let rig = Rig::new(605.0);
        let mut dev = rig.device(SettingsStore::new());
        let report = dev.tick();
        match report.sample {
            Some(SampleOutcome::Assessed(a)) => {
                assert_eq!(a.percent, 50);
                assert_eq!(a.condition, SoilCondition::Ok);
            }
            other => panic!("unexpected sample outcome: {other:?}"),
        }
        assert_eq!(rig.led.last(), Some((Rgb(0, 255, 0), 48)));
    }

    #[test]
    fn uom_sent_once_per_boot() {
        let rig = Rig::new(605.0);
        let mut dev = rig.device(SettingsStore::new());
        rig.transport.connect();
        dev.tick();
        rig.transport.disconnect();
        rig.transport.connect();
        dev.tick();
        assert_eq!(rig.transport.values_of("uom"), vec!["%".to_owned()]);
    }

    #[test]
    fn sensor_failure_is_not_fatal() {
        let rig = Rig::new(605.0);
        rig.sensor
            .fail(crate::ports::SensorError::ReadFailed("adc busy".into()));
        let mut dev = rig.device(SettingsStore::new());
        assert_eq!(dev.tick().sample, Some(SampleOutcome::SensorFailed));

        rig.sensor.set(830.0);
        rig.clock.advance(30_000);
        assert!(matches!(
            dev.tick().sample,
            Some(SampleOutcome::Assessed(a)) if a.condition == SoilCondition::Dry
        ));
    }

    #[test]
    fn pushed_settings_apply_on_same_tick() {
        let rig = Rig::new(605.0);
        let mut dev = rig.device(SettingsStore::new());
        rig.transport.push_settings(json!({ "ledFeedback": false }));
        dev.tick();
        assert_eq!(rig.led.last(), Some((Rgb::OFF, 0)));
    }

    #[test]
    fn event_budget_per_tick() {
        let rig = Rig::new(605.0);
        let mut dev = rig.device(SettingsStore::new());
        for _ in 0..(MAX_EVENTS_PER_TICK + 4) {
            rig.transport.push_settings(json!({ "sleepSeconds": 45 }));
        }
        rig.transport.push_settings(json!({ "sleepSeconds": 60 }));
        dev.tick();
        assert_eq!(dev.settings().snapshot().sleep_seconds, 45);
        dev.tick();
        assert_eq!(dev.settings().snapshot().sleep_seconds, 60);
    }

    #[test]
    fn drain_reports_handled_events() {
        let rig = Rig::new(605.0);
        let mut dev = rig.device(SettingsStore::new());
        for _ in 0..MAX_EVENTS_PER_TICK {
            rig.transport.push_settings(json!({ "sleepSeconds": 45 }));
        }
        assert_eq!(dev.drain_transport(1), MAX_EVENTS_PER_TICK);
        assert_eq!(dev.drain_transport(2), 0);

        rig.transport.push_settings(json!({ "ledFeedback": false }));
        rig.transport.push_settings(json!({ "sleepSeconds": 60 }));
        assert_eq!(dev.drain_transport(3), 2);
        assert_eq!(dev.settings().snapshot().sleep_seconds, 60);
    }
}
